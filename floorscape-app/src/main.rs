use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use floorscape_config::{AppConfig, ConfigError};
use floorscape_core::plan::FloorId;
use floorscape_frontend::cli::CliRequest;
use floorscape_io::FileFormat;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// 平面图摄取与三维重建的命令行预览。
#[derive(Debug, Parser)]
#[command(name = "floorscape", version, about)]
struct Cli {
    /// 配置文件路径，缺省时按 FLOORSCAPE_CONFIG 与 ./config/default.toml 查找
    #[arg(long)]
    config: Option<PathBuf>,

    /// 图纸所在楼层，允许负数
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    floor: i32,

    /// 图纸格式：dxf、dwg 或 json，缺省时按扩展名判断
    #[arg(long)]
    format: Option<String>,

    /// 编辑命令脚本，每行一条命令
    #[arg(long)]
    script: Option<PathBuf>,

    /// 以 JSON 输出当前楼层的场景图
    #[arg(long)]
    json: bool,

    /// 图纸文件；缺省时使用内置示例布局
    drawing: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, config_error) = load_configuration(cli.config.as_deref());
    init_logging(&config.logging.level);
    if let Some(err) = &config_error {
        report_config_error(err);
    }

    let format = cli
        .format
        .as_deref()
        .map(|tag| FileFormat::from_tag(tag).ok_or_else(|| anyhow!("未知的图纸格式: {tag}")))
        .transpose()?;
    let request = CliRequest {
        drawing: cli.drawing,
        format,
        floor: FloorId(cli.floor),
        script: cli.script,
        json: cli.json,
    };
    info!(?request, "floorscape 启动");

    let output = floorscape_frontend::run_cli(&config, &request).context("运行预览失败")?;
    println!("{output}");
    Ok(())
}

/// 配置读取失败时回退到默认配置，失败原因待日志初始化后再输出。
fn load_configuration(override_path: Option<&Path>) -> (AppConfig, Option<ConfigError>) {
    let loaded = match override_path {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::discover(),
    };
    match loaded {
        Ok(cfg) => (cfg, None),
        Err(err) => (AppConfig::default(), Some(err)),
    }
}

fn report_config_error(err: &ConfigError) {
    match err {
        ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
            warn!(path = %path.display(), error = %err, "加载配置失败，使用内建默认值");
        }
        ConfigError::Context { .. } => {
            warn!(error = %err, "加载配置失败，使用内建默认值");
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    if fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .is_err()
    {
        warn!("日志系统已初始化，跳过重复设置");
    }
}
