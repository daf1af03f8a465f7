use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV: &str = "FLOORSCAPE_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub canvas: CanvasConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub tessellation: TessellationConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `FLOORSCAPE_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let cwd = env::current_dir().map_err(|source| ConfigError::Context {
            message: "获取当前工作目录失败".to_string(),
            source,
        })?;
        Self::discover_in(&cwd)
    }

    /// 在指定目录下寻找 `config/default.toml`，不读取环境变量。
    pub fn discover_in(root: &Path) -> Result<Self, ConfigError> {
        let default_path = root.join("config").join("default.toml");
        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 二维编辑画布尺寸。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CanvasConfig {
    #[serde(default = "CanvasConfig::default_width")]
    pub width: f64,
    #[serde(default = "CanvasConfig::default_height")]
    pub height: f64,
}

impl CanvasConfig {
    fn default_width() -> f64 {
        800.0
    }

    fn default_height() -> f64 {
        500.0
    }
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            width: Self::default_width(),
            height: Self::default_height(),
        }
    }
}

/// 三维预览参数，长度单位为场景单位。
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SceneConfig {
    #[serde(default = "SceneConfig::default_footprint_width")]
    pub footprint_width: f64,
    #[serde(default = "SceneConfig::default_footprint_depth")]
    pub footprint_depth: f64,
    #[serde(default = "SceneConfig::default_floor_height")]
    pub floor_height: f64,
    #[serde(default = "SceneConfig::default_wall_height")]
    pub wall_height: f64,
    #[serde(default = "SceneConfig::default_wall_thickness")]
    pub wall_thickness: f64,
    #[serde(default = "SceneConfig::default_perimeter_padding")]
    pub perimeter_padding: f64,
    #[serde(default = "SceneConfig::default_adjacency_epsilon")]
    pub adjacency_epsilon: f64,
}

impl SceneConfig {
    fn default_footprint_width() -> f64 {
        20.0
    }

    fn default_footprint_depth() -> f64 {
        15.0
    }

    fn default_floor_height() -> f64 {
        3.0
    }

    fn default_wall_height() -> f64 {
        2.5
    }

    fn default_wall_thickness() -> f64 {
        0.1
    }

    fn default_perimeter_padding() -> f64 {
        0.5
    }

    fn default_adjacency_epsilon() -> f64 {
        0.1
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            footprint_width: Self::default_footprint_width(),
            footprint_depth: Self::default_footprint_depth(),
            floor_height: Self::default_floor_height(),
            wall_height: Self::default_wall_height(),
            wall_thickness: Self::default_wall_thickness(),
            perimeter_padding: Self::default_perimeter_padding(),
            adjacency_epsilon: Self::default_adjacency_epsilon(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TessellationConfig {
    #[serde(default = "TessellationConfig::default_arc_segments")]
    pub arc_segments: usize,
}

impl TessellationConfig {
    fn default_arc_segments() -> usize {
        32
    }
}

impl Default for TessellationConfig {
    fn default() -> Self {
        Self {
            arc_segments: Self::default_arc_segments(),
        }
    }
}

/// 外部 DWG 转换程序。未配置时二进制图纸不可用。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConverterConfig {
    #[serde(default)]
    pub program: Option<PathBuf>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}
