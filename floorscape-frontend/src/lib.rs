pub mod bridge;
pub mod cli;
pub mod errors;
pub mod loader;

use floorscape_config::AppConfig;
use tracing::info;

use cli::CliRequest;
use errors::FrontendError;

/// 运行命令行前端，返回待打印的文本或 JSON。
pub fn run_cli(config: &AppConfig, request: &CliRequest) -> Result<String, FrontendError> {
    info!(
        drawing = ?request.drawing,
        floor = %request.floor,
        json = request.json,
        "启动 CLI 前端"
    );
    cli::run(config, request)
}
