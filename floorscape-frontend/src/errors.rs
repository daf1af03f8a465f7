use std::path::PathBuf;

use floorscape_engine::errors::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("无法读取图纸 {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("无法识别图纸格式: {0:?}，请使用 --format 指定 dxf、dwg 或 json")]
    UnknownFormat(PathBuf),
    #[error("无法读取脚本 {path:?}: {source}")]
    Script {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("楼层 {0} 尚无场景")]
    NoScene(i32),
    #[error("场景序列化失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}
