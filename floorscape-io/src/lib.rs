mod dxf;
mod loose;

pub mod converter;
pub mod ingest;
pub mod worker;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use converter::{CadConverter, CommandConverter};
pub use ingest::{CadIngestor, IngestReport, IngestState, SkippedEntity};
pub use worker::{IngestJob, IngestOutcome, IngestWorker};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to parse drawing: {0}")]
    Parse(String),
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("converter `{converter}` failed: {message}")]
    Converter { converter: String, message: String },
    #[error("failed to read file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start ingest worker: {source}")]
    Worker {
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// 面向编辑界面的简短提示。所有摄取错误都只影响底图，不影响区域编辑。
    pub fn notice(&self) -> String {
        match self {
            IngestError::Parse(_) => "底图解析失败，已切换为无轮廓模式".to_string(),
            IngestError::UnsupportedFormat(_) => "不支持该图纸格式，已切换为无轮廓模式".to_string(),
            IngestError::Converter { .. } => "图纸转换失败，已切换为无轮廓模式".to_string(),
            IngestError::Read { .. } => "无法读取图纸文件".to_string(),
            IngestError::Worker { .. } => "后台解析不可用".to_string(),
        }
    }
}

/// 上传文件的格式标记。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    /// 文本 DXF（ASCII 组码格式）。
    Dxf,
    /// 二进制 DWG，需要外部转换器。
    Dwg,
    /// 前端解析器产出的松散 JSON 实体列表。
    #[serde(rename = "json")]
    EntityJson,
}

impl FileFormat {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "dxf" => Some(FileFormat::Dxf),
            "dwg" => Some(FileFormat::Dwg),
            "json" => Some(FileFormat::EntityJson),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_tag)
    }

    #[inline]
    pub fn is_binary(self) -> bool {
        matches!(self, FileFormat::Dwg)
    }
}

#[derive(Debug)]
enum DxfError {
    Unsupported { feature: String },
    Invalid { message: String },
}

impl DxfError {
    fn unsupported(feature: impl Into<String>) -> Self {
        Self::Unsupported {
            feature: feature.into(),
        }
    }

    fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

impl From<DxfError> for IngestError {
    fn from(err: DxfError) -> Self {
        match err {
            DxfError::Unsupported { feature } => IngestError::UnsupportedFormat(feature),
            DxfError::Invalid { message } => IngestError::Parse(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_tags_resolve_from_extension() {
        assert_eq!(
            FileFormat::from_path(Path::new("plans/level1.DXF")),
            Some(FileFormat::Dxf)
        );
        assert_eq!(
            FileFormat::from_path(Path::new("level2.dwg")),
            Some(FileFormat::Dwg)
        );
        assert_eq!(FileFormat::from_tag(".json"), Some(FileFormat::EntityJson));
        assert_eq!(FileFormat::from_path(Path::new("notes.txt")), None);
        assert!(FileFormat::Dwg.is_binary());
    }
}
