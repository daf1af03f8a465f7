use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

use crate::IngestError;

/// 二进制图纸转换协作方：输入原始字节，输出文本 DXF。
pub trait CadConverter: Send + Sync {
    fn name(&self) -> &str;
    fn convert(&self, bytes: &[u8]) -> Result<String, IngestError>;
}

/// 调用外部程序完成转换：字节写入 stdin，从 stdout 读取 DXF 文本。
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: PathBuf,
    args: Vec<String>,
    label: String,
}

impl CommandConverter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        let program = program.into();
        let label = program
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| program.display().to_string());
        Self {
            program,
            args,
            label,
        }
    }

    #[inline]
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    #[inline]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn failure(&self, message: impl Into<String>) -> IngestError {
        IngestError::Converter {
            converter: self.label.clone(),
            message: message.into(),
        }
    }
}

impl CadConverter for CommandConverter {
    fn name(&self) -> &str {
        &self.label
    }

    fn convert(&self, bytes: &[u8]) -> Result<String, IngestError> {
        debug!(
            program = %self.program.display(),
            size = bytes.len(),
            "启动外部图纸转换器"
        );
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.failure(format!("无法启动转换器: {err}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.failure("转换器 stdin 不可用"))?;

        // stdin 与 stdout 需同时推进，否则大文件会让管道互相阻塞
        let output = thread::scope(|scope| {
            let writer = scope.spawn(move || {
                let result = stdin.write_all(bytes);
                drop(stdin);
                result
            });
            let output = child.wait_with_output();
            let written = writer.join();
            (output, written)
        });

        let output = match output {
            (Ok(output), Ok(Ok(()))) => output,
            (Ok(output), Ok(Err(err))) if !output.status.success() => {
                debug!(error = %err, "转换器提前关闭了输入");
                output
            }
            (Ok(_), Ok(Err(err))) => {
                return Err(self.failure(format!("写入转换器输入失败: {err}")));
            }
            (Ok(_), Err(_)) => return Err(self.failure("写入线程异常退出")),
            (Err(err), _) => return Err(self.failure(format!("等待转换器结束失败: {err}"))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.failure(format!(
                "退出状态 {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        String::from_utf8(output.stdout)
            .map_err(|err| self.failure(format!("转换器输出不是 UTF-8 文本: {err}")))
    }
}
