//! 后台解析线程。编辑线程只负责投递任务与非阻塞地收取结果。

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use floorscape_core::plan::FloorId;
use tracing::{debug, warn};

use crate::ingest::{CadIngestor, IngestReport};
use crate::{FileFormat, IngestError};

#[derive(Debug, Clone)]
pub struct IngestJob {
    pub floor: FloorId,
    /// 该楼层上传的代次，由调用方单调递增。
    pub generation: u64,
    pub file_ref: String,
    pub bytes: Vec<u8>,
    pub format: FileFormat,
}

#[derive(Debug)]
pub struct IngestOutcome {
    pub floor: FloorId,
    pub generation: u64,
    pub file_ref: String,
    pub result: Result<IngestReport, IngestError>,
}

pub struct IngestWorker {
    jobs: Option<Sender<IngestJob>>,
    outcomes: Receiver<IngestOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl IngestWorker {
    pub fn spawn(ingestor: CadIngestor) -> Result<Self, IngestError> {
        let (job_tx, job_rx) = channel::unbounded::<IngestJob>();
        let (outcome_tx, outcome_rx) = channel::unbounded::<IngestOutcome>();

        let handle = thread::Builder::new()
            .name("floorscape-ingest".to_string())
            .spawn(move || run(ingestor, job_rx, outcome_tx))
            .map_err(|source| IngestError::Worker { source })?;

        Ok(Self {
            jobs: Some(job_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
        })
    }

    /// 投递任务；工作线程已退出时返回 `false`。
    pub fn submit(&self, job: IngestJob) -> bool {
        match &self.jobs {
            Some(jobs) => jobs.send(job).is_ok(),
            None => false,
        }
    }

    pub fn try_recv(&self) -> Option<IngestOutcome> {
        match self.outcomes.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<IngestOutcome> {
        match self.outcomes.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// 取出当前已完成的全部结果。
    pub fn drain(&self) -> Vec<IngestOutcome> {
        self.outcomes.try_iter().collect()
    }
}

impl Drop for IngestWorker {
    fn drop(&mut self) {
        // 关闭发送端后工作线程的 recv 循环自然结束
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("后台解析线程异常退出");
            }
        }
    }
}

fn run(mut ingestor: CadIngestor, jobs: Receiver<IngestJob>, outcomes: Sender<IngestOutcome>) {
    for job in jobs.iter() {
        debug!(
            floor = %job.floor,
            generation = job.generation,
            file = %job.file_ref,
            "开始后台解析"
        );
        let result = ingestor.ingest(&job.bytes, job.format);
        let outcome = IngestOutcome {
            floor: job.floor,
            generation: job.generation,
            file_ref: job.file_ref,
            result,
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
}
