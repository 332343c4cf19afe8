//! ``src/tasks/archive_task.rs``
//! ============================================================================
//! # Archive Task: Background Extraction and Creation
//!
//! Extraction and creation are long-running, I/O-bound passes that must
//! not block the UI from repainting a busy indicator. They run on the
//! blocking pool, at most one at a time, and report completion over an
//! unbounded channel. Cancellation is cooperative: the engines check the
//! token between entries, because archive streams make mid-entry
//! cancellation unsafe.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::container::Container;
use crate::engine::create::{self, CreateReport};
use crate::engine::extract::{self, ExtractReport};
use crate::error::AppError;
use crate::model::path_tree::PathTree;

/// One archive operation, with everything it needs snapshotted.
pub enum ArchiveJob {
    Extract {
        container: Arc<Container>,
        /// `None` extracts everything.
        selection: Option<PathTree>,
        dest: PathBuf,
    },
    Create {
        container: Arc<Container>,
        selection: PathTree,
        dest: PathBuf,
    },
}

impl ArchiveJob {
    /// Run the job to completion on the calling thread.
    pub fn run(&self, cancel: &CancellationToken) -> TaskResult {
        match self {
            Self::Extract {
                container,
                selection,
                dest,
            } => TaskResult::Extracted(match container.as_archive() {
                Some(archive) => extract::extract(archive, selection.as_ref(), dest, cancel),
                None => Err(AppError::cannot_open(dest.clone(), "source is not an archive")),
            }),
            Self::Create {
                container,
                selection,
                dest,
            } => TaskResult::Created(create::create(container, selection, dest, cancel)),
        }
    }
}

/// Completion message delivered to the UI's event loop.
#[derive(Debug)]
pub enum TaskResult {
    Extracted(Result<ExtractReport, AppError>),
    Created(Result<CreateReport, AppError>),
}

struct RunningJob {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// Owner of the single outstanding archive job.
///
/// A new job may only be spawned after the previous one has signalled
/// completion; until then `spawn` fails with `TaskBusy`.
#[derive(Default)]
pub struct ArchiveTaskManager {
    running: Option<RunningJob>,
}

impl ArchiveTaskManager {
    #[must_use]
    pub fn new() -> Self {
        Self { running: None }
    }

    /// Whether a job is still in flight.
    pub fn is_busy(&mut self) -> bool {
        match &self.running {
            Some(job) if !job.join.is_finished() => true,
            _ => {
                self.running = None;
                false
            }
        }
    }

    /// Spawn `job` on the blocking pool; its [`TaskResult`] arrives on
    /// `result_tx` when the pass finishes.
    pub fn spawn(
        &mut self,
        job: ArchiveJob,
        result_tx: UnboundedSender<TaskResult>,
    ) -> Result<(), AppError> {
        if self.is_busy() {
            warn!("archive task refused, previous one still running");
            return Err(AppError::TaskBusy);
        }

        let cancel = CancellationToken::new();
        let job_cancel = cancel.clone();

        let join = tokio::task::spawn_blocking(move || {
            info!(marker = "ARCHIVE_TASK", "archive job started");
            let result = job.run(&job_cancel);
            if result_tx.send(result).is_err() {
                warn!("archive task result dropped, receiver gone");
            }
        });

        self.running = Some(RunningJob { cancel, join });
        Ok(())
    }

    /// Ask the running job to stop at the next entry boundary.
    pub fn cancel(&self) {
        if let Some(job) = &self.running {
            job.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tokio::sync::mpsc;

    fn sample_job(dir: &std::path::Path) -> ArchiveJob {
        use std::fs::File;

        let archive_path = dir.join("sample.tar");
        let file = File::create(&archive_path).unwrap();
        let mut builder = tar::Builder::new(file);
        let mut header = tar::Header::new_gnu();
        header.set_size(5);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, "member.txt", &b"hello"[..])
            .unwrap();
        builder.finish().unwrap();

        let archive = crate::container::ArchiveContainer::open(&archive_path).unwrap();
        ArchiveJob::Extract {
            container: Arc::new(Container::Archive(archive)),
            selection: None,
            dest: dir.join("out"),
        }
    }

    #[tokio::test]
    async fn job_completes_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut manager = ArchiveTaskManager::new();
        manager.spawn(sample_job(dir.path()), tx).unwrap();

        match rx.recv().await.unwrap() {
            TaskResult::Extracted(Ok(report)) => assert_eq!(report.written, 1),
            other => panic!("unexpected result: {other:?}"),
        }

        assert_eq!(
            fs::read(dir.path().join("out/member.txt")).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn manager_frees_up_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut manager = ArchiveTaskManager::new();
        manager.spawn(sample_job(dir.path()), tx.clone()).unwrap();
        let _ = rx.recv().await.unwrap();

        // The join handle settles right after the send; poll until then.
        while manager.is_busy() {
            tokio::task::yield_now().await;
        }
        manager.spawn(sample_job(dir.path()), tx).unwrap();
        let _ = rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn cancelled_job_reports_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut manager = ArchiveTaskManager::new();
        // Cancel before the job gets a chance to run its first entry.
        let job = sample_job(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tokio::task::spawn_blocking(move || job.run(&cancel))
            .await
            .unwrap();
        match result {
            TaskResult::Extracted(Err(AppError::Cancelled)) => {}
            other => panic!("unexpected result: {other:?}"),
        }

        // The manager itself is still usable afterwards.
        manager.spawn(sample_job(dir.path()), tx).unwrap();
        let _ = rx.recv().await.unwrap();
    }
}
