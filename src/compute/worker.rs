use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::ComputeBackend;
use crate::error::BackendError;
use crate::generation::Row;
use crate::sequencer::PendingGeneration;

/// A finished job coming back from the worker
#[derive(Debug)]
pub struct Computed {
    pub pending: PendingGeneration,
    pub result: Result<Row, BackendError>,
}

/// Runs a [`ComputeBackend`] on its own thread so that slow steps (GPU
/// readback) never block the host loop.
///
/// Hosts hand in the [`PendingGeneration`] returned by
/// `AnimationSequencer::begin_advance` and later pass the [`Computed`] result
/// to `finish_advance`.
pub struct WorkerBackend {
    name: String,
    jobs: Option<mpsc::Sender<PendingGeneration>>,
    results: mpsc::Receiver<Computed>,
    handle: Option<JoinHandle<()>>,
}

impl WorkerBackend {
    /// Start the worker. The backend is built on the worker thread, so it
    /// does not have to be `Send`; construction errors are returned here.
    pub fn spawn<F>(factory: F) -> Result<Self, BackendError>
    where
        F: FnOnce() -> Result<Box<dyn ComputeBackend>, BackendError> + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::channel::<PendingGeneration>();
        let (result_tx, result_rx) = mpsc::channel::<Computed>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<String, BackendError>>();

        let handle = thread::Builder::new()
            .name("eca-compute".into())
            .spawn(move || {
                let mut backend = match factory() {
                    Ok(backend) => {
                        let _ = ready_tx.send(Ok(backend.name().to_string()));
                        backend
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for pending in job_rx {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        backend.compute_next_generation(pending.row(), pending.rule())
                    }))
                    .unwrap_or_else(|_| Err(BackendError::Failed("compute worker panicked".into())));

                    if result_tx.send(Computed { pending, result }).is_err() {
                        break;
                    }
                }
                log::debug!("Compute worker exiting");
            })
            .map_err(|e| BackendError::Failed(format!("failed to spawn compute worker: {e}")))?;

        let name = match ready_rx.recv() {
            Ok(Ok(name)) => name,
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(e);
            }
            Err(_) => {
                let _ = handle.join();
                return Err(BackendError::WorkerDisconnected);
            }
        };
        log::info!("Compute worker started with {} backend", name);

        Ok(Self {
            name,
            jobs: Some(job_tx),
            results: result_rx,
            handle: Some(handle),
        })
    }

    /// Name of the backend running on the worker
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn submit(&self, pending: PendingGeneration) -> Result<(), BackendError> {
        self.jobs
            .as_ref()
            .ok_or(BackendError::WorkerDisconnected)?
            .send(pending)
            .map_err(|_| BackendError::WorkerDisconnected)
    }

    /// Non-blocking poll for a finished job
    pub fn try_collect(&self) -> Result<Option<Computed>, BackendError> {
        match self.results.try_recv() {
            Ok(done) => Ok(Some(done)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BackendError::WorkerDisconnected),
        }
    }

    /// Wait up to `timeout` for a finished job
    pub fn collect_timeout(&self, timeout: Duration) -> Result<Option<Computed>, BackendError> {
        match self.results.recv_timeout(timeout) {
            Ok(done) => Ok(Some(done)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BackendError::WorkerDisconnected),
        }
    }
}

impl Drop for WorkerBackend {
    fn drop(&mut self) {
        // Closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
