//! Background flush pool.
//!
//! Jobs run off-thread and may hand back a continuation. Continuations are
//! queued and executed only when the owner pumps the pool on the main
//! context, which is how background work re-enters `&mut` engine and world
//! state without any locking.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::engine::SaveEngine;
use zonesave_world::World;

/// A continuation to run on the main context after a background job.
pub type MainTask = Box<dyn FnOnce(&mut SaveEngine, &mut World) + Send>;

type Job = Box<dyn FnOnce() -> Option<MainTask> + Send>;

pub struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    main_rx: Receiver<MainTask>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let (job_tx, job_rx) = unbounded::<Job>();
        let (main_tx, main_rx) = unbounded::<MainTask>();
        let handles = (0..workers.max(1))
            .map(|i| {
                let job_rx = job_rx.clone();
                let main_tx = main_tx.clone();
                std::thread::Builder::new()
                    .name(format!("save-worker-{i}"))
                    .spawn(move || {
                        for job in job_rx.iter() {
                            if let Some(task) = job() {
                                // Receiver dropped means the engine is gone;
                                // the continuation has nothing to run against.
                                let _ = main_tx.send(task);
                            }
                        }
                    })
            })
            .filter_map(|h| h.ok())
            .collect();
        Self {
            job_tx: Some(job_tx),
            main_rx,
            handles,
        }
    }

    /// Queue a background job. Silently dropped after shutdown.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() -> Option<MainTask> + Send + 'static,
    {
        if let Some(tx) = &self.job_tx {
            let _ = tx.send(Box::new(job));
        }
    }

    /// Take every continuation that is ready right now.
    pub fn drain_main(&self) -> Vec<MainTask> {
        self.main_rx.try_iter().collect()
    }

    /// Block up to `timeout` for one continuation.
    pub fn recv_main_timeout(&self, timeout: Duration) -> Option<MainTask> {
        match self.main_rx.recv_timeout(timeout) {
            Ok(task) => Some(task),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the job channel ends each worker's iteration loop.
        self.job_tx.take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
