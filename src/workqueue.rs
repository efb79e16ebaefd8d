// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single high-priority worker thread running queued work items in order.

use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::config::ThreadConfig;
use crate::error::{IpcError, Result};
use crate::rt_prio;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Cheap handle for queueing work from any context.
///
/// Every clone shares one sender slot. Shutdown empties the slot under the
/// write lock, so a submit either lands before the close (and runs) or
/// fails with [`IpcError::ShutDown`].
#[derive(Clone)]
pub struct WorkSender {
    tx: Arc<RwLock<Option<Sender<Job>>>>,
}

impl WorkSender {
    /// Queue `job`. Never blocks on the worker. Fails once the queue has
    /// been closed.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        let slot = self.tx.read().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(tx) => tx.send(Box::new(job)).map_err(|_| IpcError::ShutDown),
            None => Err(IpcError::ShutDown),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.read().unwrap_or_else(PoisonError::into_inner).is_none()
    }

    fn close(&self) {
        self.tx.write().unwrap_or_else(PoisonError::into_inner).take();
    }
}

pub struct WorkQueue {
    sender: WorkSender,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WorkQueue {
    pub fn spawn(config: &ThreadConfig) -> Result<Self> {
        let (tx, rx) = unbounded();
        let name = config.name.clone();
        let worker = rt_prio::spawn_configured(config, move || run(&name, rx))?;
        Ok(Self {
            sender: WorkSender { tx: Arc::new(RwLock::new(Some(tx))) },
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn sender(&self) -> WorkSender {
        self.sender.clone()
    }

    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender.submit(job)
    }

    /// Close the queue, run everything accepted before the close, then
    /// join the worker.
    pub fn shutdown(&self) {
        self.sender.close();
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::error!("work queue thread panicked");
            }
        }
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Ends once the last sender is dropped and the channel is drained.
fn run(name: &str, rx: Receiver<Job>) {
    tracing::debug!(thread = name, "work queue started");
    for job in rx.iter() {
        job();
    }
    tracing::debug!(thread = name, "work queue stopped");
}
