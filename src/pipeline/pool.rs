//! Scoped worker pool: a fixed set of named threads fed by a crossbeam channel of boxed jobs.
//!
//! The pool lives inside a `std::thread::scope`, so jobs may borrow the call's context. It is shut
//! down by [`ScopedPool::shutdown`] on the success path and by `Drop` on every other path.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, Scope, ScopedJoinHandle};

use crate::error::AggregateError;
use crate::utils::config::PackagePaths;

pub type Job<'env> = Box<dyn FnOnce() + Send + 'env>;

enum Message<'env> {
    Run(Job<'env>),
    Shutdown,
}

/// Cloneable submission side of a [`ScopedPool`]. Tasks hold one to submit children.
#[derive(Clone)]
pub struct PoolHandle<'env> {
    tx: Sender<Message<'env>>,
}

impl<'env> PoolHandle<'env> {
    pub fn submit<F>(&self, job: F) -> Result<(), AggregateError>
    where
        F: FnOnce() + Send + 'env,
    {
        self.tx
            .send(Message::Run(Box::new(job)))
            .map_err(|_| AggregateError::scheduling("submit to a pool with no live workers"))
    }
}

pub struct ScopedPool<'scope, 'env: 'scope> {
    handle: PoolHandle<'env>,
    workers: Vec<ScopedJoinHandle<'scope, ()>>,
    shut_down: bool,
}

impl<'scope, 'env: 'scope> ScopedPool<'scope, 'env> {
    /// Spawn `size` workers named `<pkg>-<role>-<i>`. Workers started before a spawn failure are
    /// shut down again before the error is returned.
    pub fn spawn(
        scope: &'scope Scope<'scope, 'env>,
        size: usize,
        role: &str,
    ) -> Result<Self, AggregateError> {
        let size = size.max(1);
        let (tx, rx) = unbounded::<Message<'env>>();
        let mut pool = ScopedPool {
            handle: PoolHandle { tx },
            workers: Vec::with_capacity(size),
            shut_down: false,
        };
        for i in 0..size {
            let rx = rx.clone();
            let worker = thread::Builder::new()
                .name(PackagePaths::get().thread_name(role, i))
                .spawn_scoped(scope, move || worker_loop(rx))
                .map_err(|e| {
                    AggregateError::scheduling(format!("spawn {} worker {}: {}", role, i, e))
                })?;
            pool.workers.push(worker);
        }
        debug!("Started {} pool with {} workers", role, size);
        Ok(pool)
    }

    pub fn handle(&self) -> PoolHandle<'env> {
        self.handle.clone()
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Send one shutdown message per worker. Jobs queued before it still run; tasks check the
    /// call's cancellation first, so they finish quickly on error paths.
    fn signal_shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        for _ in 0..self.workers.len() {
            let _ = self.handle.tx.send(Message::Shutdown);
        }
    }

    /// Stop and join all workers. Fails if a worker thread died.
    pub fn shutdown(mut self) -> Result<(), AggregateError> {
        self.signal_shutdown();
        let dead = self
            .workers
            .drain(..)
            .map(ScopedJoinHandle::join)
            .filter(Result::is_err)
            .count();
        if dead > 0 {
            return Err(AggregateError::scheduling(format!(
                "{} pool worker(s) died",
                dead
            )));
        }
        Ok(())
    }
}

impl<'scope, 'env: 'scope> Drop for ScopedPool<'scope, 'env> {
    fn drop(&mut self) {
        self.signal_shutdown();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(rx: Receiver<Message<'_>>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            Message::Run(job) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    error!("Pool task panicked: {}", panic_message(payload.as_ref()));
                }
            }
            Message::Shutdown => break,
        }
    }
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
