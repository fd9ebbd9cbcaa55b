//! The pool of workers the listener hands sockets to.
//!
//! Workers are created on demand up to `maxThreads` and retired one at a
//! time by a periodic cleanup down to `minThreads`, so a burst of traffic
//! grows the pool and a quiet period slowly shrinks it again.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::ServerSettings;
use crate::connection::Socket;
use crate::handler::Handler;
use crate::worker::{Reservation, Worker};

pub struct WorkerPool<IO, H> {
    settings: Arc<ServerSettings>,
    handler: Arc<H>,
    tls: Option<TlsAcceptor>,
    workers: Mutex<Vec<Worker<IO>>>,
    next_id: AtomicUsize,
}

impl<IO, H> fmt::Debug for WorkerPool<IO, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool").field("workers", &*self.workers.lock()).field("tls", &self.tls.is_some()).finish()
    }
}

impl<IO, H> WorkerPool<IO, H>
where
    IO: Socket,
    H: Handler + 'static,
{
    /// Creates the pool and starts `minThreads` workers on the current runtime.
    pub fn new(settings: Arc<ServerSettings>, handler: Arc<H>, tls: Option<TlsAcceptor>) -> Self {
        let pool = Self { settings, handler, tls, workers: Mutex::new(Vec::new()), next_id: AtomicUsize::new(0) };

        {
            let mut workers = pool.workers.lock();
            for _ in 0..pool.settings.min_threads {
                workers.push(pool.spawn_worker());
            }
        }
        pool
    }

    pub fn is_tls(&self) -> bool {
        self.tls.is_some()
    }

    /// Reserves an idle worker, starting a new one if every worker is busy
    /// and the pool is below `maxThreads`.
    ///
    /// Returns `None` when the pool is exhausted.
    pub fn reserve(&self) -> Option<Reservation<IO>> {
        let mut workers = self.workers.lock();
        workers.retain(Worker::is_alive);

        if let Some(reservation) = workers.iter().find_map(Worker::set_busy) {
            return Some(reservation);
        }

        if workers.len() >= self.settings.max_threads {
            trace!(workers = workers.len(), "pool exhausted");
            return None;
        }

        let worker = self.spawn_worker();
        let reservation = worker.set_busy();
        workers.push(worker);
        reservation
    }

    /// Retires stopped workers and one idle worker while more than
    /// `minThreads` remain. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let mut workers = self.workers.lock();
        let before = workers.len();
        workers.retain(Worker::is_alive);

        if workers.len() > self.settings.min_threads
            && let Some(index) = workers.iter().rposition(|worker| !worker.is_busy())
        {
            let worker = workers.remove(index);
            debug!(worker = worker.id(), remaining = workers.len(), "retiring idle worker");
        }

        before - workers.len()
    }

    /// Runs [`cleanup`](WorkerPool::cleanup) every `cleanupInterval` until
    /// `shutdown` is cancelled.
    pub fn spawn_cleanup(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let pool = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(pool.settings.cleanup_interval());
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        pool.cleanup();
                    }
                }
            }
        })
    }

    fn spawn_worker(&self) -> Worker<IO> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        Worker::spawn(id, Arc::clone(&self.settings), Arc::clone(&self.handler), self.tls.clone())
    }
}

impl<IO, H> WorkerPool<IO, H> {
    pub fn len(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.lock().is_empty()
    }

    pub fn idle_count(&self) -> usize {
        self.workers.lock().iter().filter(|worker| worker.is_alive() && !worker.is_busy()).count()
    }
}
