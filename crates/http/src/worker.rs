//! Long-lived workers, each serving one connection at a time.
//!
//! A worker is a tokio task bound once to the settings, the handler and the
//! optional TLS acceptor. The pool hands it sockets through a one-slot
//! channel; the worker serves each to completion, then reports itself idle
//! again by clearing its busy flag.
//!
//! The busy flag is the handoff protocol between the pool and the worker:
//!
//! - [`Worker::set_busy`] flips it idle to busy with a compare-exchange and
//!   returns a [`Reservation`]; nobody else can reserve the worker while
//!   the reservation or its connection is alive.
//! - [`Reservation::assign`] sends the socket. Dropping an unassigned
//!   reservation clears the flag.
//! - The worker clears the flag only after the connection is fully torn
//!   down, so the pool never sees an idle worker that still holds a
//!   transport.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender, channel};
use tokio_rustls::TlsAcceptor;
use tracing::{Instrument, debug, error, info_span, trace, warn};

use crate::config::ServerSettings;
use crate::connection::{HttpConnection, ReadTimer, Socket};
use crate::handler::Handler;
use crate::protocol::{HttpError, WorkerError};

/// Handle to a worker task. Cloning the handle does not spawn a new worker.
pub struct Worker<IO> {
    id: usize,
    busy: Arc<AtomicBool>,
    tx: Sender<IO>,
}

impl<IO> Clone for Worker<IO> {
    fn clone(&self) -> Self {
        Self { id: self.id, busy: Arc::clone(&self.busy), tx: self.tx.clone() }
    }
}

impl<IO> fmt::Debug for Worker<IO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker").field("id", &self.id).field("busy", &self.is_busy()).field("alive", &self.is_alive()).finish()
    }
}

impl<IO: Socket> Worker<IO> {
    /// Spawns the worker task on the current tokio runtime.
    ///
    /// The task ends once every handle to the worker has been dropped.
    pub fn spawn<H>(id: usize, settings: Arc<ServerSettings>, handler: Arc<H>, tls: Option<TlsAcceptor>) -> Self
    where
        H: Handler + 'static,
    {
        let (tx, rx) = channel(1);
        let busy = Arc::new(AtomicBool::new(false));

        let span = info_span!("worker", worker = id);
        tokio::spawn(run(rx, Arc::clone(&busy), settings, handler, tls).instrument(span));

        debug!(worker = id, "worker started");
        Self { id, busy, tx }
    }

    /// Reserves and assigns in one step.
    ///
    /// Assigning to a busy worker is a pool bug: it is logged and reported,
    /// and the socket is dropped.
    pub fn handle_connection(&self, io: IO) -> Result<(), WorkerError> {
        match self.set_busy() {
            Some(reservation) => reservation.assign(io),
            None => {
                error!(worker = self.id, "connection assigned to a busy worker");
                Err(WorkerError::Busy(self.id))
            }
        }
    }
}

impl<IO> Worker<IO> {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Returns false once the worker task has exited.
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Marks the worker busy if it is idle.
    pub fn set_busy(&self) -> Option<Reservation<IO>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Reservation { worker: self.clone(), assigned: false })
    }
}

/// A worker held busy for a socket that has not been assigned yet.
#[must_use = "dropping a reservation releases the worker"]
pub struct Reservation<IO> {
    worker: Worker<IO>,
    assigned: bool,
}

impl<IO> fmt::Debug for Reservation<IO> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reservation").field("worker", &self.worker.id).field("assigned", &self.assigned).finish()
    }
}

impl<IO> Reservation<IO> {
    pub fn worker_id(&self) -> usize {
        self.worker.id
    }

    /// Hands `io` to the reserved worker, which starts serving it.
    pub fn assign(mut self, io: IO) -> Result<(), WorkerError> {
        match self.worker.tx.try_send(io) {
            Ok(()) => {
                self.assigned = true;
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(WorkerError::Busy(self.worker.id)),
            Err(TrySendError::Closed(_)) => Err(WorkerError::Stopped(self.worker.id)),
        }
    }
}

impl<IO> Drop for Reservation<IO> {
    fn drop(&mut self) {
        if !self.assigned {
            self.worker.busy.store(false, Ordering::Release);
        }
    }
}

async fn run<IO, H>(
    mut rx: Receiver<IO>,
    busy: Arc<AtomicBool>,
    settings: Arc<ServerSettings>,
    handler: Arc<H>,
    tls: Option<TlsAcceptor>,
) where
    IO: Socket,
    H: Handler,
{
    let mut timer = ReadTimer::new(settings.read_timeout());

    while let Some(io) = rx.recv().await {
        timer.arm();
        trace!(busy = busy.load(Ordering::Acquire), "connection assigned");

        let span = info_span!("connection", peer = ?io.peer_addr());
        let serve = serve(io, tls.as_ref(), &settings, &mut timer, &*handler);

        match AssertUnwindSafe(serve).catch_unwind().instrument(span).await {
            Ok(Ok(())) => debug!("connection closed"),
            Ok(Err(e @ HttpError::RequestError { .. })) => warn!(cause = %e, "connection closed after rejecting a request"),
            Ok(Err(e)) if e.is_disconnect() => debug!(cause = %e, "peer disconnected"),
            Ok(Err(e)) => debug!(cause = %e, "connection torn down"),
            Err(_) => error!("handler panicked, connection dropped"),
        }

        timer.disarm();
        busy.store(false, Ordering::Release);
    }

    debug!("worker stopped");
}

async fn serve<IO, H>(
    io: IO,
    tls: Option<&TlsAcceptor>,
    settings: &ServerSettings,
    timer: &mut ReadTimer,
    handler: &H,
) -> Result<(), HttpError>
where
    IO: Socket,
    H: Handler,
{
    let connection = HttpConnection::accept(io, tls, settings, timer).await?;
    connection.process(handler, timer).await
}
