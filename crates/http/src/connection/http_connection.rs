use std::error::Error;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use http::{Request, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::select;
use tokio::time::timeout;
use tokio_rustls::TlsAcceptor;
use tokio_util::codec::Decoder;
use tracing::{debug, error, trace, warn};

use crate::codec::RequestAssembler;
use crate::config::ServerSettings;
use crate::connection::message_writer::MessageWriter;
use crate::connection::pending::PendingRequests;
use crate::connection::timer::ReadTimer;
use crate::connection::transport::{Socket, Transport};
use crate::handler::Handler;
use crate::protocol::{HttpError, error_response, is_keep_alive, wants_close};

const INIT_READ_SIZE: usize = 8 * 1024;
const INIT_WRITE_SIZE: usize = 8 * 1024;

/// Upper bound for the graceful shutdown of a closing transport.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Where a connection is in its lifecycle; only used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshaking,
    AwaitingData,
    Assembling,
    Dispatching,
    Closed,
}

/// One connection served by a worker.
///
/// The connection reads into a single buffer, feeds it to the
/// [`RequestAssembler`], queues every completed request and answers the
/// queue strictly in order, one handler call at a time. Every wait is raced
/// against the worker's [`ReadTimer`] with the timer polled first, so a fired
/// timer always wins.
#[derive(Debug)]
pub struct HttpConnection<IO> {
    writer: MessageWriter<Transport<IO>>,
    read_buf: BytesMut,
    assembler: RequestAssembler,
    pending: PendingRequests,
    phase: Phase,
}

impl<IO: Socket> HttpConnection<IO> {
    /// Creates the transport for `io`, running the TLS handshake when an
    /// acceptor is given. The handshake is bounded by the already armed
    /// `timer` and does not rearm it.
    pub async fn accept(
        io: IO,
        tls: Option<&TlsAcceptor>,
        settings: &ServerSettings,
        timer: &mut ReadTimer,
    ) -> Result<Self, HttpError> {
        if tls.is_some() {
            trace!(phase = ?Phase::Handshaking, "connection phase");
        }

        let read_timeout = timer.timeout();
        let transport = select! {
            biased;
            () = timer.fired() => return Err(HttpError::ReadTimeout(read_timeout)),
            result = Transport::accept(io, tls) => result.map_err(HttpError::handshake)?,
        };

        Ok(Self::new(transport, settings))
    }

    pub fn new(transport: Transport<IO>, settings: &ServerSettings) -> Self {
        Self {
            writer: MessageWriter::with_capacity(transport, INIT_WRITE_SIZE),
            read_buf: BytesMut::with_capacity(INIT_READ_SIZE),
            assembler: RequestAssembler::new(settings.max_request_size, settings.max_multi_part_size),
            pending: PendingRequests::new(),
            phase: Phase::AwaitingData,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Serves requests until the peer closes, the timer fires, or a request
    /// is rejected; then releases the transport.
    ///
    /// `Ok(())` means an orderly close: peer EOF or a response that ended
    /// keep-alive. Every `Err` is the cause of a teardown.
    pub async fn process<H: Handler>(mut self, handler: &H, timer: &mut ReadTimer) -> Result<(), HttpError> {
        let result = self.run(handler, timer).await;
        self.close(&result).await;
        result
    }

    async fn run<H: Handler>(&mut self, handler: &H, timer: &mut ReadTimer) -> Result<(), HttpError> {
        let read_timeout = timer.timeout();

        loop {
            self.enter(if self.assembler.has_partial() { Phase::Assembling } else { Phase::AwaitingData });

            self.read_buf.reserve(INIT_READ_SIZE);
            let read = select! {
                biased;
                () = timer.fired() => return Err(HttpError::ReadTimeout(read_timeout)),
                read = self.writer.get_mut().read_buf(&mut self.read_buf) => read?,
            };

            if read == 0 {
                if self.assembler.has_partial() || !self.read_buf.is_empty() {
                    debug!(buffered = self.read_buf.len(), "peer closed mid-request, partial request discarded");
                }
                return Ok(());
            }
            timer.rearm();

            let mut rejected = None;
            loop {
                match self.assembler.decode(&mut self.read_buf) {
                    Ok(Some(request)) => self.pending.push(request),
                    Ok(None) => break,
                    Err(e) => {
                        rejected = Some(e);
                        break;
                    }
                }
            }

            if !self.pending.is_empty() {
                timer.rearm();
                if !self.drain(handler, timer).await? {
                    return Ok(());
                }
            }

            if let Some(e) = rejected {
                let status = e.status_code();
                warn!(cause = %e, %status, "rejecting request");
                // best effort, the connection closes either way
                let rejection = async { self.writer.send_response(error_response(status, true)).await.map_err(HttpError::from) };
                if let Err(send_error) = guarded(timer, rejection).await {
                    debug!(cause = %send_error, "can't send rejection");
                }
                return Err(e.into());
            }

            if self.assembler.take_expect_continue() {
                trace!("sending 100 continue");
                guarded(timer, async { self.writer.write_continue().await.map_err(HttpError::from) }).await?;
            }
        }
    }

    /// Answers queued requests in order.
    ///
    /// Returns `false` once a response ended keep-alive; the rest of the
    /// queue is dropped unanswered.
    async fn drain<H: Handler>(&mut self, handler: &H, timer: &mut ReadTimer) -> Result<bool, HttpError> {
        while let Some(request) = self.pending.pop() {
            self.enter(Phase::Dispatching);
            let keep_alive = is_keep_alive(request.version(), request.headers());

            let close = guarded(timer, self.dispatch(request, handler)).await?;
            timer.rearm();

            if !keep_alive || close {
                debug!(dropped = self.pending.len(), "keep-alive ended by response");
                self.pending.clear();
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Runs the handler for one request and flushes its response. Returns
    /// true if the response asked for the connection to close.
    async fn dispatch<H: Handler>(&mut self, request: Request<Bytes>, handler: &H) -> Result<bool, HttpError> {
        trace!(method = %request.method(), uri = %request.uri(), "dispatching request");

        match handler.call(request).await {
            Ok(response) => {
                let close = wants_close(response.headers());
                self.writer.send_response(response).await?;
                Ok(close)
            }
            Err(e) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "handler failed");
                self.writer.send_response(error_response(StatusCode::INTERNAL_SERVER_ERROR, false)).await?;
                Ok(false)
            }
        }
    }

    async fn close(&mut self, result: &Result<(), HttpError>) {
        self.enter(Phase::Closed);
        self.pending.clear();
        self.assembler.reset();
        self.read_buf.clear();
        self.writer.clear_buf();

        if matches!(result, Err(e) if e.is_disconnect()) {
            return;
        }
        if let Ok(Err(e)) = timeout(SHUTDOWN_TIMEOUT, self.writer.get_mut().shutdown()).await {
            trace!(cause = %e, "transport shutdown failed");
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            trace!(from = ?self.phase, to = ?phase, "connection phase");
            self.phase = phase;
        }
    }
}

/// Runs `fut` unless `timer` fires first.
async fn guarded<T>(timer: &mut ReadTimer, fut: impl Future<Output = Result<T, HttpError>>) -> Result<T, HttpError> {
    let read_timeout = timer.timeout();
    select! {
        biased;
        () = timer.fired() => Err(HttpError::ReadTimeout(read_timeout)),
        result = fut => result,
    }
}
