//! TCP listener feeding accepted sockets into a [`WorkerPool`].

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerSettings;
use crate::connection::{MessageWriter, Transport};
use crate::handler::Handler;
use crate::pool::WorkerPool;
use crate::protocol::{SendError, error_response};
use crate::tls::{TlsError, load_acceptor};

/// Pause after a failed accept, so a full file table doesn't spin the loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);

const REJECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("can't bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error(transparent)]
    Tls(#[from] TlsError),
}

#[derive(Debug)]
pub struct HttpListener<H> {
    listener: TcpListener,
    pool: Arc<WorkerPool<TcpStream, H>>,
}

impl<H: Handler + 'static> HttpListener<H> {
    /// Binds `host:port` and starts the pool's initial workers. The TLS
    /// acceptor is built from the `tls` section when present.
    pub async fn bind(settings: ServerSettings, handler: H) -> Result<Self, ServerError> {
        let tls = settings.tls.as_ref().map(load_acceptor).transpose()?;

        let addr = settings.bind_address();
        let listener = TcpListener::bind(&addr).await.map_err(|source| ServerError::Bind { addr, source })?;

        let pool = WorkerPool::new(Arc::new(settings), Arc::new(handler), tls);
        Ok(Self { listener, pool: Arc::new(pool) })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn pool(&self) -> &Arc<WorkerPool<TcpStream, H>> {
        &self.pool
    }

    /// Accepts connections until `shutdown` is cancelled.
    ///
    /// Connections already assigned keep being served by their workers.
    pub async fn serve(self, shutdown: CancellationToken) {
        if let Ok(addr) = self.local_addr() {
            info!(%addr, tls = self.pool.is_tls(), "listening");
        }
        let cleanup = self.pool.spawn_cleanup(shutdown.child_token());

        loop {
            let (stream, peer) = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!(cause = %e, "accept failed");
                        sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                },
            };

            match self.pool.reserve() {
                Some(reservation) => {
                    let worker = reservation.worker_id();
                    match reservation.assign(stream) {
                        Ok(()) => debug!(worker, %peer, "connection assigned"),
                        Err(e) => error!(worker, %peer, cause = %e, "can't assign connection"),
                    }
                }
                None => {
                    warn!(%peer, "no idle worker, rejecting connection");
                    // a plaintext status line means nothing to a TLS client
                    if !self.pool.is_tls() {
                        tokio::spawn(reject(stream));
                    }
                }
            }
        }

        if let Err(e) = cleanup.await {
            error!(cause = %e, "pool cleanup task failed");
        }
        info!("listener stopped");
    }
}

async fn reject(stream: TcpStream) {
    let mut writer = MessageWriter::with_capacity(Transport::Plain(stream), 256);
    let send = async {
        writer.send_response(error_response(StatusCode::SERVICE_UNAVAILABLE, true)).await?;
        Ok::<_, SendError>(writer.get_mut().shutdown().await?)
    };
    if let Ok(Err(e)) = timeout(REJECT_TIMEOUT, send).await {
        debug!(cause = %e, "can't send 503");
    }
}
