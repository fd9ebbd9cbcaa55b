//! Pooled connection workers for an embeddable HTTP/1.1 server.
//!
//! A fixed-but-elastic set of long-lived workers serves accepted sockets one
//! at a time. Each worker turns the byte stream into complete requests,
//! queues pipelined requests, calls the handler for one request at a time
//! and writes the responses back in request order. An inactivity timer
//! reclaims stalled connections, and every failure path ends in the same
//! teardown that returns the worker to the pool.
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//!
//! use bytes::Bytes;
//! use http::{Request, Response};
//! use http_body_util::Full;
//! use micro_http_worker::config::ServerSettings;
//! use micro_http_worker::handler::make_handler;
//! use micro_http_worker::server::HttpListener;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = make_handler(|request: Request<Bytes>| async move {
//!         let body = format!("{} bytes received\r\n", request.body().len());
//!         Ok::<_, Infallible>(Response::new(Full::new(Bytes::from(body))))
//!     });
//!
//!     let listener = HttpListener::bind(ServerSettings::default(), handler).await.unwrap();
//!     listener.serve(CancellationToken::new()).await;
//! }
//! ```
//!
//! # Architecture
//!
//! - [`server`]: the TCP listener, answering `503` when the pool is exhausted
//! - [`pool`]: worker bookkeeping, growth on demand and periodic cleanup
//! - [`worker`]: the busy/idle handoff and the per-worker task
//! - [`connection`]: transport, timer, request queue and the event loop of one connection
//! - [`codec`]: request assembly and response encoding
//! - [`protocol`]: message types and errors
//! - [`handler`]: the pluggable request handler
//! - [`config`] and [`tls`]: settings and certificate loading
//!
//! # Limitations
//!
//! - HTTP/1.0 and HTTP/1.1 only
//! - Request bodies are buffered whole, bounded by `maxRequestSize` or
//!   `maxMultiPartSize`
//! - Maximum number of headers: 64

pub mod codec;
pub mod config;
pub mod connection;
pub mod handler;
pub mod pool;
pub mod protocol;
pub mod server;
pub mod tls;
pub mod worker;

mod utils;
pub(crate) use utils::ensure;
