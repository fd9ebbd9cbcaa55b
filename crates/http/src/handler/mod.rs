//! The pluggable request handler a worker dispatches to.
//!
//! A handler receives one complete request at a time and produces the
//! response the worker writes back. Handlers are shared by every worker in a
//! pool, so they must be `Send + Sync`; they are awaited by the worker, so a
//! slow handler only holds up its own connection.

use std::error::Error;
use std::fmt::Display;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body::Body;

#[async_trait]
pub trait Handler: Send + Sync {
    type RespBody: Body<Data = Bytes, Error: Display + Send> + Send + Unpin;
    type Error: Into<Box<dyn Error + Send + Sync>> + Send;

    /// Produces the response for `req`.
    ///
    /// An `Err` is logged by the worker and answered with an empty
    /// `500 Internal Server Error`; the connection stays usable.
    async fn call(&self, req: Request<Bytes>) -> Result<Response<Self::RespBody>, Self::Error>;
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body<Data = Bytes, Error: Display + Send> + Send + Unpin,
    F: Fn(Request<Bytes>) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request<Bytes>) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

/// Wraps an async function or closure into a [`Handler`].
///
/// ```
/// use std::convert::Infallible;
/// use bytes::Bytes;
/// use http::{Request, Response};
/// use http_body_util::Full;
/// use micro_http_worker::handler::make_handler;
///
/// let handler = make_handler(|req: Request<Bytes>| async move {
///     Ok::<_, Infallible>(Response::new(Full::new(Bytes::copy_from_slice(req.uri().path().as_bytes()))))
/// });
/// # let _ = handler;
/// ```
pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body<Data = Bytes>,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request<Bytes>) -> Ret,
{
    HandlerFn { f }
}
