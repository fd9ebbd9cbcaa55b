//! Byte-level codecs between the transport and the worker.
//!
//! - [`RequestAssembler`]: turns the bytes read from a connection into
//!   complete `http::Request<Bytes>` values, enforcing size limits
//! - [`ResponseEncoder`]: serializes a response head and its body, with
//!   `Content-Length` or chunked framing
//!
//! Both sides implement the `tokio_util::codec` traits so they can also be
//! driven by `FramedRead`/`FramedWrite`.

mod body;
mod header;
mod request_assembler;
mod response_encoder;

pub use header::DEFAULT_MAX_HEADER_BYTES;
pub use request_assembler::RequestAssembler;
pub use response_encoder::ResponseEncoder;
