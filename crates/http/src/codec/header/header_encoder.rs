//! Serializes a response status line and header fields.
//!
//! The framing header always agrees with the body that follows: a known
//! length overwrites `Content-Length`, an unknown one sets
//! `Transfer-Encoding: chunked`, and an empty body sends `Content-Length: 0`.

use std::io;
use std::io::ErrorKind;
use std::fmt::Write;

use bytes::{BufMut, BytesMut};
use http::{HeaderValue, Version, header};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::{PayloadSize, ResponseHead, SendError};

/// Initial buffer size allocated for header serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

const CHUNKED_VALUE: HeaderValue = HeaderValue::from_static("chunked");
const ZERO_VALUE: HeaderValue = HeaderValue::from_static("0");

/// Encoder for HTTP response headers implementing the [`Encoder`] trait.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    /// Encodes the status line and headers into `dst`.
    ///
    /// # Errors
    ///
    /// Only HTTP/1.1 responses are written; any other version is rejected.
    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (mut head, payload_size) = item;

        dst.reserve(INIT_HEADER_SIZE);
        match head.version() {
            Version::HTTP_11 => {
                let status = head.status();
                write!(dst, "HTTP/1.1 {} {}\r\n", status.as_str(), status.canonical_reason().unwrap_or(""))
                    .map_err(|e| SendError::invalid_body(e.to_string()))?;
            }
            v => {
                error!(http_version = ?v, "unsupported http version");
                return Err(io::Error::from(ErrorKind::Unsupported).into());
            }
        }

        let headers = head.headers_mut();
        match payload_size {
            PayloadSize::Length(n) => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, n.into());
            }
            PayloadSize::Chunked => {
                headers.remove(header::CONTENT_LENGTH);
                headers.insert(header::TRANSFER_ENCODING, CHUNKED_VALUE);
            }
            PayloadSize::Empty => {
                headers.remove(header::TRANSFER_ENCODING);
                headers.insert(header::CONTENT_LENGTH, ZERO_VALUE);
            }
        }

        for (header_name, header_value) in head.headers() {
            dst.put_slice(header_name.as_ref());
            dst.put_slice(b": ");
            dst.put_slice(header_value.as_ref());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
