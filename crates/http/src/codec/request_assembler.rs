//! Incremental assembly of complete HTTP requests
//!
//! The worker appends every burst of bytes it reads to one buffer and calls
//! [`RequestAssembler::decode`] until it returns `Ok(None)`. Each `Some` is a
//! complete request with its whole body, so several pipelined requests that
//! arrived together come out one after another, in arrival order.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_http_worker::codec::RequestAssembler;
//! use tokio_util::codec::Decoder;
//!
//! let mut assembler = RequestAssembler::new(16_000, 1_000_000);
//! let mut buf = BytesMut::from("GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n");
//!
//! let first = assembler.decode(&mut buf).unwrap().unwrap();
//! let second = assembler.decode(&mut buf).unwrap().unwrap();
//! assert_eq!(first.uri().path(), "/a");
//! assert_eq!(second.uri().path(), "/b");
//! assert!(assembler.decode(&mut buf).unwrap().is_none());
//! ```

use bytes::{Bytes, BytesMut};
use http::Request;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::ensure;
use crate::protocol::{ParseError, PayloadItem, PayloadSize, RequestHeader};

/// Assembles bytes into complete `Request<Bytes>` values while enforcing the
/// configured size limits.
///
/// # Limits
///
/// - A plain request may not exceed `max_request_size` bytes, header and body
///   together. The header alone is capped at the same value.
/// - A `multipart/*` body is measured on its own against `max_multipart_size`.
///
/// A declared `Content-Length` over the limit is rejected as soon as the
/// header is parsed, before any body bytes are buffered.
#[derive(Debug)]
pub struct RequestAssembler {
    header_decoder: HeaderDecoder,
    max_request_size: usize,
    max_multipart_size: usize,
    current: Option<CurrentRequest>,
    expect_continue: bool,
}

/// The request whose body is still arriving.
#[derive(Debug)]
struct CurrentRequest {
    header: RequestHeader,
    payload_decoder: PayloadDecoder,
    body: BytesMut,
    /// bytes counted against `limit` so far
    size: u64,
    limit: usize,
}

impl RequestAssembler {
    pub fn new(max_request_size: usize, max_multipart_size: usize) -> Self {
        Self {
            header_decoder: HeaderDecoder::new(max_request_size),
            max_request_size,
            max_multipart_size,
            current: None,
            expect_continue: false,
        }
    }

    /// Returns true while a request has been started but not completed.
    pub fn has_partial(&self) -> bool {
        self.current.is_some()
    }

    /// Returns true once, after a header carrying `Expect: 100-continue` was
    /// parsed and its body has not started yet.
    pub fn take_expect_continue(&mut self) -> bool {
        let pending = self.expect_continue && self.current.as_ref().is_some_and(|current| current.body.is_empty());
        self.expect_continue = false;
        pending
    }

    /// Drops any partially assembled request.
    pub fn reset(&mut self) {
        self.current = None;
        self.expect_continue = false;
    }

    fn start(&mut self, header: RequestHeader, payload_size: PayloadSize, header_size: usize) -> Result<(), ParseError> {
        let (size, limit) = if header.is_multipart() {
            (0, self.max_multipart_size)
        } else {
            (header_size as u64, self.max_request_size)
        };

        if let PayloadSize::Length(length) = payload_size {
            let declared = size.saturating_add(length);
            ensure!(declared <= limit as u64, ParseError::too_large_body(declared, limit));
        }

        self.expect_continue = header.expects_continue() && !payload_size.is_empty();
        trace!(method = %header.method(), uri = %header.uri(), ?payload_size, "request header assembled");

        self.current = Some(CurrentRequest {
            header,
            payload_decoder: payload_size.into(),
            body: BytesMut::new(),
            size,
            limit,
        });
        Ok(())
    }
}

impl Decoder for RequestAssembler {
    type Item = Request<Bytes>;
    type Error = ParseError;

    /// Advances the current request with whatever `src` holds.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(request))`: a request is complete; its bytes were consumed from `src`
    /// - `Ok(None)`: more data is needed
    /// - `Err(_)`: the input is malformed or over a size limit; the connection
    ///   can't be resynchronised and must be closed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.current.is_none() {
            let before = src.len();
            let Some((header, payload_size)) = self.header_decoder.decode(src)? else {
                return Ok(None);
            };
            self.start(header, payload_size, before - src.len())?;
        }

        let Some(current) = &mut self.current else {
            return Ok(None);
        };

        loop {
            match current.payload_decoder.decode(src)? {
                Some(PayloadItem::Chunk(bytes)) => {
                    current.size += bytes.len() as u64;
                    ensure!(current.size <= current.limit as u64, ParseError::too_large_body(current.size, current.limit));
                    current.body.extend_from_slice(&bytes);
                }
                Some(PayloadItem::Eof) => {
                    let Some(CurrentRequest { header, body, .. }) = self.current.take() else {
                        return Ok(None);
                    };
                    self.expect_continue = false;
                    return Ok(Some(header.body(body.freeze())));
                }
                None => return Ok(None),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;
    use indoc::indoc;

    fn assembler() -> RequestAssembler {
        RequestAssembler::new(16_000, 1_000_000)
    }

    fn drain(assembler: &mut RequestAssembler, buf: &mut BytesMut) -> Vec<Request<Bytes>> {
        let mut requests = Vec::new();
        while let Some(request) = assembler.decode(buf).unwrap() {
            requests.push(request);
        }
        requests
    }

    #[test]
    fn pipelined_requests_in_one_buffer() {
        let str = indoc! {r##"
        GET /first HTTP/1.1
        Host: 127.0.0.1:8080

        POST /second HTTP/1.1
        Host: 127.0.0.1:8080
        Content-Length: 5

        helloGET /third HTTP/1.1
        Host: 127.0.0.1:8080

        "##};

        let mut buf = BytesMut::from(str);
        let requests = drain(&mut assembler(), &mut buf);

        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].uri().path(), "/first");
        assert_eq!(requests[1].method(), &Method::POST);
        assert_eq!(&requests[1].body()[..], b"hello");
        assert_eq!(requests[2].uri().path(), "/third");
        assert!(buf.is_empty());
    }

    #[test]
    fn request_split_across_reads() {
        let mut assembler = assembler();
        let mut buf = BytesMut::new();

        for piece in ["POST /up", "load HTTP/1.1\r\nContent-", "Length: 11\r\n\r\nhello", " world"] {
            assert!(assembler.decode(&mut buf).unwrap().is_none());
            buf.extend_from_slice(piece.as_bytes());
        }

        assert!(assembler.has_partial());
        let request = assembler.decode(&mut buf).unwrap().unwrap();
        assert_eq!(request.uri().path(), "/upload");
        assert_eq!(&request.body()[..], b"hello world");
        assert!(!assembler.has_partial());
    }

    #[test]
    fn chunked_body() {
        let mut buf = BytesMut::from("POST /chunked HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n");
        let requests = drain(&mut assembler(), &mut buf);
        assert_eq!(requests.len(), 1);
        assert_eq!(&requests[0].body()[..], b"hello");
    }

    #[test]
    fn declared_length_over_limit() {
        let mut assembler = RequestAssembler::new(100, 1_000);
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: 5000\r\n\r\n");

        let result = assembler.decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooLargeBody { max_size: 100, .. })));
    }

    #[test]
    fn chunked_body_over_limit() {
        let mut assembler = RequestAssembler::new(80, 1_000);
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n20\r\n");
        assert!(assembler.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[b'x'; 32]);
        assert!(matches!(assembler.decode(&mut buf), Err(ParseError::TooLargeBody { .. })));
    }

    #[test]
    fn multipart_uses_its_own_limit() {
        let body = "x".repeat(500);
        let raw = format!(
            "POST /form HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=b\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        );

        let mut buf = BytesMut::from(raw.as_str());
        let requests = drain(&mut RequestAssembler::new(200, 1_000), &mut buf);
        assert_eq!(requests[0].body().len(), 500);

        let mut buf = BytesMut::from(raw.as_str());
        assert!(RequestAssembler::new(200, 400).decode(&mut buf).is_err());
    }

    #[test]
    fn header_over_limit() {
        let mut assembler = RequestAssembler::new(64, 1_000);
        let mut buf = BytesMut::from(format!("GET / HTTP/1.1\r\nX-Filler: {}\r\n\r\n", "a".repeat(100)).as_str());
        assert!(matches!(assembler.decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));
    }

    #[test]
    fn expect_continue_reported_once() {
        let mut assembler = assembler();
        let mut buf = BytesMut::from("PUT /file HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 4\r\n\r\n");

        assert!(assembler.decode(&mut buf).unwrap().is_none());
        assert!(assembler.take_expect_continue());
        assert!(!assembler.take_expect_continue());

        buf.extend_from_slice(b"data");
        assert!(assembler.decode(&mut buf).unwrap().is_some());
    }

    #[test]
    fn reset_discards_partial() {
        let mut assembler = assembler();
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc");
        assert!(assembler.decode(&mut buf).unwrap().is_none());
        assert!(assembler.has_partial());

        assembler.reset();
        assert!(!assembler.has_partial());
    }
}
