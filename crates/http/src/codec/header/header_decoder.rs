//! HTTP header decoder implementation for parsing HTTP request headers
//!
//! Parses the request line and header fields with `httparse`, converts them
//! into a typed [`RequestHeader`] and decides how the body is framed.
//!
//! # Limits
//!
//! - Maximum number of headers: 64
//! - Maximum header size: configured per decoder, 8KB by default
//! - Only HTTP/1.0 and HTTP/1.1
//!
//! Header names and values are not copied out of the read buffer: the decoder
//! records their byte ranges and slices the frozen header bytes afterwards.

use std::mem::MaybeUninit;

use bytes::BytesMut;
use http::{HeaderName, HeaderValue, Request};
use httparse::{Error, Status};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;

use crate::protocol::{ParseError, PayloadSize, RequestHeader};

/// Maximum number of headers allowed in a request
const MAX_HEADER_NUM: usize = 64;

/// Default cap in bytes for the entire header section
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8 * 1024;

/// Decoder for HTTP request headers implementing the [`Decoder`] trait.
///
/// Yields the parsed [`RequestHeader`] together with the [`PayloadSize`]
/// derived from the Content-Length and Transfer-Encoding headers.
#[derive(Debug, Clone, Copy)]
pub struct HeaderDecoder {
    max_header_bytes: usize,
}

impl HeaderDecoder {
    pub fn new(max_header_bytes: usize) -> Self {
        Self { max_header_bytes }
    }
}

impl Default for HeaderDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HEADER_BYTES)
    }
}

impl Decoder for HeaderDecoder {
    type Item = (RequestHeader, PayloadSize);
    type Error = ParseError;

    /// Attempts to decode HTTP headers from the provided bytes buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some((header, payload_size)))` if a complete header was parsed; the
    ///   header bytes are split off `src`
    /// - `Ok(None)` if more data is needed
    /// - `Err(ParseError)` if parsing failed or a limit was exceeded
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Minimum valid HTTP request needs at least "GET / HTTP/1.1\r\n\r\n"
        if src.len() < 14 {
            return Ok(None);
        }

        let max_header_bytes = self.max_header_bytes;
        let mut req = httparse::Request::new(&mut []);
        // SAFETY: an array of `MaybeUninit` needs no initialization.
        let mut headers: [MaybeUninit<httparse::Header>; MAX_HEADER_NUM] = unsafe { MaybeUninit::uninit().assume_init() };

        let parsed_result = req.parse_with_uninit_headers(src, &mut headers).map_err(|e| match e {
            Error::TooManyHeaders => ParseError::too_many_headers(MAX_HEADER_NUM),
            Error::Version => ParseError::InvalidVersion(None),
            e => ParseError::invalid_header(e.to_string()),
        });

        match parsed_result? {
            Status::Complete(body_offset) => {
                trace!(header_size = body_offset, "parsed request header");
                ensure!(body_offset <= max_header_bytes, ParseError::too_large_header(body_offset, max_header_bytes));

                let header_count = req.headers.len();

                ensure!(header_count <= MAX_HEADER_NUM, ParseError::too_many_headers(MAX_HEADER_NUM));

                let mut header_index: [HeaderIndex; MAX_HEADER_NUM] = EMPTY_HEADER_INDEX_ARRAY;
                HeaderIndex::record(src, req.headers, &mut header_index);

                let version = match req.version {
                    Some(0) => http::Version::HTTP_10,
                    Some(1) => http::Version::HTTP_11,
                    _ => return Err(ParseError::InvalidVersion(req.version)),
                };

                let mut header_builder = Request::builder()
                    .method(req.method.ok_or(ParseError::InvalidMethod)?)
                    .uri(req.path.ok_or(ParseError::InvalidUri)?)
                    .version(version);

                let headers = header_builder.headers_mut().ok_or_else(|| ParseError::invalid_header("malformed request line"))?;
                headers.reserve(header_count);

                let header_bytes = src.split_to(body_offset).freeze();
                for index in &header_index[..header_count] {
                    let name = HeaderName::from_bytes(&header_bytes[index.name.0..index.name.1])
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;
                    let value = HeaderValue::from_maybe_shared(header_bytes.slice(index.value.0..index.value.1))
                        .map_err(|e| ParseError::invalid_header(e.to_string()))?;

                    headers.append(name, value);
                }

                // method and uri errors surface here, after the builder collected them
                let request = header_builder.body(()).map_err(|e| ParseError::invalid_header(e.to_string()))?;
                let header = RequestHeader::from(request);
                let payload_size = parse_payload(&header)?;

                Ok(Some((header, payload_size)))
            }
            Status::Partial => {
                ensure!(src.len() <= max_header_bytes, ParseError::too_large_header(src.len(), max_header_bytes));
                Ok(None)
            }
        }
    }
}

/// Stores the byte range positions of a header's name and value within the original buffer.
///
/// This struct is used internally by the decoder to perform zero-copy parsing of headers
/// by recording the positions of header names and values rather than copying the data.
#[derive(Clone, Copy)]
struct HeaderIndex {
    /// Start and end byte positions of the header name
    pub(crate) name: (usize, usize),
    /// Start and end byte positions of the header value
    pub(crate) value: (usize, usize),
}

const EMPTY_HEADER_INDEX: HeaderIndex = HeaderIndex { name: (0, 0), value: (0, 0) };

const EMPTY_HEADER_INDEX_ARRAY: [HeaderIndex; MAX_HEADER_NUM] = [EMPTY_HEADER_INDEX; MAX_HEADER_NUM];

impl HeaderIndex {
    /// Records the byte positions of header names and values from the parsed headers.
    ///
    /// # Arguments
    ///
    /// * `bytes` - The original bytes containing the headers
    /// * `headers` - Slice of parsed header references from httparse
    /// * `indices` - Mutable slice to store the recorded positions
    fn record(bytes: &[u8], headers: &[httparse::Header<'_>], indices: &mut [HeaderIndex]) {
        let bytes_ptr = bytes.as_ptr() as usize;
        for (header, indices) in headers.iter().zip(indices.iter_mut()) {
            let name_start = header.name.as_ptr() as usize - bytes_ptr;
            let name_end = name_start + header.name.len();
            indices.name = (name_start, name_end);
            let value_start = header.value.as_ptr() as usize - bytes_ptr;
            let value_end = value_start + header.value.len();
            indices.value = (value_start, value_end);
        }
    }
}

/// Determines how the request body is framed.
///
/// This function examines the Content-Length and Transfer-Encoding headers
/// to select the correct decoder according to RFC 7230 section 3.3.
///
/// # Arguments
///
/// * `header` - The parsed request header
///
/// # Returns
///
/// - `Empty` if no body is expected
/// - `Chunked` if Transfer-Encoding: chunked is present
/// - `Length` if Content-Length is present
///
/// # Errors
///
/// Returns `ParseError` if:
/// - Both Content-Length and Transfer-Encoding headers are present
/// - Content-Length value is invalid
fn parse_payload(header: &RequestHeader) -> Result<PayloadSize, ParseError> {
    if !header.need_body() {
        return Ok(PayloadSize::Empty);
    }

    // refer: https://www.rfc-editor.org/rfc/rfc9112.html#name-transfer-encoding
    let te_header = header.headers().get(http::header::TRANSFER_ENCODING);
    let cl_header = header.headers().get(http::header::CONTENT_LENGTH);

    match (te_header, cl_header) {
        (None, None) => Ok(PayloadSize::Empty),

        (te_value @ Some(_), None) => {
            if is_chunked(te_value) {
                Ok(PayloadSize::Chunked)
            } else {
                Ok(PayloadSize::Empty)
            }
        }

        (None, Some(cl_value)) => {
            let cl_str = cl_value.to_str().map_err(|_| ParseError::invalid_content_length("value can't to_str"))?;

            let length =
                cl_str.trim().parse::<u64>().map_err(|_| ParseError::invalid_content_length(format!("value {cl_str} is not u64")))?;

            Ok(PayloadSize::Length(length))
        }

        (Some(_), Some(_)) => Err(ParseError::invalid_content_length("transfer_encoding and content_length both present in headers")),
    }
}

/// Checks if the Transfer-Encoding header indicates chunked encoding.
///
/// According to RFC 7230, chunked must be the last encoding if present.
///
/// # Arguments
///
/// * `header_value` - Optional reference to the Transfer-Encoding header value
///
/// # Returns
///
/// Returns true if chunked is the final encoding in the Transfer-Encoding header.
fn is_chunked(header_value: Option<&HeaderValue>) -> bool {
    const CHUNKED: &[u8] = b"chunked";
    header_value
        .and_then(|value| value.as_bytes().rsplit(|b| *b == b',').next())
        .is_some_and(|last| last.trim_ascii().eq_ignore_ascii_case(CHUNKED))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method, Version};
    use indoc::indoc;

    #[test]
    fn check_is_chunked() {
        {
            let headers = HeaderMap::new();
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)))
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Accept", "foo".parse().unwrap());
            headers.insert("Transfer-Encoding", "gzip, chunked".parse().unwrap());
            headers.insert("Host", "bar".parse().unwrap());
            assert!(is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Accept", "foo".parse().unwrap());
            headers.insert("Transfer-Encoding", "chunked, gzip".parse().unwrap());
            headers.insert("Host", "bar".parse().unwrap());
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }

        {
            let mut headers = HeaderMap::new();
            headers.insert("Accept", "foo".parse().unwrap());
            headers.insert("Transfer-Encoding", "gzip".parse().unwrap());
            headers.insert("Host", "bar".parse().unwrap());
            assert!(!is_chunked(headers.get(http::header::TRANSFER_ENCODING)));
        }
    }

    #[test]
    fn test_bytes_mut_lens() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        123"##};

        let mut bytes = BytesMut::from(str);

        assert_eq!(bytes.len(), str.len());

        let mut header_decoder = HeaderDecoder::default();

        let result = header_decoder.decode(&mut bytes).unwrap();

        assert!(result.is_some());

        assert_eq!(bytes.len(), 3);
        assert_eq!(&bytes[..], &b"123"[..]);
    }

    #[test]
    fn from_curl() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);

        let (header, payload_decoder) = HeaderDecoder::default().decode(&mut buf).unwrap().unwrap();

        assert!(payload_decoder.is_empty());

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().host(), None);
        assert_eq!(header.uri().path(), "/index.html");
        assert_eq!(header.uri().scheme(), None);
        assert_eq!(header.uri().query(), None);

        assert_eq!(header.headers().len(), 3);

        assert_eq!(header.headers().get(http::header::ACCEPT), Some(&HeaderValue::from_str("*/*").unwrap()));

        assert_eq!(header.headers().get(http::header::HOST), Some(&HeaderValue::from_str("127.0.0.1:8080").unwrap()));

        assert_eq!(header.headers().get(http::header::USER_AGENT), Some(&HeaderValue::from_str("curl/7.79.1").unwrap()));
    }

    #[test]
    fn from_edge() {
        let str = indoc! {r##"
        GET /index/?a=1&b=2&a=3 HTTP/1.1
        Host: 127.0.0.1:8080
        Connection: keep-alive
        Cache-Control: max-age=0
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        sec-ch-ua-mobile: ?0
        sec-ch-ua-platform: "macOS"
        Upgrade-Insecure-Requests: 1
        User-Agent: Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.52
        Accept: text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9
        Sec-Fetch-Site: none
        Sec-Fetch-Mode: navigate
        Sec-Fetch-User: ?1
        Sec-Fetch-Dest: document
        Accept-Encoding: gzip, deflate, br
        Accept-Language: zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7

        "##};

        let mut buf = BytesMut::from(str);

        let (header, payload_decoder) = HeaderDecoder::default().decode(&mut buf).unwrap().unwrap();

        assert!(payload_decoder.is_empty());

        assert_eq!(header.method(), &Method::GET);
        assert_eq!(header.version(), Version::HTTP_11);
        assert_eq!(header.uri().host(), None);
        assert_eq!(header.uri().path(), "/index/");
        assert_eq!(header.uri().scheme(), None);
        assert_eq!(header.uri().query(), Some("a=1&b=2&a=3"));

        assert_eq!(header.headers().len(), 15);

        assert_eq!(header.headers().get(http::header::CONNECTION), Some(&HeaderValue::from_str("keep-alive").unwrap()));

        assert_eq!(header.headers().get(http::header::CACHE_CONTROL), Some(&HeaderValue::from_str("max-age=0").unwrap()));

        assert_eq!(
            header.headers().get("sec-ch-ua"),
            Some(&HeaderValue::from_str(r##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##).unwrap())
        );

        assert_eq!(header.headers().get("sec-ch-ua-mobile"), Some(&HeaderValue::from_str("?0").unwrap()));

        assert_eq!(header.headers().get("sec-ch-ua-platform"), Some(&HeaderValue::from_str("\"macOS\"").unwrap()));

        assert_eq!(header.headers().get(http::header::UPGRADE_INSECURE_REQUESTS), Some(&HeaderValue::from_str("1").unwrap()));

        assert_eq!(header.headers().get(http::header::USER_AGENT),
                   Some(&HeaderValue::from_str("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36 Edg/109.0.1518.52").unwrap()));

        assert_eq!(header.headers().get("Sec-Fetch-Site"), Some(&HeaderValue::from_str("none").unwrap()));

        assert_eq!(header.headers().get("Sec-Fetch-Mode"), Some(&HeaderValue::from_str("navigate").unwrap()));

        assert_eq!(header.headers().get("Sec-Fetch-User"), Some(&HeaderValue::from_str("?1").unwrap()));

        assert_eq!(header.headers().get("Sec-Fetch-Dest"), Some(&HeaderValue::from_str("document").unwrap()));

        assert_eq!(header.headers().get(http::header::ACCEPT_ENCODING), Some(&HeaderValue::from_str("gzip, deflate, br").unwrap()));

        assert_eq!(
            header.headers().get(http::header::ACCEPT_LANGUAGE),
            Some(&HeaderValue::from_str("zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7").unwrap())
        );
    }

    #[test]
    fn header_over_limit() {
        let str = indoc! {r##"
        GET /index.html HTTP/1.1
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##};

        let mut buf = BytesMut::from(str);
        let result = HeaderDecoder::new(32).decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooLargeHeader { max_size: 32, .. })));
    }

    #[test]
    fn partial_header_over_limit() {
        let mut buf = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: 127.0.0.1:8080\r\nX-Long: aaaaaaaaaaaaaaaa");
        assert!(matches!(HeaderDecoder::new(40).decode(&mut buf), Err(ParseError::TooLargeHeader { .. })));

        let mut buf = BytesMut::from("GET /index.html HTTP/1.1\r\nHost: 127.0.0.1:8080\r\n");
        assert!(HeaderDecoder::new(1024).decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn too_many_headers_reports_the_limit() {
        let mut raw = String::from("GET / HTTP/1.1\r\n");
        for i in 0..=MAX_HEADER_NUM {
            raw.push_str(&format!("X-H-{i}: v\r\n"));
        }
        raw.push_str("\r\n");

        let result = HeaderDecoder::default().decode(&mut BytesMut::from(raw.as_str()));
        assert!(matches!(result, Err(ParseError::TooManyHeaders { max_num: MAX_HEADER_NUM })));
    }

    #[test]
    fn bad_version() {
        let mut buf = BytesMut::from("GET / HTTP/2.0\r\nHost: a\r\n\r\n");
        assert!(HeaderDecoder::default().decode(&mut buf).is_err());
    }

    #[test]
    fn payload_framing() {
        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: 12\r\n\r\n");
        let (_, payload_size) = HeaderDecoder::default().decode(&mut buf).unwrap().unwrap();
        assert_eq!(payload_size, PayloadSize::Length(12));

        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\n\r\n");
        let (_, payload_size) = HeaderDecoder::default().decode(&mut buf).unwrap().unwrap();
        assert!(payload_size.is_chunked());

        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nTransfer-Encoding: chunked\r\nContent-Length: 3\r\n\r\n");
        assert!(matches!(HeaderDecoder::default().decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));

        let mut buf = BytesMut::from("POST /upload HTTP/1.1\r\nContent-Length: ten\r\n\r\n");
        assert!(matches!(HeaderDecoder::default().decode(&mut buf), Err(ParseError::InvalidContentLength { .. })));
    }
}
