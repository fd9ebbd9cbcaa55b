//! HTTP request header handling implementation.
//!
//! [`RequestHeader`] wraps a bodyless `http::Request` while the assembler is
//! still collecting the body, and answers the framing questions the worker
//! asks about a request: does it carry a body, is it multipart, may the
//! connection be reused after it.

use http::header::{CONNECTION, CONTENT_TYPE, EXPECT};
use http::{HeaderMap, Method, Request, Uri, Version};

/// Represents an HTTP request header.
#[derive(Debug)]
pub struct RequestHeader {
    inner: Request<()>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|()| body)
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request's URI.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    /// Determines if this request requires a body based on its HTTP method.
    ///
    /// Returns false for methods that typically don't have bodies:
    /// - GET
    /// - HEAD
    /// - DELETE
    /// - OPTIONS
    /// - CONNECT
    pub fn need_body(&self) -> bool {
        !matches!(self.method(), &Method::GET | &Method::HEAD | &Method::DELETE | &Method::OPTIONS | &Method::CONNECT)
    }

    /// Returns true if the body is `multipart/*`, which is bounded by its own size limit.
    pub fn is_multipart(&self) -> bool {
        self.headers()
            .get(CONTENT_TYPE)
            .is_some_and(|value| value.as_bytes().len() >= 10 && value.as_bytes()[..10].eq_ignore_ascii_case(b"multipart/"))
    }

    /// Returns true if the client waits for `100 Continue` before sending the body.
    pub fn expects_continue(&self) -> bool {
        self.headers().get(EXPECT).is_some_and(|value| value.as_bytes().starts_with(b"100-"))
    }
}

/// Decides whether the connection may serve another request after this one.
///
/// HTTP/1.1 stays open unless the client sent `Connection: close`; HTTP/1.0
/// closes unless the client asked for `Connection: keep-alive`.
pub fn is_keep_alive(version: Version, headers: &HeaderMap) -> bool {
    let connection_has = |token: &str| {
        headers
            .get_all(CONNECTION)
            .iter()
            .flat_map(|value| value.as_bytes().split(|b| *b == b','))
            .any(|item| item.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
    };

    match version {
        Version::HTTP_11 => !connection_has("close"),
        Version::HTTP_10 => connection_has("keep-alive"),
        _ => false,
    }
}

/// Converts a bodyless request into a RequestHeader.
impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    fn header(method: Method, headers: &[(&'static str, &'static str)]) -> RequestHeader {
        let mut builder = Request::builder().method(method).uri("/upload");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        RequestHeader::from(builder.body(()).unwrap())
    }

    #[test]
    fn body_by_method() {
        assert!(!header(Method::GET, &[]).need_body());
        assert!(!header(Method::HEAD, &[]).need_body());
        assert!(header(Method::POST, &[]).need_body());
        assert!(header(Method::PUT, &[]).need_body());
    }

    #[test]
    fn multipart_detection() {
        assert!(header(Method::POST, &[("Content-Type", "multipart/form-data; boundary=xyz")]).is_multipart());
        assert!(header(Method::POST, &[("Content-Type", "Multipart/Mixed")]).is_multipart());
        assert!(!header(Method::POST, &[("Content-Type", "application/json")]).is_multipart());
        assert!(!header(Method::POST, &[]).is_multipart());
    }

    #[test]
    fn expect_continue() {
        assert!(header(Method::POST, &[("Expect", "100-continue")]).expects_continue());
        assert!(!header(Method::POST, &[]).expects_continue());
    }

    #[test]
    fn keep_alive_rules() {
        let mut headers = HeaderMap::new();
        assert!(is_keep_alive(Version::HTTP_11, &headers));
        assert!(!is_keep_alive(Version::HTTP_10, &headers));

        headers.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
        assert!(is_keep_alive(Version::HTTP_10, &headers));

        headers.insert(CONNECTION, HeaderValue::from_static("upgrade, close"));
        assert!(!is_keep_alive(Version::HTTP_11, &headers));
    }
}
