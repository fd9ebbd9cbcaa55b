//! HTTP response heads and the canned responses the worker writes on its own.

use bytes::Bytes;
use http::header::{CONNECTION, HeaderValue};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Empty;

/// The header portion of a response, before the body is streamed.
pub type ResponseHead = Response<()>;

/// Builds the empty response sent when the worker itself answers a request:
/// rejected input, a failed handler, or an exhausted pool.
///
/// `close` adds `Connection: close`, telling the client the socket goes away
/// right after this response.
pub fn error_response(status_code: StatusCode, close: bool) -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::<Bytes>::new());
    *response.status_mut() = status_code;
    if close {
        response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
    }
    response
}

/// Returns true if the handler asked for the connection to be closed after this response.
pub fn wants_close(headers: &HeaderMap) -> bool {
    headers
        .get_all(CONNECTION)
        .iter()
        .flat_map(|value| value.as_bytes().split(|b| *b == b','))
        .any(|item| item.trim_ascii().eq_ignore_ascii_case(b"close"))
}
