use std::io;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// The reason a connection was torn down.
///
/// Every variant leads to the same teardown path; the distinction only
/// matters for logging.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("no data received within {0:?}")]
    ReadTimeout(Duration),

    #[error("tls handshake failed: {source}")]
    Handshake { source: io::Error },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: io::Error,
    },

    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },
}

impl HttpError {
    pub fn handshake(e: io::Error) -> Self {
        Self::Handshake { source: e }
    }

    /// Returns true when the peer went away (reset, broken pipe, eof)
    /// rather than the server deciding to close.
    pub fn is_disconnect(&self) -> bool {
        let io_error = match self {
            HttpError::Transport { source } => source,
            HttpError::ResponseError { source: SendError::Io { source } } => source,
            _ => return false,
        };

        matches!(
            io_error.kind(),
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        )
    }
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeHeader { current_size: usize, max_size: usize },

    #[error("header number exceed the limit {max_num}")]
    TooManyHeaders { max_num: usize },

    #[error("request size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeBody { current_size: u64, max_size: usize },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(Option<u8>),

    #[error("invalid http method")]
    InvalidMethod,

    #[error("invalid http uri")]
    InvalidUri,

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn too_large_header(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeHeader { current_size, max_size }
    }

    pub fn too_many_headers(max_num: usize) -> Self {
        Self::TooManyHeaders { max_num }
    }

    pub fn too_large_body(current_size: u64, max_size: usize) -> Self {
        Self::TooLargeBody { current_size, max_size }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    /// The status of the best-effort response sent before the connection is dropped.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ParseError::TooLargeHeader { .. } | ParseError::TooManyHeaders { .. } => {
                StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
            }
            ParseError::TooLargeBody { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }
}

/// Errors reported to the pool when handing a socket to a worker.
///
/// Both variants are pool-level programming or lifecycle errors, never
/// request-level failures.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkerError {
    #[error("worker {0} is busy")]
    Busy(usize),

    #[error("worker {0} has stopped")]
    Stopped(usize),
}
