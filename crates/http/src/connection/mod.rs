//! Serving one accepted connection.
//!
//! - [`Transport`]: the byte stream, plain or TLS, behind one type
//! - [`ReadTimer`]: the per-worker inactivity timer
//! - [`PendingRequests`]: completed requests waiting for their response
//! - [`MessageWriter`]: response encoding and flushing
//! - [`HttpConnection`]: the event loop tying them together

mod http_connection;
mod message_writer;
mod pending;
mod timer;
mod transport;

pub use http_connection::HttpConnection;
pub use http_connection::Phase;
pub use message_writer::MessageWriter;
pub use pending::PendingRequests;
pub use timer::ReadTimer;
pub use transport::Socket;
pub use transport::Transport;
