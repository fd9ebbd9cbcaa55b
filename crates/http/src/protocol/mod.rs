//! Core HTTP protocol abstractions shared by the codec and the workers.
//!
//! - **Message Handling** ([`message`]): [`Message`], [`PayloadItem`] and
//!   [`PayloadSize`] describe a message head and its payload stream.
//! - **Request Processing** ([`request`]): [`RequestHeader`] plus the
//!   keep-alive decision in [`is_keep_alive`].
//! - **Response Processing** ([`response`]): [`ResponseHead`] and the
//!   canned [`error_response`].
//! - **Error Handling** ([`error`]): [`ParseError`] for rejected input,
//!   [`SendError`] for failed writes, [`HttpError`] for the reason a
//!   connection was torn down and [`WorkerError`] for failed assignments.

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;
pub use request::is_keep_alive;

mod response;
pub use response::ResponseHead;
pub use response::error_response;
pub use response::wants_close;

mod error;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::WorkerError;
