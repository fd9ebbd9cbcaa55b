//! Body framing for requests and responses.
//!
//! ## Decoders
//! - [`PayloadDecoder`]: picks `Content-Length` or chunked decoding for a request body
//!
//! ## Encoders
//! - [`PayloadEncoder`]: writes a response body with `Content-Length` or chunked framing

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
