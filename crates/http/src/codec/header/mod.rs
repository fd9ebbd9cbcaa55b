//! Request header decoding and response header encoding.

mod header_decoder;
mod header_encoder;

pub use header_decoder::{DEFAULT_MAX_HEADER_BYTES, HeaderDecoder};
pub use header_encoder::HeaderEncoder;
