use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::protocol::{PayloadItem, PayloadSize, SendError};

/// encode payload for response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadEncoder {
    /// content-length payload
    Length(LengthEncoder),

    /// transfer-encoding chunked payload
    Chunked(ChunkedEncoder),

    /// no body with the response
    NoBody,
}

impl PayloadEncoder {
    pub fn is_finish(&self) -> bool {
        match self {
            PayloadEncoder::Length(encoder) => encoder.is_finish(),
            PayloadEncoder::Chunked(encoder) => encoder.is_finish(),
            PayloadEncoder::NoBody => true,
        }
    }
}

impl From<PayloadSize> for PayloadEncoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(size) => PayloadEncoder::Length(LengthEncoder::new(size)),
            PayloadSize::Chunked => PayloadEncoder::Chunked(ChunkedEncoder::new()),
            PayloadSize::Empty => PayloadEncoder::NoBody,
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match self {
            PayloadEncoder::Length(encoder) => encoder.encode(item, dst),
            PayloadEncoder::Chunked(encoder) => encoder.encode(item, dst),
            PayloadEncoder::NoBody => Ok(()),
        }
    }
}
