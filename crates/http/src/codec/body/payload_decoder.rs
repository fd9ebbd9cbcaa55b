//! Dispatches body decoding to the framing chosen by the request header.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::LengthDecoder;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

/// A unified decoder for handling HTTP message payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadDecoder {
    /// Decode payload with a fixed content length
    Length(LengthDecoder),

    /// Decode payload using chunked transfer encoding
    Chunked(ChunkedDecoder),

    /// Handle messages with no body
    NoBody,
}

impl From<PayloadSize> for PayloadDecoder {
    fn from(payload_size: PayloadSize) -> Self {
        match payload_size {
            PayloadSize::Length(length) => PayloadDecoder::Length(LengthDecoder::new(length)),
            PayloadSize::Chunked => PayloadDecoder::Chunked(ChunkedDecoder::new()),
            PayloadSize::Empty => PayloadDecoder::NoBody,
        }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self {
            PayloadDecoder::Length(length_decoder) => length_decoder.decode(src),
            PayloadDecoder::Chunked(chunked_decoder) => chunked_decoder.decode(src),
            PayloadDecoder::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}
