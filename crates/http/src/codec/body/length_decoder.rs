//! Decoder for bodies framed by `Content-Length`.

use std::cmp;

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Hands out body bytes until the declared length has been consumed.
///
/// Bytes past the declared length are left in the buffer: they belong to the
/// next pipelined request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { remaining: length }
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        let len = usize::try_from(self.remaining).map_or(src.len(), |remaining| cmp::min(remaining, src.len()));
        let bytes = src.split_to(len).freeze();

        self.remaining -= len as u64;
        Ok(Some(PayloadItem::Chunk(bytes)))
    }
}
