//! Decoder for `Transfer-Encoding: chunked` request bodies
//! ([RFC 9112 section 7.1](https://www.rfc-editor.org/rfc/rfc9112#section-7.1)).
//!
//! Chunk extensions and trailer fields are validated for framing and then
//! dropped; only chunk data is handed to the assembler.

use std::cmp;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: State,
    chunk_size: u64,
    size_digits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// hex digits of the chunk size
    Size,
    /// whitespace after the size
    SizeLws,
    /// `;name=value` after the size, ignored
    Extension,
    SizeLf,
    /// `chunk_size` bytes of data remain
    Data,
    DataCr,
    DataLf,
    /// after the last chunk: either the final CRLF or a trailer field
    EndCr,
    Trailer,
    TrailerLf,
    EndLf,
    End,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: State::Size, chunk_size: 0, size_digits: 0 }
    }

    fn step(&mut self, byte: u8) -> Result<State, ParseError> {
        let next = match (self.state, byte) {
            (State::Size, b'0'..=b'9' | b'a'..=b'f' | b'A'..=b'F') => {
                // from_digit can't fail on the matched range
                let digit = u64::from((byte as char).to_digit(16).unwrap_or_default());
                self.chunk_size = self
                    .chunk_size
                    .checked_mul(16)
                    .and_then(|size| size.checked_add(digit))
                    .ok_or_else(|| ParseError::invalid_body("chunk size overflow"))?;
                self.size_digits += 1;
                State::Size
            }
            (State::Size | State::SizeLws, b'\t' | b' ') if self.size_digits > 0 => State::SizeLws,
            (State::Size | State::SizeLws, b';') if self.size_digits > 0 => State::Extension,
            (State::Size | State::SizeLws | State::Extension, b'\r') if self.size_digits > 0 => State::SizeLf,
            (State::Extension, b'\n') => return Err(ParseError::invalid_body("chunk extension contains newline")),
            (State::Extension, _) => State::Extension,
            (State::SizeLf, b'\n') if self.chunk_size == 0 => State::EndCr,
            (State::SizeLf, b'\n') => State::Data,
            (State::DataCr, b'\r') => State::DataLf,
            (State::DataLf, b'\n') => {
                self.chunk_size = 0;
                self.size_digits = 0;
                State::Size
            }
            (State::EndCr, b'\r') => State::EndLf,
            (State::Trailer, b'\r') => State::TrailerLf,
            (State::EndCr | State::Trailer, _) => State::Trailer,
            (State::TrailerLf, b'\n') => State::EndCr,
            (State::EndLf, b'\n') => State::End,
            (state, byte) => {
                return Err(ParseError::invalid_body(format!("unexpected byte {byte:#04x} in chunked state {state:?}")));
            }
        };
        Ok(next)
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                State::End => {
                    trace!("finished reading chunked data");
                    return Ok(Some(PayloadItem::Eof));
                }
                State::Data => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let read_size = usize::try_from(self.chunk_size).map_or(src.len(), |size| cmp::min(size, src.len()));
                    self.chunk_size -= read_size as u64;
                    if self.chunk_size == 0 {
                        self.state = State::DataCr;
                    }

                    trace!(len = read_size, "read chunked bytes");
                    return Ok(Some(PayloadItem::Chunk(src.split_to(read_size).freeze())));
                }
                _ => {
                    let Some(&byte) = src.first() else {
                        return Ok(None);
                    };
                    src.advance(1);
                    self.state = self.step(byte)?;
                }
            }
        }
    }
}
