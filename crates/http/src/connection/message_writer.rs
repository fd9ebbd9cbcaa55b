use std::fmt::Display;

use bytes::{Buf, Bytes, BytesMut};
use http::Response;
use http_body::Body;
use http_body_util::BodyExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::ResponseEncoder;
use crate::protocol::{Message, PayloadItem, PayloadSize, ResponseHead, SendError};

/// Buffered bytes beyond which a streaming body is written out early.
const FLUSH_THRESHOLD: usize = 64 * 1024;

/// Encodes responses into a buffer and writes them to the underlying stream.
///
/// The writer also owns the stream, so the connection reads through
/// [`get_mut`](MessageWriter::get_mut).
#[derive(Debug)]
pub struct MessageWriter<W> {
    writer: W,
    buffer: BytesMut,
    encoder: ResponseEncoder,
}

impl<W> MessageWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn with_capacity(writer: W, buffer_size: usize) -> Self {
        Self { writer, buffer: BytesMut::with_capacity(buffer_size), encoder: ResponseEncoder::new() }
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn clear_buf(&mut self) {
        self.buffer.clear();
    }

    #[inline]
    pub fn write<D>(&mut self, item: Message<(ResponseHead, PayloadSize), D>) -> Result<(), SendError>
    where
        D: Buf,
    {
        self.encoder.encode(item, &mut self.buffer)
    }

    #[inline]
    pub async fn flush(&mut self) -> Result<(), SendError> {
        if !self.buffer.is_empty() {
            self.writer.write_all(self.buffer.as_ref()).await?;
            self.buffer.clear();
        }
        Ok(self.writer.flush().await?)
    }

    /// Writes the interim `100 Continue` status line.
    pub async fn write_continue(&mut self) -> Result<(), SendError> {
        self.buffer.extend_from_slice(b"HTTP/1.1 100 Continue\r\n\r\n");
        self.flush().await
    }

    /// Encodes `response` completely and flushes it.
    ///
    /// A body with an exact size hint is framed with `Content-Length`, any
    /// other body is sent chunked. Trailers are dropped.
    pub async fn send_response<B>(&mut self, response: Response<B>) -> Result<(), SendError>
    where
        B: Body<Data = Bytes> + Unpin,
        B::Error: Display,
    {
        let (parts, mut body) = response.into_parts();

        let payload_size = match body.size_hint().exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        };
        trace!(status = %parts.status, ?payload_size, "sending response");

        self.write(Message::<_, Bytes>::Header((ResponseHead::from_parts(parts, ()), payload_size)))?;

        if !payload_size.is_empty() {
            loop {
                let frame = match body.frame().await {
                    Some(Ok(frame)) => frame,
                    Some(Err(e)) => {
                        self.clear_buf();
                        return Err(SendError::invalid_body(format!("resolve response body error: {e}")));
                    }
                    None => break,
                };

                if let Ok(data) = frame.into_data() {
                    self.write(Message::<(ResponseHead, PayloadSize), _>::Payload(PayloadItem::Chunk(data)))?;
                }
                if self.buffer.len() >= FLUSH_THRESHOLD {
                    self.flush().await?;
                }
            }
            self.write(Message::<(ResponseHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof))?;
        }

        self.flush().await
    }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;
    use http_body_util::{Full, StreamBody};
    use tokio::io::{AsyncReadExt, duplex};

    use super::*;

    async fn written(response: Response<impl Body<Data = Bytes, Error: Display> + Unpin>) -> String {
        let (mut client, server) = duplex(64 * 1024);
        let mut writer = MessageWriter::with_capacity(server, 1024);
        writer.send_response(response).await.unwrap();
        drop(writer);

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn sized_body() {
        let out = written(Response::new(Full::new(Bytes::from_static(b"hello")))).await;
        assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(out.contains("content-length: 5\r\n"));
        assert!(out.ends_with("\r\n\r\nhello"));
    }

    #[tokio::test]
    async fn streamed_body_is_chunked() {
        let chunks = futures::stream::iter(vec![
            Ok::<_, std::convert::Infallible>(http_body::Frame::data(Bytes::from_static(b"abc"))),
            Ok(http_body::Frame::data(Bytes::from_static(b"de"))),
        ]);
        let out = written(Response::new(StreamBody::new(chunks))).await;
        assert!(out.contains("transfer-encoding: chunked\r\n"));
        assert!(out.ends_with("3\r\nabc\r\n2\r\nde\r\n0\r\n\r\n"));
    }

    #[tokio::test]
    async fn continue_line() {
        let (mut client, server) = duplex(1024);
        let mut writer = MessageWriter::with_capacity(server, 1024);
        writer.write_continue().await.unwrap();
        drop(writer);

        let mut out = String::new();
        client.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "HTTP/1.1 100 Continue\r\n\r\n");
    }

    #[tokio::test]
    async fn empty_error_response() {
        let out = written(crate::protocol::error_response(StatusCode::BAD_REQUEST, true)).await;
        assert!(out.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert!(out.contains("connection: close\r\n"));
    }
}
