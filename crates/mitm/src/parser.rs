use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::MitmError;

/// Headers are never allowed to grow past this before the connection is
/// treated as malformed; a legitimate AI-provider request head is a few KB.
const MAX_HEADER_BYTES: usize = 64 * 1024;
const READ_CHUNK: usize = 8 * 1024;
const MAX_HEADERS: usize = 64;

#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub content_length: usize,
    pub boundary: Option<String>,
}

impl RequestHead {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.boundary.is_some()
    }
}

/// What the caller must do with the body bytes, per the inspection cap and
/// hard cap thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyMode {
    /// Content-Length <= inspection cap, or not multipart: read fully into
    /// memory for the classifier/policy pipeline.
    Buffered,
    /// Multipart and over the inspection cap: pipe through to the upstream
    /// forwarder untouched, no DLP inspection.
    Streaming,
    /// Over the hard cap: reject with 413 and discard the declared bytes.
    Draining,
}

#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    pub inspection_cap_bytes: usize,
    pub hard_cap_bytes: usize,
}

impl Default for BodyLimits {
    fn default() -> Self {
        BodyLimits {
            inspection_cap_bytes: 15 * 1024 * 1024,
            hard_cap_bytes: 50 * 1024 * 1024,
        }
    }
}

impl BodyLimits {
    pub fn decide(&self, head: &RequestHead) -> BodyMode {
        if head.content_length > self.hard_cap_bytes {
            BodyMode::Draining
        } else if head.is_multipart() && head.content_length > self.inspection_cap_bytes {
            BodyMode::Streaming
        } else {
            BodyMode::Buffered
        }
    }
}

/// Reads length-delimited HTTP/1.1 requests off a single decrypted TLS
/// stream, holding any bytes read past the header terminator so the next
/// call picks up exactly where parsing left off.
pub struct RequestReader<S> {
    stream: S,
    buf: BytesMut,
}

impl<S> RequestReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        RequestReader {
            stream,
            buf: BytesMut::new(),
        }
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Reads and parses the next request head. Returns `Ok(None)` if the
    /// peer closed the connection cleanly between requests.
    pub async fn next_head(&mut self) -> Result<Option<RequestHead>, MitmError> {
        loop {
            if let Some(head) = self.try_parse()? {
                return Ok(Some(head));
            }
            if self.buf.len() > MAX_HEADER_BYTES {
                return Err(MitmError::HeadersTooLarge(MAX_HEADER_BYTES));
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(MitmError::MalformedRequest)
                };
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn try_parse(&mut self) -> Result<Option<RequestHead>, MitmError> {
        let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut parsed = httparse::Request::new(&mut header_storage);
        let status = parsed
            .parse(&self.buf)
            .map_err(|_| MitmError::MalformedRequest)?;
        let consumed = match status {
            httparse::Status::Complete(n) => n,
            httparse::Status::Partial => return Ok(None),
        };

        let method = parsed.method.ok_or(MitmError::MalformedRequest)?.to_string();
        let path = parsed.path.ok_or(MitmError::MalformedRequest)?.to_string();
        let headers: Vec<(String, String)> = parsed
            .headers
            .iter()
            .map(|h| (h.name.to_string(), String::from_utf8_lossy(h.value).into_owned()))
            .collect();

        let content_length = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let boundary = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .and_then(|(_, v)| extract_boundary(v));

        let _ = self.buf.split_to(consumed);

        Ok(Some(RequestHead {
            method,
            path,
            headers,
            content_length,
            boundary,
        }))
    }

    /// Reads exactly `content_length` bytes into memory for BUFFERED mode.
    pub async fn read_buffered_body(&mut self, content_length: usize) -> Result<Bytes, MitmError> {
        while self.buf.len() < content_length {
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(MitmError::MalformedRequest);
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
        Ok(self.buf.split_to(content_length).freeze())
    }

    /// STREAMING mode: copies `content_length` bytes verbatim to `sink`
    /// without ever holding the whole body in memory.
    pub async fn stream_body_to<W>(&mut self, content_length: usize, sink: &mut W) -> Result<u64, MitmError>
    where
        W: AsyncWrite + Unpin,
    {
        self.copy_exact(content_length, Some(sink)).await
    }

    /// DRAINING mode: reads and discards `content_length` declared bytes so
    /// the stream is left positioned at the next request.
    pub async fn drain_body(&mut self, content_length: usize) -> Result<u64, MitmError> {
        self.copy_exact::<tokio::io::Sink>(content_length, None).await
    }

    async fn copy_exact<W>(&mut self, content_length: usize, mut sink: Option<&mut W>) -> Result<u64, MitmError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut remaining = content_length;
        let mut total = 0u64;

        if !self.buf.is_empty() {
            let take = remaining.min(self.buf.len());
            let chunk = self.buf.split_to(take);
            if let Some(w) = sink.as_mut() {
                w.write_all(&chunk).await?;
            }
            remaining -= take;
            total += take as u64;
        }

        let mut chunk = [0u8; READ_CHUNK];
        while remaining > 0 {
            let to_read = remaining.min(READ_CHUNK);
            let n = self.stream.read(&mut chunk[..to_read]).await?;
            if n == 0 {
                return Err(MitmError::MalformedRequest);
            }
            if let Some(w) = sink.as_mut() {
                w.write_all(&chunk[..n]).await?;
            }
            remaining -= n;
            total += n as u64;
        }
        Ok(total)
    }
}

fn extract_boundary(content_type: &str) -> Option<String> {
    if !content_type.to_ascii_lowercase().starts_with("multipart/form-data") {
        return None;
    }
    content_type.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("boundary=")
            .map(|b| b.trim_matches('"').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn parses_request_without_body() {
        let (mut client, server) = duplex(4096);
        client
            .write_all(b"GET /v1/models HTTP/1.1\r\nHost: api.openai.com\r\n\r\n")
            .await
            .unwrap();
        let mut reader = RequestReader::new(server);
        let head = reader.next_head().await.unwrap().unwrap();
        assert_eq!(head.method, "GET");
        assert_eq!(head.path, "/v1/models");
        assert_eq!(head.content_length, 0);
    }

    #[tokio::test]
    async fn reads_buffered_body_and_advances_to_next_request() {
        let (mut client, server) = duplex(4096);
        client
            .write_all(b"POST /v1/chat HTTP/1.1\r\nContent-Length: 5\r\n\r\nhelloGET /next HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        let mut reader = RequestReader::new(server);
        let head = reader.next_head().await.unwrap().unwrap();
        assert_eq!(head.content_length, 5);
        let body = reader.read_buffered_body(head.content_length).await.unwrap();
        assert_eq!(&body[..], b"hello");

        let next = reader.next_head().await.unwrap().unwrap();
        assert_eq!(next.path, "/next");
    }

    #[tokio::test]
    async fn returns_none_on_clean_close_between_requests() {
        let (client, server) = duplex(4096);
        drop(client);
        let mut reader = RequestReader::new(server);
        assert!(reader.next_head().await.unwrap().is_none());
    }

    #[test]
    fn body_limits_pick_streaming_for_large_multipart() {
        let limits = BodyLimits {
            inspection_cap_bytes: 100,
            hard_cap_bytes: 1000,
        };
        let head = RequestHead {
            method: "POST".into(),
            path: "/upload".into(),
            headers: vec![],
            content_length: 500,
            boundary: Some("XYZ".into()),
        };
        assert_eq!(limits.decide(&head), BodyMode::Streaming);
    }

    #[test]
    fn body_limits_pick_draining_over_hard_cap() {
        let limits = BodyLimits::default();
        let head = RequestHead {
            method: "POST".into(),
            path: "/upload".into(),
            headers: vec![],
            content_length: 60 * 1024 * 1024,
            boundary: None,
        };
        assert_eq!(limits.decide(&head), BodyMode::Draining);
    }

    #[test]
    fn extracts_multipart_boundary() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=abc123"),
            Some("abc123".to_string())
        );
        assert_eq!(extract_boundary("application/json"), None);
    }
}
