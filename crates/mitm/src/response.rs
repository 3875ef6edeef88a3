use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::MitmError;

/// Writes a minimal HTTP/1.1 response with a `Content-Length` body directly
/// onto the decrypted client stream. Used for everything the terminator
/// answers itself (`warn`/`block` JSON bodies, `413 Payload Too Large`)
/// rather than relaying bytes that came back from upstream.
pub async fn write_response<W>(
    writer: &mut W,
    status: u16,
    reason: &str,
    content_type: &str,
    body: &[u8],
) -> Result<(), MitmError>
where
    W: AsyncWrite + Unpin,
{
    let head = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nConnection: keep-alive\r\n\r\n",
        status = status,
        reason = reason,
        content_type = content_type,
        len = body.len(),
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(body).await?;
    Ok(())
}

pub async fn write_payload_too_large<W>(writer: &mut W) -> Result<(), MitmError>
where
    W: AsyncWrite + Unpin,
{
    write_response(
        writer,
        413,
        "Payload Too Large",
        "application/json",
        br#"{"error":"payload too large"}"#,
    )
    .await
}

pub async fn write_bad_gateway<W>(writer: &mut W) -> Result<(), MitmError>
where
    W: AsyncWrite + Unpin,
{
    write_response(
        writer,
        502,
        "Bad Gateway",
        "application/json",
        br#"{"error":"bad gateway"}"#,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_well_formed_head_and_body() {
        let mut buf = Vec::new();
        write_response(&mut buf, 200, "OK", "application/json", b"{}").await.unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("{}"));
    }
}
