use http::{HeaderMap, HeaderName, HeaderValue};

/// Hop-by-hop headers stripped before forwarding upstream.
const HOP_BY_HOP: &[&str] = &["proxy-connection"];

/// Strips hop-by-hop headers. `Accept-Encoding`, `User-Agent`, `Cookie`, and
/// everything else pass through untouched so upstream CDNs see a normal
/// client.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// When the body was buffered/redacted, `Content-Length` must match the
/// forwarded bytes and `Transfer-Encoding` must not also be present.
pub fn rewrite_content_length(headers: &mut HeaderMap, body_len: usize) {
    headers.remove(http::header::TRANSFER_ENCODING);
    headers.insert(
        http::header::CONTENT_LENGTH,
        HeaderValue::from_str(&body_len.to_string()).expect("digit string is valid header value"),
    );
}

pub fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}

#[allow(dead_code)]
fn header_name(name: &str) -> HeaderName {
    HeaderName::from_bytes(name.as_bytes()).expect("valid header name")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_proxy_connection_header() {
        let mut headers = HeaderMap::new();
        headers.insert("proxy-connection", HeaderValue::from_static("keep-alive"));
        headers.insert("user-agent", HeaderValue::from_static("test-client"));
        strip_hop_by_hop(&mut headers);
        assert!(!headers.contains_key("proxy-connection"));
        assert!(headers.contains_key("user-agent"));
    }

    #[test]
    fn rewrite_content_length_removes_transfer_encoding() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        rewrite_content_length(&mut headers, 42);
        assert!(!headers.contains_key(http::header::TRANSFER_ENCODING));
        assert_eq!(headers.get(http::header::CONTENT_LENGTH).unwrap(), "42");
    }

    #[test]
    fn detects_event_stream_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        assert!(is_event_stream(&headers));
    }
}
