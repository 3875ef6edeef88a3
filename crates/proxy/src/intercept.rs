use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use chrono::Utc;
use complyze_classify::{classify, estimate_tokens, hash_with_fixed_salt, inspect_multipart};
use complyze_core::{ActivityEvent, Category, ClassificationResult, RiskCategory};
use complyze_forward::forward;
use complyze_mitm::{
    accept_tls, is_pinning_failure_err, write_bad_gateway, write_payload_too_large, write_response,
    BodyLimits, BodyMode, PinningStore, RequestHead, RequestReader,
};
use complyze_policy::{compute_reu, resolve, ExposureKind, PolicyAction};
use complyze_telemetry::{SizeLimitKind, TelemetryRecord};
use http_body_util::Full;
use hyper::{Request as HyperRequest, Uri};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::destination_tier::tier_for_host;
use crate::state::ProxyState;

/// Handles one deep-inspect CONNECT tunnel end to end: TLS termination,
/// request parsing, classification, policy enforcement, upstream
/// forwarding, and writing the response back to the client.
pub async fn handle_deep_inspect(
    state: ProxyState,
    tcp: TcpStream,
    host: String,
    port: u16,
    pinning: Arc<PinningStore>,
) {
    let manager = state.cert_manager.clone();
    let tls = match accept_tls(manager, tcp).await {
        Ok(tls) => tls,
        Err(err) => {
            let message = err.to_string();
            if is_pinning_failure_err(&err) {
                info!(host, %message, "TLS handshake rejected, likely certificate pinning");
                pinning.record_failure(&host, &message, Utc::now());
            } else {
                debug!(host, %message, "TLS handshake failed");
            }
            return;
        }
    };

    let mut reader = RequestReader::new(tls);
    let limits = BodyLimits {
        inspection_cap_bytes: (state.config.max_inspection_size_mb * 1024 * 1024) as usize,
        hard_cap_bytes: (state.config.max_body_size_mb * 1024 * 1024) as usize,
    };

    loop {
        let head = match reader.next_head().await {
            Ok(Some(head)) => head,
            Ok(None) => break,
            Err(err) => {
                debug!(host, %err, "request parse failed, closing intercepted connection");
                break;
            }
        };

        if let Err(err) = handle_one_request(&state, &mut reader, &head, &host, port, limits).await
        {
            warn!(host, %err, "error servicing intercepted request");
            break;
        }
    }
}

async fn handle_one_request(
    state: &ProxyState,
    reader: &mut RequestReader<tokio_rustls::server::TlsStream<TcpStream>>,
    head: &RequestHead,
    host: &str,
    port: u16,
    limits: BodyLimits,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = state.settings.load();
    let mode = limits.decide(head);

    let body = match mode {
        BodyMode::Draining => {
            write_payload_too_large(reader.get_mut()).await?;
            reader.drain_body(head.content_length).await?;
            state
                .telemetry
                .record(&TelemetryRecord::SizeLimit {
                    timestamp: Utc::now(),
                    kind: SizeLimitKind::BodyTooLarge,
                    hostname: host.to_string(),
                    declared_bytes: head.content_length as u64,
                    limit_bytes: limits.hard_cap_bytes as u64,
                })
                .ok();
            return Ok(());
        }
        BodyMode::Streaming => {
            state
                .telemetry
                .record(&TelemetryRecord::SizeLimit {
                    timestamp: Utc::now(),
                    kind: SizeLimitKind::AttachmentSizeLimit,
                    hostname: host.to_string(),
                    declared_bytes: head.content_length as u64,
                    limit_bytes: limits.inspection_cap_bytes as u64,
                })
                .ok();

            match complyze_forward::connect_tls(
                &complyze_forward::upstream_tls_connector(),
                host,
                port,
            )
            .await
            {
                Ok(mut upstream) => {
                    write_request_head(&mut upstream, head).await?;
                    let bytes_piped = reader
                        .stream_body_to(head.content_length, &mut upstream)
                        .await?;
                    debug!(host, bytes_piped, "streamed oversized multipart body upstream without inspection");
                    tokio::io::copy_bidirectional(reader.get_mut(), &mut upstream).await?;
                }
                Err(err) => {
                    warn!(host, %err, "upstream connect failed for streamed attachment");
                    reader.drain_body(head.content_length).await.ok();
                    write_bad_gateway(reader.get_mut()).await.ok();
                }
            }
            return Ok(());
        }
        BodyMode::Buffered => reader.read_buffered_body(head.content_length).await?,
    };

    let is_attachment = head.is_multipart() && settings.inspect_attachments;
    let start = Instant::now();
    let deadline = Duration::from_millis(state.config.inspection_timeout_ms);
    let classification = match timeout(deadline, async {
        if is_attachment {
            classify_multipart(body.clone(), head).await
        } else {
            classify(&String::from_utf8_lossy(&body))
        }
    })
    .await
    {
        Ok(result) => result,
        Err(_) => {
            let inspection_ms = start.elapsed().as_millis() as u64;
            warn!(host, inspection_ms, "classifier deadline exceeded");
            state
                .telemetry
                .record(&TelemetryRecord::InspectionError {
                    timestamp: Utc::now(),
                    request_id: Uuid::new_v4().to_string(),
                    hostname: host.to_string(),
                    file_size: body.len() as u64,
                    error_message: "classifier deadline exceeded".to_string(),
                    inspection_ms,
                    fail_open: state.config.fail_open,
                    action: if state.config.fail_open { "forwarded".to_string() } else { "blocked".to_string() },
                })
                .ok();
            if state.config.fail_open {
                forward_and_relay(state, reader, head, host, port, body.to_vec()).await?;
            } else {
                write_response(
                    reader.get_mut(),
                    503,
                    "Service Unavailable",
                    "application/json",
                    br#"{"error":"classification timed out"}"#,
                )
                .await?;
            }
            return Ok(());
        }
    };
    let inspection_ms = start.elapsed().as_millis() as u64;
    if inspection_ms > 300 {
        warn!(host, inspection_ms, "inspection latency exceeded 300ms");
    }
    if is_attachment {
        state.monitor.observe_attachment_latency(inspection_ms as f64);
    } else {
        state.monitor.observe_text_latency(inspection_ms as f64);
    }

    let enforcement_mode = settings.effective_enforcement_mode();
    let outcome = resolve(enforcement_mode, &classification, &body);

    if classification.policy_violation_flag {
        let exposure = if head.is_multipart() {
            ExposureKind::Attachment
        } else {
            ExposureKind::TextOnly
        };
        let reu = compute_reu(
            classification.sensitivity_score,
            exposure,
            tier_for_host(host),
        );
        if let Some(action) = outcome.enforcement_action {
            state
                .telemetry
                .record(&TelemetryRecord::EnforcementDecision {
                    timestamp: Utc::now(),
                    hostname: host.to_string(),
                    path: head.path.clone(),
                    detection_result: classification.clone(),
                    reu_score: reu,
                    enforcement_mode,
                    enforcement_action: action,
                })
                .ok();
        }
    }

    // Emitted for every inspected request, sensitive or not, per the
    // activity-event contract; only the enforcement-related fields are
    // conditional on the classification actually being a violation.
    let full_prompt = settings
        .full_audit_mode
        .then(|| String::from_utf8_lossy(&body).into_owned());
    let prompt_hash = hash_with_fixed_salt(&String::from_utf8_lossy(&body));
    let event = ActivityEvent {
        id: Uuid::new_v4().to_string(),
        schema_version: complyze_core::ACTIVITY_EVENT_SCHEMA_VERSION,
        tool: host.to_string(),
        tool_domain: host.to_string(),
        user_hash: hash_with_fixed_salt(host),
        prompt_hash,
        prompt_length: body.len(),
        token_count_estimate: estimate_tokens(&String::from_utf8_lossy(&body)) as u64,
        api_endpoint: head.path.clone(),
        sensitivity_score: classification.sensitivity_score,
        sensitivity_categories: classification.categories_detected.clone(),
        policy_violation_flag: classification.policy_violation_flag,
        risk_category: classification.risk_category,
        timestamp: Utc::now(),
        blocked: Some(outcome.blocked),
        enforcement_action: outcome.enforcement_action,
        attachment_inspection_enabled: settings.inspect_attachments,
        full_prompt,
    };
    let control = state.control.clone();
    let workspace_id = state.config.workspace_id.clone();
    tokio::spawn(async move {
        let request = complyze_control::InterceptEventRequest {
            target_url: format!("https://{}{}", event.tool_domain, event.api_endpoint),
            method: "POST".to_string(),
            headers: Default::default(),
            body: event.full_prompt.clone().unwrap_or_default(),
            user_id: event.user_hash.clone(),
            log_only: false,
            dlp: ClassificationResult {
                categories_detected: event.sensitivity_categories.clone(),
                sensitivity_score: event.sensitivity_score,
                policy_violation_flag: event.policy_violation_flag,
                risk_category: event.risk_category,
                details: Vec::new(),
            },
            workspace_id,
            enforcement_action: event.enforcement_action,
            blocked: event.blocked,
            risk_category: event.risk_category,
        };
        let _ = control.post_event(request).await;
    });

    match outcome.action {
        PolicyAction::WarnResponse { json_body } => {
            write_warn_response(reader.get_mut(), &json_body).await?;
        }
        PolicyAction::BlockResponse { json_body } => {
            write_response(reader.get_mut(), 403, "Forbidden", "application/json", &json_body)
                .await?;
        }
        PolicyAction::Forward { body: forward_body } => {
            forward_and_relay(state, reader, head, host, port, forward_body).await?;
        }
    }

    Ok(())
}

/// Writes a request head verbatim to `upstream` for STREAMING mode, where
/// the body is piped raw and must never pass through a buffering HTTP
/// client abstraction.
async fn write_request_head<W: tokio::io::AsyncWrite + Unpin>(
    upstream: &mut W,
    head: &RequestHead,
) -> std::io::Result<()> {
    let mut line = format!("{} {} HTTP/1.1\r\n", head.method, head.path);
    for (name, value) in &head.headers {
        if name.eq_ignore_ascii_case("proxy-connection") {
            continue;
        }
        line.push_str(name);
        line.push_str(": ");
        line.push_str(value);
        line.push_str("\r\n");
    }
    line.push_str("\r\n");
    upstream.write_all(line.as_bytes()).await
}

async fn classify_multipart(body: Bytes, head: &RequestHead) -> ClassificationResult {
    let boundary = head.boundary.clone().unwrap_or_default();
    let inspection = inspect_multipart(body, &boundary).await;
    if inspection.files.is_empty() {
        return ClassificationResult::empty();
    }
    ClassificationResult {
        categories_detected: if inspection.aggregated_categories.is_empty() {
            vec![Category::None]
        } else {
            inspection.aggregated_categories
        },
        sensitivity_score: inspection.max_sensitivity_score,
        policy_violation_flag: inspection
            .files
            .iter()
            .any(|f| f.classification.policy_violation_flag),
        risk_category: inspection
            .files
            .iter()
            .map(|f| f.classification.risk_category)
            .max()
            .unwrap_or(RiskCategory::Low),
        details: Vec::new(),
    }
}

async fn write_warn_response(
    writer: &mut tokio_rustls::server::TlsStream<TcpStream>,
    json_body: &[u8],
) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 299 Complyze Warning\r\nX-Complyze-Warning: true\r\nX-Complyze-Enforcement: warn\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n",
        json_body.len()
    );
    writer.write_all(head.as_bytes()).await?;
    writer.write_all(json_body).await?;
    Ok(())
}

async fn forward_and_relay(
    state: &ProxyState,
    reader: &mut RequestReader<tokio_rustls::server::TlsStream<TcpStream>>,
    head: &RequestHead,
    host: &str,
    port: u16,
    body: Vec<u8>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let uri: Uri = head.path.parse().unwrap_or_else(|_| Uri::from_static("/"));
    let mut builder = HyperRequest::builder().method(head.method.as_str()).uri(uri);
    for (name, value) in &head.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    let request = builder.body(Full::new(Bytes::from(body)))?;

    match forward(&state.upstream_tls, host, port, request).await {
        Ok(forwarded) => relay_response(reader.get_mut(), forwarded).await?,
        Err(err) => {
            warn!(host, %err, "upstream forward failed");
            write_bad_gateway(reader.get_mut()).await?;
        }
    }
    Ok(())
}

async fn relay_response(
    writer: &mut tokio_rustls::server::TlsStream<TcpStream>,
    forwarded: complyze_forward::ForwardedResponse,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use http_body_util::BodyExt;

    let (parts, mut body) = forwarded.response.into_parts();
    let reason = parts.status.canonical_reason().unwrap_or("");
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        parts.status.as_u16(),
        reason
    );
    for (name, value) in parts.headers.iter() {
        head.push_str(name.as_str());
        head.push_str(": ");
        head.push_str(value.to_str().unwrap_or(""));
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    writer.write_all(head.as_bytes()).await?;
    if forwarded.is_event_stream {
        writer.flush().await?;
    }

    while let Some(frame) = body.frame().await {
        let frame = frame?;
        if let Some(chunk) = frame.data_ref() {
            writer.write_all(chunk).await?;
            if forwarded.is_event_stream {
                writer.flush().await?;
            }
        }
    }
    Ok(())
}
