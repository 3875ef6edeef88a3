use complyze_core::Settings;
use tracing::warn;

use crate::error::ControlError;
use crate::models::{HeartbeatRequest, HeartbeatResponse, InterceptEventRequest};

/// Thin typed wrapper around the loopback control-plane HTTP/JSON API.
/// Every method here is best-effort: callers log a warning and move on,
/// they never propagate a failure into the forwarding path.
pub struct ControlPlaneClient {
    http: reqwest::Client,
    base_url: String,
    workspace_id: String,
}

impl ControlPlaneClient {
    pub fn new(base_url: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            workspace_id: workspace_id.into(),
        }
    }

    pub async fn pull_settings(&self) -> Result<Settings, ControlError> {
        let url = format!(
            "{}/api/proxy/settings?workspaceId={}",
            self.base_url, self.workspace_id
        );
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ControlError::Status {
                endpoint: "settings",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json::<Settings>().await?)
    }

    pub async fn heartbeat(&self, request: HeartbeatRequest) -> Result<HeartbeatResponse, ControlError> {
        let url = format!("{}/api/agent/heartbeat", self.base_url);
        let response = self.http.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(ControlError::Status {
                endpoint: "heartbeat",
                status: response.status().as_u16(),
            });
        }
        Ok(response.json().await.unwrap_or_default())
    }

    /// Posts one intercepted-request event. Fire-and-forget: the caller
    /// should spawn this and ignore the result, per the event-post contract.
    pub async fn post_event(&self, event: InterceptEventRequest) -> Result<(), ControlError> {
        let url = format!(
            "{}/api/proxy/intercept?workspaceId={}",
            self.base_url, self.workspace_id
        );
        let response = self.http.post(&url).json(&event).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "intercept event post rejected");
        }
        Ok(())
    }
}
