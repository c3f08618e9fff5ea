//! HTTP client for the remote leaf detector.
//!
//! Two endpoints are used: `GET /health` to decide whether analysis is
//! possible, and `POST /detect` with a multipart `image` field.

use std::time::Duration;

use log::{debug, info, warn};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use thiserror::Error;

use crate::detection::DetectionResponse;
use crate::image_io::ImageFile;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    /// Transport-level failure: refused, timed out, DNS, ...
    #[error("Backend unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    /// Non-success status; the message is what the user sees
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    #[error("Invalid response body: {0}")]
    InvalidBody(String),
}

impl ClientError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Unreachable(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    /// No health check has run yet
    Unknown,
    Online,
    /// Reachable but answered with a non-success status
    Error,
    Offline,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerStatus::Unknown => "unknown",
            ServerStatus::Online => "online",
            ServerStatus::Error => "error",
            ServerStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

pub struct DetectionClient {
    http_client: Client,
    base_url: String,
}

impl DetectionClient {
    pub fn new(base_url: &str, connect_timeout: Duration, request_timeout: Duration) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }

    /// Probe `/health`. Never fails; transport errors map to `Offline`.
    pub async fn health(&self) -> ServerStatus {
        let url = self.url("health");
        match self.http_client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Health check OK at {}", url);
                ServerStatus::Online
            }
            Ok(response) => {
                warn!("Health check at {} returned {}", url, response.status());
                ServerStatus::Error
            }
            Err(e) => {
                warn!("Server health check failed: {}", e);
                ServerStatus::Offline
            }
        }
    }

    /// Upload an image to `/detect` and parse the predictions
    pub async fn detect(&self, image: &ImageFile) -> Result<DetectionResponse, ClientError> {
        let url = self.url("detect");
        let part = Part::bytes(image.bytes.clone())
            .file_name(image.file_name())
            .mime_str(image.mime_type())
            .map_err(|e| ClientError::InvalidBody(e.to_string()))?;
        let form = Form::new().part("image", part);

        info!("Posting {} ({} bytes) to {}", image.file_name(), image.bytes.len(), url);
        let response = self
            .http_client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(ClientError::Unreachable)?;

        let status = response.status();
        let body = response.text().await.map_err(ClientError::Unreachable)?;

        if !status.is_success() {
            let message = error_message(status, &body);
            warn!("Detect request failed: {}", message);
            return Err(ClientError::Status { status, message });
        }

        body.parse::<DetectionResponse>().map_err(ClientError::InvalidBody)
    }
}

/// The server's `{"error": "..."}` text if it sent one, else a generic status message
pub fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("Server responded with status: {}", status.as_u16()))
}
