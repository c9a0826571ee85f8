//! Workflow webhook transport.
//!
//! Delivers assembled payloads to the downstream automation:
//!   - verification reports as `multipart/form-data` with a `json_payload`
//!     text field plus `compost_file` / `meter_file` image parts
//!   - sensor alerts as a JSON body
//!
//! Delivery is single-shot. Retries, backoff and dead-lettering belong to the
//! caller or the workflow engine, not here.

use reqwest::blocking::multipart::{Form, Part};
use reqwest::header::HeaderMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::SinkConfig;
use crate::ingest::meter::mime_type_for;
use crate::report::{AlertPayload, ReportPayload};

pub const COMPOST_FILE_FIELD: &str = "compost_file";
pub const METER_FILE_FIELD: &str = "meter_file";

// ============================================================================
// Results
// ============================================================================

/// What the webhook answered.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkResponse {
    pub status: u16,
    pub webhook_id: Option<String>,
    pub workflow_id: Option<String>,
    pub body: String,
}

#[derive(Debug, PartialEq)]
pub enum SinkError {
    /// No URL configured for this payload kind.
    NotConfigured(&'static str),
    /// An attachment could not be read from disk.
    Attachment { path: String, reason: String },
    /// Connection, TLS, timeout or serialization failure.
    Request(String),
    /// The webhook answered with a non-2xx status.
    Http { status: u16, body: String },
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::NotConfigured(kind) => write!(f, "{} webhook not configured", kind),
            SinkError::Attachment { path, reason } => {
                write!(f, "Cannot attach {}: {}", path, reason)
            }
            SinkError::Request(msg) => write!(f, "Webhook request failed: {}", msg),
            SinkError::Http { status, body } => {
                write!(f, "Webhook returned HTTP {}: {}", status, body)
            }
        }
    }
}

impl std::error::Error for SinkError {}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Turns a webhook answer into a `SinkResponse`, or an error for non-2xx.
pub fn interpret_response(status: u16, headers: &HeaderMap, body: String) -> Result<SinkResponse, SinkError> {
    if !(200..300).contains(&status) {
        return Err(SinkError::Http { status, body });
    }
    Ok(SinkResponse {
        status,
        webhook_id: header_value(headers, "x-webhook-id"),
        workflow_id: header_value(headers, "x-workflow-id"),
        body,
    })
}

// ============================================================================
// Multipart Assembly
// ============================================================================

fn file_part(path: &Path, file_name: &str) -> Result<Part, SinkError> {
    let bytes = fs::read(path).map_err(|e| SinkError::Attachment {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime_type_for(path))
        .map_err(|e| SinkError::Request(e.to_string()))
}

/// Builds the report form. `attachments` pairs a form field name with an
/// image path; every listed file must be readable.
pub fn build_report_form(payload: &ReportPayload, attachments: &[(&str, &Path)]) -> Result<Form, SinkError> {
    let json = serde_json::to_string(payload).map_err(|e| SinkError::Request(e.to_string()))?;
    let mut form = Form::new().text("json_payload", json);

    for (field, path) in attachments {
        let file_name = match *field {
            COMPOST_FILE_FIELD => "machine.jpg",
            METER_FILE_FIELD => "meter.jpg",
            other => other,
        };
        form = form.part(field.to_string(), file_part(path, file_name)?);
    }
    Ok(form)
}

// ============================================================================
// Webhook Client
// ============================================================================

/// Destination for assembled payloads.
pub trait PayloadSink {
    fn post_report(
        &self,
        payload: &ReportPayload,
        attachments: &[(&str, &Path)],
    ) -> Result<SinkResponse, SinkError>;

    fn post_alert(&self, payload: &AlertPayload) -> Result<SinkResponse, SinkError>;
}

pub struct WebhookSink {
    client: reqwest::blocking::Client,
    report_url: Option<String>,
    alert_url: Option<String>,
}

impl WebhookSink {
    pub fn from_config(config: &SinkConfig) -> Result<Self, SinkError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SinkError::Request(e.to_string()))?;

        Ok(Self {
            client,
            report_url: config.report_webhook_url.clone(),
            alert_url: config.alert_webhook_url.clone(),
        })
    }
}

fn finish(response: reqwest::blocking::Response) -> Result<SinkResponse, SinkError> {
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.text().map_err(|e| SinkError::Request(e.to_string()))?;
    interpret_response(status, &headers, body)
}

impl PayloadSink for WebhookSink {
    fn post_report(
        &self,
        payload: &ReportPayload,
        attachments: &[(&str, &Path)],
    ) -> Result<SinkResponse, SinkError> {
        let url = self.report_url.as_deref().ok_or(SinkError::NotConfigured("report"))?;
        let form = build_report_form(payload, attachments)?;

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .map_err(|e| SinkError::Request(e.to_string()))?;
        finish(response)
    }

    fn post_alert(&self, payload: &AlertPayload) -> Result<SinkResponse, SinkError> {
        let url = self.alert_url.as_deref().ok_or(SinkError::NotConfigured("alert"))?;

        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .map_err(|e| SinkError::Request(e.to_string()))?;
        finish(response)
    }
}

// ============================================================================
// Tests
// ============================================================================


// ---------------------------------------------------------------------------
// Integration Tests - Live Webhook
// ---------------------------------------------------------------------------
//
// Posts to a locally running workflow instance. Marked #[ignore] so normal
// test runs never depend on an external service.
//
// To run manually:
//   COMPMON_ALERT_WEBHOOK_URL=http://localhost:5678/webhook/compost-monitor \
//   cargo test -- --ignored live_webhook

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::report::SensorBlock;
    use crate::model::SensorRegime;

    #[test]
    #[ignore] // Don't run in CI - depends on a running workflow instance
    fn live_webhook_accepts_alert_payload() {
        let url = std::env::var(crate::config::ENV_ALERT_WEBHOOK_URL)
            .expect("COMPMON_ALERT_WEBHOOK_URL must be set");
        let config = SinkConfig {
            alert_webhook_url: Some(url),
            ..SinkConfig::default()
        };
        let sink = WebhookSink::from_config(&config).expect("client builds");
        let payload = AlertPayload {
            society_id: "SOC_TEST".to_string(),
            sensors: SensorBlock { temperature_c: 78.0, moisture_percent: 50.0, ph_level: 7.0, day_of_cycle: 5 },
            regime: SensorRegime::CriticalHot,
            alert: true,
            message: Some("integration test".to_string()),
        };
        let response = sink.post_alert(&payload).expect("webhook should accept the alert");
        assert!((200..300).contains(&response.status));
    }
}
