/// Meter photo extraction via a vision-language model.
///
/// Sends the meter image to the Gemini `generateContent` REST endpoint and
/// asks for a JSON object with `serial_number` and `reading_kwh`.
///
/// API Documentation: https://ai.google.dev/api/generate-content

use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::config::ExtractorConfig;
use crate::model::{ExtractionError, MeterReading, UNKNOWN_SERIAL};

pub const METER_PROMPT: &str = "Identify the following from the electricity meter image:\n\
1. Serial Number: The unique identification number of the meter.\n\
2. Meter Reading: The current numerical value in kWh.\n\
Return ONLY a JSON object with keys: \"serial_number\" (string) and \"reading_kwh\" (number).";

// ============================================================================
// Images
// ============================================================================

/// A meter photo loaded into memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterImage {
    pub path: String,
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

/// PNG by extension, JPEG otherwise.
pub fn mime_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}

pub fn load_image(path: &Path) -> Result<MeterImage, ExtractionError> {
    if !path.is_file() {
        return Err(ExtractionError::FileNotFound(path.display().to_string()));
    }
    let bytes = fs::read(path).map_err(|e| ExtractionError::UnreadableImage {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(ExtractionError::UnreadableImage {
            path: path.display().to_string(),
            reason: "file is empty".to_string(),
        });
    }
    Ok(MeterImage {
        path: path.display().to_string(),
        bytes,
        mime_type: mime_type_for(path),
    })
}

// ============================================================================
// Extractor Seam
// ============================================================================

/// Anything that can read a serial number and kWh value off a meter photo.
pub trait MeterExtractor {
    fn extract(&self, image: &MeterImage) -> Result<MeterReading, ExtractionError>;
}

/// Stands in for an extractor that could not be set up, e.g. a missing API
/// key. Every extraction fails with the setup error, so submissions still
/// produce an `Error` report instead of aborting.
#[derive(Debug, Clone)]
pub struct UnavailableExtractor {
    error: ExtractionError,
}

impl UnavailableExtractor {
    pub fn new(error: ExtractionError) -> Self {
        Self { error }
    }
}

impl MeterExtractor for UnavailableExtractor {
    fn extract(&self, _image: &MeterImage) -> Result<MeterReading, ExtractionError> {
        Err(self.error.clone())
    }
}

/// Loads the image at `path` and runs it through `extractor`.
pub fn extract_meter_reading(
    extractor: &dyn MeterExtractor,
    path: &Path,
) -> Result<MeterReading, ExtractionError> {
    let image = load_image(path)?;
    extractor.extract(&image)
}

// ============================================================================
// Field Parsing
// ============================================================================

/// Maps the model's JSON object onto a `MeterReading`.
///
/// - `serial_number` missing, null or blank → `"UNKNOWN"` (the serial rule
///   will then flag it); numeric serials are accepted as text, with
///   integer-valued floats written without a fraction
/// - `reading_kwh` missing or non-numeric → `MalformedOutput`; a reading is
///   never defaulted
/// - numeric strings such as `"30.5"` are accepted for `reading_kwh`
/// - negative or non-finite readings → `InvalidField`
pub fn parse_meter_fields(value: &Value) -> Result<MeterReading, ExtractionError> {
    let obj = value.as_object().ok_or_else(|| {
        ExtractionError::MalformedOutput("expected a JSON object with meter fields".to_string())
    })?;

    let serial_number = match obj.get("serial_number") {
        None | Some(Value::Null) => UNKNOWN_SERIAL.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => UNKNOWN_SERIAL.to_string(),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => serial_from_number(n),
        Some(other) => {
            return Err(ExtractionError::MalformedOutput(format!(
                "serial_number has unexpected type: {}",
                other
            )));
        }
    };

    let reading_kwh = match obj.get("reading_kwh") {
        Some(Value::Number(n)) => n.as_f64().ok_or_else(|| {
            ExtractionError::MalformedOutput(format!("reading_kwh {} is not representable", n))
        })?,
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| {
            ExtractionError::MalformedOutput(format!("reading_kwh '{}' is not a number", s))
        })?,
        None | Some(Value::Null) => {
            return Err(ExtractionError::MalformedOutput(
                "reading_kwh missing from extractor output".to_string(),
            ));
        }
        Some(other) => {
            return Err(ExtractionError::MalformedOutput(format!(
                "reading_kwh has unexpected type: {}",
                other
            )));
        }
    };

    let reading = MeterReading::new(serial_number, reading_kwh);
    reading.validate()?;
    Ok(reading)
}

/// Integer-valued floats read as the integer (`12345.0` → `"12345"`); any
/// other number keeps its JSON text and is left to the serial rule.
fn serial_from_number(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 => format!("{}", f),
        _ => n.to_string(),
    }
}

/// Parses model text into a `MeterReading`, tolerating a Markdown code fence
/// around the JSON.
pub fn parse_meter_json(text: &str) -> Result<MeterReading, ExtractionError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    let value: Value = serde_json::from_str(body.trim())
        .map_err(|e| ExtractionError::MalformedOutput(format!("meter output is not JSON: {}", e)))?;
    parse_meter_fields(&value)
}

// ============================================================================
// Gemini Client
// ============================================================================

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// First text part of the first candidate.
fn response_text(response: GenerateContentResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .filter_map(|c| c.content)
        .flat_map(|c| c.parts)
        .find_map(|p| p.text)
}

pub struct GeminiMeterExtractor {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiMeterExtractor {
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, ExtractionError> {
        let api_key = config.gemini_api_key.clone().ok_or_else(|| {
            ExtractionError::ExtractorFailure("GEMINI_API_KEY is not configured".to_string())
        })?;
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExtractionError::ExtractorFailure(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.gemini_endpoint.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            api_key,
        })
    }

    pub fn request_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// Request body: inline image part followed by the prompt, JSON response.
pub fn build_request_body(image: &MeterImage) -> Value {
    json!({
        "contents": [{
            "parts": [
                {
                    "inline_data": {
                        "mime_type": image.mime_type,
                        "data": general_purpose::STANDARD.encode(&image.bytes),
                    }
                },
                { "text": METER_PROMPT }
            ]
        }],
        "generationConfig": { "response_mime_type": "application/json" }
    })
}

impl MeterExtractor for GeminiMeterExtractor {
    fn extract(&self, image: &MeterImage) -> Result<MeterReading, ExtractionError> {
        let response = self
            .client
            .post(self.request_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&build_request_body(image))
            .send()
            .map_err(|e| ExtractionError::ExtractorFailure(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ExtractionError::ExtractorFailure(format!(
                "vision API returned HTTP {}",
                response.status().as_u16()
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .map_err(|e| ExtractionError::MalformedOutput(format!("vision API response: {}", e)))?;

        let text = response_text(body).ok_or_else(|| {
            ExtractionError::MalformedOutput("vision API returned no text candidate".to_string())
        })?;

        parse_meter_json(&text)
    }
}

// ============================================================================
// Tests
// ============================================================================
