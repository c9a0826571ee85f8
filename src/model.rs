/// Core data types for the composting compliance monitor.
///
/// This module defines the shared domain model imported by all other modules:
/// extracted signals (detections, meter readings, telemetry), the verdicts the
/// engine produces, and the error type used at the extractor boundary.
/// It contains no I/O.

use serde::{Deserialize, Serialize};

/// Sentinel serial number used when the extractor could not read one.
/// An empty serial is never valid; callers substitute this instead.
pub const UNKNOWN_SERIAL: &str = "UNKNOWN";

// ---------------------------------------------------------------------------
// Detection types
// ---------------------------------------------------------------------------

/// Axis-aligned box in image pixel coordinates. `x1 < x2`, `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// True if the corners are finite and strictly ordered.
    pub fn is_well_formed(&self) -> bool {
        [self.x1, self.y1, self.x2, self.y2].iter().all(|v| v.is_finite())
            && self.x1 < self.x2
            && self.y1 < self.y2
    }
}

/// One object reported by the site-photo detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_id: i64,
    pub class_name: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Everything the detector found in a single photo.
///
/// Produced once by an `ingest::detection::ObjectDetector` and consumed once
/// by the verification step; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    /// Number of detections at or above `threshold` confidence.
    pub fn count_above(&self, threshold: f64) -> usize {
        self.detections
            .iter()
            .filter(|d| d.confidence >= threshold)
            .count()
    }

    /// A machine is present when at least one detection clears the threshold.
    pub fn machine_present(&self, threshold: f64) -> bool {
        self.count_above(threshold) > 0
    }
}

// ---------------------------------------------------------------------------
// Meter types
// ---------------------------------------------------------------------------

/// Fields read off an electricity meter photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub serial_number: String,
    pub reading_kwh: f64,
}

impl MeterReading {
    pub fn new(serial_number: impl Into<String>, reading_kwh: f64) -> Self {
        Self {
            serial_number: serial_number.into(),
            reading_kwh,
        }
    }

    /// Checks the input constraints the engine relies on.
    ///
    /// Returns the problem as an `ExtractionError::InvalidField` so the engine
    /// can surface it as an Error report instead of evaluating rules.
    pub fn validate(&self) -> Result<(), ExtractionError> {
        if self.serial_number.trim().is_empty() {
            return Err(ExtractionError::InvalidField {
                field: "serial_number".to_string(),
                reason: format!("must be non-empty (use \"{}\" when unreadable)", UNKNOWN_SERIAL),
            });
        }
        if !self.reading_kwh.is_finite() {
            return Err(ExtractionError::InvalidField {
                field: "reading_kwh".to_string(),
                reason: format!("{} is not a finite number", self.reading_kwh),
            });
        }
        if self.reading_kwh < 0.0 {
            return Err(ExtractionError::InvalidField {
                field: "reading_kwh".to_string(),
                reason: format!("{} is negative", self.reading_kwh),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Verification types
// ---------------------------------------------------------------------------

/// Who submitted a verification request and for which society.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub report_id: String,
    pub society_id: String,
    pub submitted_by: String,
}

impl Submission {
    pub fn new(
        report_id: impl Into<String>,
        society_id: impl Into<String>,
        submitted_by: impl Into<String>,
    ) -> Self {
        Self {
            report_id: report_id.into(),
            society_id: society_id.into(),
            submitted_by: submitted_by.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    Verified,
    Flagged,
    Error,
}

impl std::fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationStatus::Verified => write!(f, "Verified"),
            VerificationStatus::Flagged => write!(f, "Flagged"),
            VerificationStatus::Error => write!(f, "Error"),
        }
    }
}

/// Outcome of verifying one submission.
///
/// Invariants:
///   - `reasons` is empty iff `status == Verified`
///   - `status == Error` iff an input was missing or unreadable; then
///     `reasons` holds exactly one error description and `meter` may be `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub report_id: String,
    pub society_id: String,
    pub submitted_by: String,
    pub machine_present: bool,
    pub meter: Option<MeterReading>,
    pub status: VerificationStatus,
    pub reasons: Vec<String>,
}

impl VerificationReport {
    pub fn is_flagged(&self) -> bool {
        self.status == VerificationStatus::Flagged
    }
}

// ---------------------------------------------------------------------------
// Telemetry types
// ---------------------------------------------------------------------------

/// One telemetry sample pushed by a compost pile's sensor unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub society_id: String,
    pub temperature_c: f64,
    pub moisture_percent: f64,
    pub ph_level: f64,
    pub day_of_cycle: u32,
}

/// Operating-condition bucket for a telemetry sample.
///
/// Variants are listed in ascending alert priority after `Normal`:
/// a reading matching several critical conditions takes the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorRegime {
    Normal,
    CriticalOther,
    CriticalDry,
    CriticalHot,
}

impl std::fmt::Display for SensorRegime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorRegime::Normal => write!(f, "NORMAL"),
            SensorRegime::CriticalOther => write!(f, "CRITICAL_OTHER"),
            SensorRegime::CriticalDry => write!(f, "CRITICAL_DRY"),
            SensorRegime::CriticalHot => write!(f, "CRITICAL_HOT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorVerdict {
    pub regime: SensorRegime,
    pub alert: bool,
}

// ---------------------------------------------------------------------------
// Threshold types
// ---------------------------------------------------------------------------

/// Inclusive numeric range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Cutoffs used by the sensor classifier.
///
/// The `ideal_*` bands describe a healthy thermophilic pile and are
/// informational only; the critical cutoffs decide the regime:
///   - temperature above `hot_above_c`          → Critical-Hot
///   - moisture below `dry_below_percent`       → Critical-Dry
///   - moisture above `wet_above_percent`, or
///     pH outside `tolerable_ph`                → Critical-Other
///
/// Expected ordering: `dry_below_percent < ideal_moisture.min`,
/// `ideal_moisture.max < wet_above_percent`, `ideal_temperature_c.max < hot_above_c`,
/// and `tolerable_ph` enclosing `ideal_ph`. `config::ServiceConfig::validate`
/// enforces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorThresholds {
    pub ideal_temperature_c: Band,
    pub ideal_moisture_percent: Band,
    pub ideal_ph: Band,
    pub hot_above_c: f64,
    pub dry_below_percent: f64,
    pub wet_above_percent: f64,
    pub tolerable_ph: Band,
}

impl Default for SensorThresholds {
    fn default() -> Self {
        Self {
            ideal_temperature_c: Band::new(55.0, 65.0),
            ideal_moisture_percent: Band::new(45.0, 55.0),
            ideal_ph: Band::new(6.5, 7.5),
            hot_above_c: 70.0,
            dry_below_percent: 20.0,
            wet_above_percent: 75.0,
            tolerable_ph: Band::new(5.5, 8.5),
        }
    }
}

/// Rule settings for the verification engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationPolicy {
    /// Minimum detector confidence for a detection to count as a machine.
    pub detection_threshold: f64,
    /// Minimum meter reading, in kWh, to avoid flagging.
    pub kwh_threshold: f64,
    /// When set, a submission with no detected machine is flagged.
    /// Off by default: machine presence is recorded but informational.
    pub require_machine_present: bool,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            detection_threshold: 0.5,
            kwh_threshold: 25.0,
            require_machine_present: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while turning raw media into extracted signals.
///
/// Every variant maps to an `Error` verification status; none of them are
/// rule violations.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The image path does not resolve to a file.
    FileNotFound(String),
    /// The file exists but could not be read.
    UnreadableImage { path: String, reason: String },
    /// The detector/OCR service errored, timed out, or returned non-2xx.
    ExtractorFailure(String),
    /// The extractor answered but its output could not be interpreted.
    MalformedOutput(String),
    /// A field was present but violates its constraints.
    InvalidField { field: String, reason: String },
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::FileNotFound(path) => {
                write!(f, "File not found at specified path: {}", path)
            }
            ExtractionError::UnreadableImage { path, reason } => {
                write!(f, "Could not read image {}: {}", path, reason)
            }
            ExtractionError::ExtractorFailure(msg) => write!(f, "Extractor failure: {}", msg),
            ExtractionError::MalformedOutput(msg) => {
                write!(f, "Malformed extractor output: {}", msg)
            }
            ExtractionError::InvalidField { field, reason } => {
                write!(f, "Invalid {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
