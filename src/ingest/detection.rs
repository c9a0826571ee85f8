/// Site-photo object detection adapter.
///
/// The detector model runs out of process: a command is invoked with the
/// image path as its last argument and prints a JSON document on stdout:
///
/// ```text
/// { "status": "success", "image_path": "...", "total_detections": 1,
///   "detections": [ { "class": 0, "class_name": "composter", "confidence": 0.91,
///                     "bbox": { "x1": 12.0, "y1": 40.5, "x2": 610.2, "y2": 355.0 } } ] }
/// ```
///
/// On failure it prints `{ "status": "error", "message": "..." }`.

use serde::Deserialize;
use std::path::Path;
use std::process::Command;

use crate::config::ExtractorConfig;
use crate::model::{Detection, DetectionResult, ExtractionError};

// ============================================================================
// Detector Seam
// ============================================================================

/// Anything that can find composting machines in a photo.
pub trait ObjectDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionResult, ExtractionError>;
}

// ============================================================================
// Output Parsing
// ============================================================================

#[derive(Debug, Deserialize)]
struct DetectorOutput {
    status: String,
    #[serde(default)]
    detections: Vec<Detection>,
    message: Option<String>,
}

/// Parses and validates the detector's stdout.
///
/// Boxes that are not strictly ordered and confidences outside [0, 1] mean
/// the detector output cannot be trusted; the whole result is rejected.
pub fn parse_detector_output(stdout: &str) -> Result<DetectionResult, ExtractionError> {
    let output: DetectorOutput = serde_json::from_str(stdout.trim())
        .map_err(|e| ExtractionError::MalformedOutput(format!("detector output: {}", e)))?;

    if !output.status.eq_ignore_ascii_case("success") {
        return Err(ExtractionError::ExtractorFailure(
            output
                .message
                .unwrap_or_else(|| format!("detector reported status '{}'", output.status)),
        ));
    }

    for (i, d) in output.detections.iter().enumerate() {
        if !(0.0..=1.0).contains(&d.confidence) {
            return Err(ExtractionError::MalformedOutput(format!(
                "detection {} has confidence {} outside [0, 1]",
                i, d.confidence
            )));
        }
        if !d.bbox.is_well_formed() {
            return Err(ExtractionError::MalformedOutput(format!(
                "detection {} has a malformed bounding box {:?}",
                i, d.bbox
            )));
        }
    }

    Ok(DetectionResult::new(output.detections))
}

// ============================================================================
// External Command Detector
// ============================================================================

/// Runs the detector as an external command.
#[derive(Debug, Clone)]
pub struct ScriptDetector {
    program: String,
    args: Vec<String>,
}

impl ScriptDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.detector_program.clone(), config.detector_args.clone())
    }
}

impl ObjectDetector for ScriptDetector {
    fn detect(&self, image_path: &Path) -> Result<DetectionResult, ExtractionError> {
        if !image_path.is_file() {
            return Err(ExtractionError::FileNotFound(image_path.display().to_string()));
        }

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image_path)
            .output()
            .map_err(|e| {
                ExtractionError::ExtractorFailure(format!("could not run {}: {}", self.program, e))
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::ExtractorFailure(format!(
                "detector exited with {} and no output: {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_detector_output(&stdout)
    }
}

// ============================================================================
// Tests
// ============================================================================
