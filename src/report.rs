//! Outbound payload assembly.
//!
//! Maps engine outputs onto the JSON shapes the workflow webhook consumes.
//! Every key is always emitted, including `null`s and empty lists, so the
//! downstream automation never has to guess whether a field was dropped.
//! Nothing here performs I/O; delivery lives in `sink`.

use serde::Serialize;

use crate::alert::regimes::alert_message;
use crate::model::{
    SensorReading, SensorRegime, SensorThresholds, SensorVerdict, VerificationReport,
    VerificationStatus,
};

// ============================================================================
// Verification Report Payload
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportPayload {
    #[serde(rename = "reportId")]
    pub report_id: String,
    #[serde(rename = "societyId")]
    pub society_id: String,
    /// `"True"` / `"False"`: the webhook expects the string form.
    pub machine_exists: String,
    #[serde(rename = "submittedBy")]
    pub submitted_by: String,
    pub status: VerificationStatus,
    pub meter_details: Option<MeterDetails>,
    pub flagged_details: FlaggedDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeterDetails {
    pub serial_number: String,
    pub reading_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedDetails {
    pub is_flagged: bool,
    pub reasons: Vec<String>,
}

fn bool_label(value: bool) -> String {
    let label = if value { "True" } else { "False" };
    label.to_string()
}

/// Builds the webhook payload for a verification report.
///
/// `reasons` keeps the engine's rule-evaluation order. On an `Error` report
/// the list holds the error description and `is_flagged` is false.
pub fn build_report_payload(report: &VerificationReport) -> ReportPayload {
    ReportPayload {
        report_id: report.report_id.clone(),
        society_id: report.society_id.clone(),
        machine_exists: bool_label(report.machine_present),
        submitted_by: report.submitted_by.clone(),
        status: report.status,
        meter_details: report.meter.as_ref().map(|m| MeterDetails {
            serial_number: m.serial_number.clone(),
            reading_kwh: m.reading_kwh,
        }),
        flagged_details: FlaggedDetails {
            is_flagged: report.is_flagged(),
            reasons: report.reasons.clone(),
        },
    }
}

// ============================================================================
// Sensor Alert Payload
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertPayload {
    pub society_id: String,
    pub sensors: SensorBlock,
    pub regime: SensorRegime,
    pub alert: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorBlock {
    pub temperature_c: f64,
    pub moisture_percent: f64,
    pub ph_level: f64,
    pub day_of_cycle: u32,
}

/// Builds the webhook payload for one classified telemetry sample.
pub fn build_alert_payload(
    reading: &SensorReading,
    verdict: &SensorVerdict,
    thresholds: &SensorThresholds,
) -> AlertPayload {
    AlertPayload {
        society_id: reading.society_id.clone(),
        sensors: SensorBlock {
            temperature_c: reading.temperature_c,
            moisture_percent: reading.moisture_percent,
            ph_level: reading.ph_level,
            day_of_cycle: reading.day_of_cycle,
        },
        regime: verdict.regime,
        alert: verdict.alert,
        message: alert_message(reading, verdict, thresholds),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::classify;
    use crate::model::{ExtractionError, MeterReading, Submission, VerificationPolicy};
    use crate::serials::RegisteredSerials;
    use crate::verify::{verify, verify_extraction};
    use serde_json::json;

    fn submission() -> Submission {
        Submission::new("RPT-DUAL-001", "SOC-MUM-04", "Secretary_01")
    }

    #[test]
    fn test_verified_payload_keeps_all_keys() {
        let report = verify(
            &submission(),
            true,
            &MeterReading::new("SN-12345", 30.0),
            &RegisteredSerials::default(),
            &VerificationPolicy::default(),
        );
        let value = serde_json::to_value(build_report_payload(&report)).expect("serializes");
        assert_eq!(
            value,
            json!({
                "reportId": "RPT-DUAL-001",
                "societyId": "SOC-MUM-04",
                "machine_exists": "True",
                "submittedBy": "Secretary_01",
                "status": "Verified",
                "meter_details": { "serial_number": "SN-12345", "reading_kwh": 30.0 },
                "flagged_details": { "is_flagged": false, "reasons": [] }
            })
        );
    }

    #[test]
    fn test_flagged_payload_preserves_reason_order() {
        let report = verify(
            &submission(),
            false,
            &MeterReading::new("SN-00000", 10.0),
            &RegisteredSerials::default(),
            &VerificationPolicy::default(),
        );
        let payload = build_report_payload(&report);
        assert_eq!(payload.machine_exists, "False");
        assert!(payload.flagged_details.is_flagged);
        assert_eq!(payload.flagged_details.reasons.len(), 2);
        assert!(payload.flagged_details.reasons[0].starts_with("Serial Number"));
        assert!(payload.flagged_details.reasons[1].starts_with("Recorded reading"));
    }

    #[test]
    fn test_error_payload_emits_null_meter_details() {
        let report = verify_extraction(
            &submission(),
            true,
            &Err(ExtractionError::ExtractorFailure("timeout".to_string())),
            &RegisteredSerials::default(),
            &VerificationPolicy::default(),
        );
        let value = serde_json::to_value(build_report_payload(&report)).expect("serializes");
        assert_eq!(value["status"], "Error");
        assert!(value.get("meter_details").is_some(), "key must not be omitted");
        assert!(value["meter_details"].is_null());
        assert_eq!(value["flagged_details"]["is_flagged"], false);
        assert_eq!(value["flagged_details"]["reasons"].as_array().map(|a| a.len()), Some(1));
    }

    #[test]
    fn test_alert_payload_shape() {
        let reading = SensorReading {
            society_id: "SOC_HACKATHON_01".to_string(),
            temperature_c: 27.0,
            moisture_percent: 12.0,
            ph_level: 7.0,
            day_of_cycle: 5,
        };
        let thresholds = SensorThresholds::default();
        let verdict = classify(&reading, &thresholds);
        let value = serde_json::to_value(build_alert_payload(&reading, &verdict, &thresholds))
            .expect("serializes");
        assert_eq!(value["society_id"], "SOC_HACKATHON_01");
        assert_eq!(
            value["sensors"],
            json!({
                "temperature_c": 27.0,
                "moisture_percent": 12.0,
                "ph_level": 7.0,
                "day_of_cycle": 5
            })
        );
        assert_eq!(value["regime"], "CRITICAL_DRY");
        assert_eq!(value["alert"], true);
        assert!(value["message"].is_string());
    }

    #[test]
    fn test_normal_alert_payload_keeps_null_message() {
        let reading = SensorReading {
            society_id: "SOC_HACKATHON_01".to_string(),
            temperature_c: 60.0,
            moisture_percent: 50.0,
            ph_level: 7.0,
            day_of_cycle: 6,
        };
        let thresholds = SensorThresholds::default();
        let verdict = classify(&reading, &thresholds);
        let value = serde_json::to_value(build_alert_payload(&reading, &verdict, &thresholds))
            .expect("serializes");
        assert_eq!(value["regime"], "NORMAL");
        assert_eq!(value["alert"], false);
        assert!(value.get("message").is_some_and(|m| m.is_null()));
    }
}
