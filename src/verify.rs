//! Submission Verification Engine
//!
//! Turns extracted signals (machine presence, meter fields) into a
//! `VerificationReport`. Everything here is a pure function of its inputs:
//! no I/O, no logging, no clock, and the registered-serial set is only read.
//!
//! Rules are independent and cumulative. Each failing rule appends exactly
//! one reason, in the fixed order serial → threshold → machine, and no rule
//! short-circuits another. Input problems are not rule violations: they
//! produce an `Error` report carrying the problem as its only reason.

use crate::model::{
    ExtractionError, MeterReading, Submission, VerificationPolicy, VerificationReport,
    VerificationStatus,
};
use crate::serials::RegisteredSerials;

// ============================================================================
// Individual Rules
// ============================================================================

/// Serial rule: the meter must be registered.
pub fn serial_reason(meter: &MeterReading, registered: &RegisteredSerials) -> Option<String> {
    if registered.contains(&meter.serial_number) {
        None
    } else {
        Some(format!(
            "Serial Number {} is not in the registered database.",
            meter.serial_number
        ))
    }
}

/// Threshold rule: the reading must be at least `kwh_threshold`.
pub fn threshold_reason(meter: &MeterReading, kwh_threshold: f64) -> Option<String> {
    if meter.reading_kwh < kwh_threshold {
        Some(format!(
            "Recorded reading of {} kWh is below the threshold of {} kWh.",
            meter.reading_kwh, kwh_threshold
        ))
    } else {
        None
    }
}

/// Machine rule: only enforced when the policy asks for it.
pub fn machine_reason(machine_present: bool, policy: &VerificationPolicy) -> Option<String> {
    if policy.require_machine_present && !machine_present {
        Some("No composting machine was detected in the site photo.".to_string())
    } else {
        None
    }
}

/// Runs every rule and collects the reasons of those that failed, in
/// evaluation order.
pub fn evaluate_rules(
    machine_present: bool,
    meter: &MeterReading,
    registered: &RegisteredSerials,
    policy: &VerificationPolicy,
) -> Vec<String> {
    [
        serial_reason(meter, registered),
        threshold_reason(meter, policy.kwh_threshold),
        machine_reason(machine_present, policy),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// ============================================================================
// Report Construction
// ============================================================================

/// Verifies one submission whose meter fields were extracted successfully.
///
/// A reading that violates the input constraints (empty serial, negative or
/// non-finite kWh) is reported as `Error`; no rules run in that case. The
/// same holds for a policy whose kWh threshold is negative or not finite,
/// since no reading could be compared against it.
pub fn verify(
    submission: &Submission,
    machine_present: bool,
    meter: &MeterReading,
    registered: &RegisteredSerials,
    policy: &VerificationPolicy,
) -> VerificationReport {
    if let Err(e) = validate_policy(policy) {
        return error_report(submission, machine_present, &e);
    }
    if let Err(e) = meter.validate() {
        return error_report(submission, machine_present, &e);
    }

    let reasons = evaluate_rules(machine_present, meter, registered, policy);
    let status = if reasons.is_empty() {
        VerificationStatus::Verified
    } else {
        VerificationStatus::Flagged
    };

    VerificationReport {
        report_id: submission.report_id.clone(),
        society_id: submission.society_id.clone(),
        submitted_by: submission.submitted_by.clone(),
        machine_present,
        meter: Some(meter.clone()),
        status,
        reasons,
    }
}

fn validate_policy(policy: &VerificationPolicy) -> Result<(), ExtractionError> {
    if !policy.kwh_threshold.is_finite() || policy.kwh_threshold < 0.0 {
        return Err(ExtractionError::InvalidField {
            field: "kwh_threshold".to_string(),
            reason: format!("{} is not a usable threshold", policy.kwh_threshold),
        });
    }
    Ok(())
}

/// Verifies a submission straight from the extractor's result.
///
/// Extraction failures never default to a reading: the report comes back as
/// `Error` with the failure's description.
pub fn verify_extraction(
    submission: &Submission,
    machine_present: bool,
    extracted: &Result<MeterReading, ExtractionError>,
    registered: &RegisteredSerials,
    policy: &VerificationPolicy,
) -> VerificationReport {
    match extracted {
        Ok(meter) => verify(submission, machine_present, meter, registered, policy),
        Err(e) => error_report(submission, machine_present, e),
    }
}

/// Builds the `Error` report for an input problem.
pub fn error_report(
    submission: &Submission,
    machine_present: bool,
    error: &ExtractionError,
) -> VerificationReport {
    VerificationReport {
        report_id: submission.report_id.clone(),
        society_id: submission.society_id.clone(),
        submitted_by: submission.submitted_by.clone(),
        machine_present,
        meter: None,
        status: VerificationStatus::Error,
        reasons: vec![error.to_string()],
    }
}

// ============================================================================
// Tests
// ============================================================================
