//! End-to-end processing of submissions and telemetry.
//!
//! This is the only layer that combines I/O with the decision core: it calls
//! the extractors, hands their output to the pure engine and classifier,
//! assembles payloads, optionally dispatches them, and logs what happened.
//! Configuration is borrowed for the duration of each call and never mutated.

use std::path::Path;

use crate::alert::classify;
use crate::config::ServiceConfig;
use crate::ingest::detection::ObjectDetector;
use crate::ingest::meter::{extract_meter_reading, MeterExtractor};
use crate::logging::{self, Component};
use crate::model::{SensorReading, SensorVerdict, Submission, VerificationReport};
use crate::report::{build_alert_payload, build_report_payload, AlertPayload, ReportPayload};
use crate::sink::{PayloadSink, SinkError, SinkResponse, COMPOST_FILE_FIELD, METER_FILE_FIELD};
use crate::verify::{error_report, verify_extraction};

// ============================================================================
// Submissions
// ============================================================================

/// The two photos attached to a verification request.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionImages<'a> {
    pub compost_image: &'a Path,
    pub meter_image: &'a Path,
}

#[derive(Debug)]
pub struct SubmissionOutcome {
    pub report: VerificationReport,
    pub payload: ReportPayload,
    /// `None` when no sink was supplied.
    pub delivery: Option<Result<SinkResponse, SinkError>>,
}

/// Runs detection and meter extraction, then the verification engine.
///
/// The site photo is a required input: if the detector cannot process it the
/// report is `Error` and the meter is not examined.
pub fn assess_submission(
    config: &ServiceConfig,
    detector: &dyn ObjectDetector,
    extractor: &dyn MeterExtractor,
    submission: &Submission,
    images: SubmissionImages<'_>,
) -> VerificationReport {
    let subject = submission.report_id.as_str();

    let detections = match detector.detect(images.compost_image) {
        Ok(d) => d,
        Err(e) => {
            logging::log_extraction_failure(Component::Detector, subject, "Machine detection", &e);
            return error_report(submission, false, &e);
        }
    };
    let machine_present = detections.machine_present(config.verification.detection_threshold);
    logging::debug(
        Component::Detector,
        Some(subject),
        &format!(
            "{} detection(s), {} above {:.2}",
            detections.detections.len(),
            detections.count_above(config.verification.detection_threshold),
            config.verification.detection_threshold
        ),
    );

    let extracted = extract_meter_reading(extractor, images.meter_image);
    if let Err(e) = &extracted {
        logging::log_extraction_failure(Component::Meter, subject, "Meter extraction", e);
    }

    let report = verify_extraction(
        submission,
        machine_present,
        &extracted,
        &config.registered_serials,
        &config.verification,
    );
    logging::log_verification_outcome(&report);
    report
}

/// Assesses a submission, assembles its payload and, if a sink is given,
/// posts it with whichever photos are readable.
pub fn process_submission(
    config: &ServiceConfig,
    detector: &dyn ObjectDetector,
    extractor: &dyn MeterExtractor,
    sink: Option<&dyn PayloadSink>,
    submission: &Submission,
    images: SubmissionImages<'_>,
) -> SubmissionOutcome {
    let report = assess_submission(config, detector, extractor, submission, images);
    let payload = build_report_payload(&report);

    let delivery = sink.map(|sink| {
        let attachments: Vec<(&str, &Path)> = [
            (COMPOST_FILE_FIELD, images.compost_image),
            (METER_FILE_FIELD, images.meter_image),
        ]
        .into_iter()
        .filter(|(_, path)| path.is_file())
        .collect();

        let result = sink.post_report(&payload, &attachments);
        match &result {
            Ok(response) => logging::info(
                Component::Sink,
                Some(&submission.report_id),
                &format!("Report delivered (HTTP {})", response.status),
            ),
            Err(e) => logging::log_sink_failure(&submission.report_id, "Report delivery", e),
        }
        result
    });

    SubmissionOutcome { report, payload, delivery }
}

// ============================================================================
// Telemetry
// ============================================================================

#[derive(Debug)]
pub struct ReadingOutcome {
    pub verdict: SensorVerdict,
    pub payload: AlertPayload,
    /// `None` when no sink was supplied or the reading was filtered out by
    /// `sink.alerts_only`.
    pub delivery: Option<Result<SinkResponse, SinkError>>,
}

/// Classifies one reading, assembles its payload and optionally posts it.
pub fn process_reading(
    config: &ServiceConfig,
    sink: Option<&dyn PayloadSink>,
    reading: &SensorReading,
) -> ReadingOutcome {
    let verdict = classify(reading, &config.sensors);
    logging::log_sensor_verdict(reading, &verdict);

    let payload = build_alert_payload(reading, &verdict, &config.sensors);

    let should_send = verdict.alert || !config.sink.alerts_only;
    let delivery = sink.filter(|_| should_send).map(|sink| {
        let result = sink.post_alert(&payload);
        if let Err(e) = &result {
            logging::log_sink_failure(&reading.society_id, "Alert delivery", e);
        }
        result
    });

    ReadingOutcome { verdict, payload, delivery }
}

/// Processes a batch of readings independently and logs a summary.
pub fn process_readings(
    config: &ServiceConfig,
    sink: Option<&dyn PayloadSink>,
    readings: &[SensorReading],
) -> Vec<ReadingOutcome> {
    let outcomes: Vec<ReadingOutcome> = readings
        .iter()
        .map(|r| process_reading(config, sink, r))
        .collect();

    let alerts = outcomes.iter().filter(|o| o.verdict.alert).count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o.delivery, Some(Err(_))))
        .count();
    logging::log_batch_summary(Component::Telemetry, outcomes.len(), alerts, failed);

    outcomes
}
