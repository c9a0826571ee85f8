/// Structured logging for the compliance monitor
///
/// Provides context-rich logging with component tags, report/society
/// identifiers, timestamps, and severity levels. Supports both console
/// output and file-based logging for long-running telemetry processing.
///
/// The decision core (`verify`, `alert`, `report`) never logs; only the
/// pipeline and I/O adapters do.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::{
    ExtractionError, SensorReading, SensorVerdict, VerificationReport, VerificationStatus,
};
use crate::sink::SinkError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Detector,
    Meter,
    Telemetry,
    Sink,
    Config,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Detector => write!(f, "DETECT"),
            Component::Meter => write!(f, "METER"),
            Component::Telemetry => write!(f, "TELEM"),
            Component::Sink => write!(f, "SINK"),
            Component::Config => write!(f, "CFG"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - bad upload, unreadable photo, operator error
    Expected,
    /// Unexpected failure - extractor or webhook degraded, misconfiguration
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, component: &Component, subject: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, component, subject_part, message)
    }

    fn log(&self, level: LogLevel, component: &Component, subject: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, component, subject, message);
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, subject_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, subject_part, message),
                LogLevel::Info => println!("   {}{}: {}", component, subject_part, message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn emit(level: LogLevel, component: Component, subject: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, &component, subject, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, subject: Option<&str>, message: &str) {
    emit(LogLevel::Info, component, subject, message);
}

/// Log a warning message
pub fn warn(component: Component, subject: Option<&str>, message: &str) {
    emit(LogLevel::Warning, component, subject, message);
}

/// Log an error message
pub fn error(component: Component, subject: Option<&str>, message: &str) {
    emit(LogLevel::Error, component, subject, message);
}

/// Log a debug message
pub fn debug(component: Component, subject: Option<&str>, message: &str) {
    emit(LogLevel::Debug, component, subject, message);
}

fn emit_classified(failure_type: &FailureType, component: Component, subject: &str, message: &str) {
    match failure_type {
        FailureType::Expected => warn(component, Some(subject), message),
        FailureType::Unexpected => error(component, Some(subject), message),
        FailureType::Unknown => warn(component, Some(subject), message),
    }
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify an extraction failure.
///
/// Missing or unreadable uploads are the submitter's problem; a failing or
/// garbled extractor points at the service side.
pub fn classify_extraction_failure(err: &ExtractionError) -> FailureType {
    match err {
        ExtractionError::FileNotFound(_) | ExtractionError::UnreadableImage { .. } => {
            FailureType::Expected
        }
        ExtractionError::ExtractorFailure(_) => FailureType::Unexpected,
        // A model may legitimately fail to read a blurry meter
        ExtractionError::MalformedOutput(_) | ExtractionError::InvalidField { .. } => {
            FailureType::Unknown
        }
    }
}

/// Classify a webhook delivery failure
pub fn classify_sink_failure(err: &SinkError) -> FailureType {
    match err {
        // Nothing to deliver to; dispatch was simply not set up
        SinkError::NotConfigured(_) => FailureType::Expected,
        // Rejected payload usually means a workflow/config mismatch
        SinkError::Http { status, .. } if (400..500).contains(status) => FailureType::Unexpected,
        SinkError::Attachment { .. } => FailureType::Unexpected,
        SinkError::Http { .. } | SinkError::Request(_) => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log an extraction failure with automatic classification
pub fn log_extraction_failure(component: Component, subject: &str, operation: &str, err: &ExtractionError) {
    let failure_type = classify_extraction_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);
    emit_classified(&failure_type, component, subject, &message);
}

/// Log a webhook failure with classification
pub fn log_sink_failure(subject: &str, operation: &str, err: &SinkError) {
    let failure_type = classify_sink_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);
    emit_classified(&failure_type, Component::Sink, subject, &message);
}

// ---------------------------------------------------------------------------
// Outcome Logging
// ---------------------------------------------------------------------------

pub fn log_verification_outcome(report: &VerificationReport) {
    let subject = Some(report.report_id.as_str());
    match report.status {
        VerificationStatus::Verified => info(
            Component::Meter,
            subject,
            &format!("{} verified (machine present: {})", report.society_id, report.machine_present),
        ),
        VerificationStatus::Flagged => warn(
            Component::Meter,
            subject,
            &format!("{} flagged: {}", report.society_id, report.reasons.join(" | ")),
        ),
        VerificationStatus::Error => error(
            Component::Meter,
            subject,
            &format!("{} could not be verified: {}", report.society_id, report.reasons.join(" | ")),
        ),
    }
}

pub fn log_sensor_verdict(reading: &SensorReading, verdict: &SensorVerdict) {
    let message = format!(
        "day {} {}: {:.1} °C, {:.1}% moisture, pH {:.1}",
        reading.day_of_cycle,
        verdict.regime,
        reading.temperature_c,
        reading.moisture_percent,
        reading.ph_level
    );
    if verdict.alert {
        warn(Component::Telemetry, Some(&reading.society_id), &message);
    } else {
        debug(Component::Telemetry, Some(&reading.society_id), &message);
    }
}

/// Log a summary of a batch of telemetry readings
pub fn log_batch_summary(component: Component, total: usize, alerts: usize, failed_deliveries: usize) {
    let message = format!(
        "Batch complete: {} readings, {} alerts, {} delivery failures",
        total, alerts, failed_deliveries
    );

    if failed_deliveries == 0 {
        info(component, None, &message);
    } else if failed_deliveries == total {
        error(component, None, &message);
    } else {
        warn(component, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_extraction_failure_classification() {
        let missing = ExtractionError::FileNotFound("meter.jpg".to_string());
        assert_eq!(classify_extraction_failure(&missing), FailureType::Expected);

        let down = ExtractionError::ExtractorFailure("HTTP 503".to_string());
        assert_eq!(classify_extraction_failure(&down), FailureType::Unexpected);

        let garbled = ExtractionError::MalformedOutput("not json".to_string());
        assert_eq!(classify_extraction_failure(&garbled), FailureType::Unknown);
    }

    #[test]
    fn test_sink_failure_classification() {
        let rejected = SinkError::Http { status: 404, body: "no such webhook".to_string() };
        assert_eq!(classify_sink_failure(&rejected), FailureType::Unexpected);

        let degraded = SinkError::Http { status: 502, body: String::new() };
        assert_eq!(classify_sink_failure(&degraded), FailureType::Unknown);

        assert_eq!(classify_sink_failure(&SinkError::NotConfigured("alert")), FailureType::Expected);
        assert_eq!(
            classify_sink_failure(&SinkError::Request("operation timed out".to_string())),
            FailureType::Unknown
        );
    }

    #[test]
    fn test_sink_body_text_does_not_change_classification() {
        // A 5xx whose body happens to mention a 4xx code stays a server-side failure
        let err = SinkError::Http { status: 503, body: "upstream said HTTP 404".to_string() };
        assert_eq!(classify_sink_failure(&err), FailureType::Unknown);
    }

    #[test]
    fn test_component_tags() {
        let tags: Vec<String> = [
            Component::Detector,
            Component::Meter,
            Component::Telemetry,
            Component::Sink,
            Component::Config,
            Component::System,
        ]
        .iter()
        .map(|c| c.to_string())
        .collect();
        assert_eq!(tags, vec!["DETECT", "METER", "TELEM", "SINK", "CFG", "SYS"]);
    }

    #[test]
    fn test_entry_format_includes_component_and_subject() {
        let entry = Logger::format_entry(LogLevel::Warning, &Component::Telemetry, Some("SOC-1"), "hot");
        assert!(entry.contains("WARN TELEM [SOC-1]: hot"), "got '{}'", entry);
    }
}
