/// Service configuration.
///
/// Built once at process start from `compmon.toml` (path overridable via
/// `COMPMON_CONFIG`) plus environment overrides, then passed by reference to
/// every component. Sections missing from the file fall back to defaults, so
/// an empty file is a valid configuration.
///
/// Secrets and endpoints are never hard-coded: the webhook URLs and the
/// extractor API key come from the file or the environment (`.env` is loaded
/// with `dotenv`).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::logging::LogLevel;
use crate::model::{Band, SensorThresholds, VerificationPolicy};
use crate::serials::RegisteredSerials;

pub const DEFAULT_CONFIG_PATH: &str = "./compmon.toml";

pub const ENV_CONFIG_PATH: &str = "COMPMON_CONFIG";
pub const ENV_REPORT_WEBHOOK_URL: &str = "COMPMON_REPORT_WEBHOOK_URL";
pub const ENV_ALERT_WEBHOOK_URL: &str = "COMPMON_ALERT_WEBHOOK_URL";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub registered_serials: RegisteredSerials,
    pub verification: VerificationPolicy,
    pub sensors: SensorThresholds,
    pub extractor: ExtractorConfig,
    pub sink: SinkConfig,
    pub logging: LoggingConfig,
}

/// Settings for the detector and meter extractor adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Program that runs the object detector, invoked as
    /// `<program> <args...> <image_path>` and expected to print JSON.
    pub detector_program: String,
    pub detector_args: Vec<String>,
    pub gemini_endpoint: String,
    pub gemini_model: String,
    /// Usually supplied through `GEMINI_API_KEY` rather than the file.
    pub gemini_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            detector_program: "python3".to_string(),
            detector_args: vec!["python_script/predict.py".to_string()],
            gemini_endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            gemini_model: "gemini-2.5-flash".to_string(),
            gemini_api_key: None,
            timeout_secs: 60,
        }
    }
}

/// Workflow webhook endpoints. `None` disables dispatch of that payload kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub report_webhook_url: Option<String>,
    pub alert_webhook_url: Option<String>,
    pub timeout_secs: u64,
    /// Only post alert payloads whose verdict raised an alert.
    pub alerts_only: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            report_webhook_url: None,
            alert_webhook_url: None,
            timeout_secs: 60,
            alerts_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

impl LoggingConfig {
    pub fn min_level(&self) -> LogLevel {
        match self.level.to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warning,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// The file exists but could not be read.
    Io { path: String, reason: String },
    /// The file is not valid TOML or does not match the schema.
    Parse(String),
    /// Values parsed but violate a constraint.
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io { path, reason } => write!(f, "Cannot read config {}: {}", path, reason),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl ServiceConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads and validates a config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let text = fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            Self::from_toml_str(&text)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Loads `.env`, resolves the config path, reads the file and applies
    /// environment overrides.
    pub fn load_from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let path = std::env::var(ENV_CONFIG_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

        let mut config = Self::load(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides from a key lookup. Blank values are ignored.
    ///
    /// Takes the lookup as a closure so tests need not touch the process
    /// environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_blank(ENV_REPORT_WEBHOOK_URL) {
            self.sink.report_webhook_url = Some(url);
        }
        if let Some(url) = non_blank(ENV_ALERT_WEBHOOK_URL) {
            self.sink.alert_webhook_url = Some(url);
        }
        if let Some(key) = non_blank(ENV_GEMINI_API_KEY) {
            self.extractor.gemini_api_key = Some(key);
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Result<(), ConfigError> {
        let v = &self.verification;
        if !(0.0..=1.0).contains(&v.detection_threshold) {
            return Err(ConfigError::Invalid(format!(
                "verification.detection_threshold must be within [0, 1], got {}",
                v.detection_threshold
            )));
        }
        if !v.kwh_threshold.is_finite() || v.kwh_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "verification.kwh_threshold must be a finite non-negative number, got {}",
                v.kwh_threshold
            )));
        }
        if self.registered_serials.is_empty() {
            return Err(ConfigError::Invalid(
                "registered_serials must list at least one serial".to_string(),
            ));
        }
        validate_sensor_thresholds(&self.sensors)?;
        if self.extractor.timeout_secs == 0 || self.sink.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least one second".to_string()));
        }
        Ok(())
    }
}

fn validate_band(name: &str, band: &Band) -> Result<(), ConfigError> {
    if !band.min.is_finite() || !band.max.is_finite() || band.min > band.max {
        return Err(ConfigError::Invalid(format!(
            "sensors.{} must satisfy min <= max, got [{}, {}]",
            name, band.min, band.max
        )));
    }
    Ok(())
}

/// Checks each band and the ordering between ideal bands and critical cutoffs.
pub fn validate_sensor_thresholds(t: &SensorThresholds) -> Result<(), ConfigError> {
    validate_band("ideal_temperature_c", &t.ideal_temperature_c)?;
    validate_band("ideal_moisture_percent", &t.ideal_moisture_percent)?;
    validate_band("ideal_ph", &t.ideal_ph)?;
    validate_band("tolerable_ph", &t.tolerable_ph)?;

    if !(t.hot_above_c > t.ideal_temperature_c.max) {
        return Err(ConfigError::Invalid(format!(
            "sensors.hot_above_c ({}) must be above the ideal temperature band max ({})",
            t.hot_above_c, t.ideal_temperature_c.max
        )));
    }
    if !(t.dry_below_percent < t.ideal_moisture_percent.min) {
        return Err(ConfigError::Invalid(format!(
            "sensors.dry_below_percent ({}) must be below the ideal moisture band min ({})",
            t.dry_below_percent, t.ideal_moisture_percent.min
        )));
    }
    if !(t.wet_above_percent > t.ideal_moisture_percent.max) {
        return Err(ConfigError::Invalid(format!(
            "sensors.wet_above_percent ({}) must be above the ideal moisture band max ({})",
            t.wet_above_percent, t.ideal_moisture_percent.max
        )));
    }
    if t.tolerable_ph.min > t.ideal_ph.min || t.tolerable_ph.max < t.ideal_ph.max {
        return Err(ConfigError::Invalid(
            "sensors.tolerable_ph must enclose sensors.ideal_ph".to_string(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = ServiceConfig::from_toml_str("").expect("empty toml is valid");
        assert_eq!(config, ServiceConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(ServiceConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let text = r#"
            registered_serials = ["SN-1", "SN-2"]

            [verification]
            kwh_threshold = 40.0
            require_machine_present = true

            [sensors]
            hot_above_c = 72.5
        "#;
        let config = ServiceConfig::from_toml_str(text).expect("should parse");
        assert_eq!(config.verification.kwh_threshold, 40.0);
        assert!(config.verification.require_machine_present);
        assert_eq!(config.verification.detection_threshold, 0.5, "unset keys keep defaults");
        assert_eq!(config.sensors.hot_above_c, 72.5);
        assert_eq!(config.sensors.dry_below_percent, 20.0);
        assert!(config.registered_serials.contains("SN-2"));
        assert!(!config.registered_serials.contains("SN-12345"));
    }

    #[test]
    fn test_band_tables_parse() {
        let text = r#"
            [sensors]
            ideal_ph = { min = 6.0, max = 7.0 }
        "#;
        let config = ServiceConfig::from_toml_str(text).expect("should parse");
        assert_eq!(config.sensors.ideal_ph, Band::new(6.0, 7.0));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let result = ServiceConfig::from_toml_str("[verification\nkwh_threshold = ");
        assert!(matches!(result, Err(ConfigError::Parse(_))), "got {:?}", result);
    }

    #[test]
    fn test_wrong_type_is_parse_error() {
        let result = ServiceConfig::from_toml_str("[verification]\nkwh_threshold = \"lots\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ServiceConfig::load(Path::new("/nonexistent/compmon.toml"))
            .expect("missing file should not be an error");
        assert_eq!(config, ServiceConfig::default());
    }

    // --- Validation ---------------------------------------------------------

    #[test]
    fn test_detection_threshold_out_of_range_is_invalid() {
        let mut config = ServiceConfig::default();
        config.verification.detection_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_negative_kwh_threshold_is_invalid() {
        let mut config = ServiceConfig::default();
        config.verification.kwh_threshold = -1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_serial_list_is_invalid() {
        let config = ServiceConfig::from_toml_str("registered_serials = []").expect("parses");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cutoffs_must_sit_outside_ideal_bands() {
        let mut hot = SensorThresholds::default();
        hot.hot_above_c = 60.0;
        assert!(validate_sensor_thresholds(&hot).is_err(), "hot cutoff inside ideal band");

        let mut dry = SensorThresholds::default();
        dry.dry_below_percent = 50.0;
        assert!(validate_sensor_thresholds(&dry).is_err(), "dry cutoff inside ideal band");

        let mut wet = SensorThresholds::default();
        wet.wet_above_percent = 50.0;
        assert!(validate_sensor_thresholds(&wet).is_err());

        let mut ph = SensorThresholds::default();
        ph.tolerable_ph = Band::new(7.0, 8.0);
        assert!(validate_sensor_thresholds(&ph).is_err());

        let mut inverted = SensorThresholds::default();
        inverted.ideal_ph = Band::new(7.5, 6.5);
        assert!(validate_sensor_thresholds(&inverted).is_err());
    }

    // --- Overrides ----------------------------------------------------------

    #[test]
    fn test_overrides_replace_endpoints_and_key() {
        let env: HashMap<&str, &str> = [
            (ENV_REPORT_WEBHOOK_URL, "http://localhost:5678/webhook/report"),
            (ENV_ALERT_WEBHOOK_URL, "http://localhost:5678/webhook/compost-monitor"),
            (ENV_GEMINI_API_KEY, "test-key"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.sink.report_webhook_url.as_deref(),
            Some("http://localhost:5678/webhook/report")
        );
        assert_eq!(
            config.sink.alert_webhook_url.as_deref(),
            Some("http://localhost:5678/webhook/compost-monitor")
        );
        assert_eq!(config.extractor.gemini_api_key.as_deref(), Some("test-key"));
    }

    #[test]
    fn test_blank_override_is_ignored() {
        let mut config = ServiceConfig::default();
        config.sink.alert_webhook_url = Some("http://from-file".to_string());
        config.apply_overrides(|k| (k == ENV_ALERT_WEBHOOK_URL).then(|| "  ".to_string()));
        assert_eq!(config.sink.alert_webhook_url.as_deref(), Some("http://from-file"));
    }

    #[test]
    fn test_log_level_names() {
        let mut logging = LoggingConfig::default();
        assert_eq!(logging.min_level(), LogLevel::Info);
        logging.level = "WARN".to_string();
        assert_eq!(logging.min_level(), LogLevel::Warning);
        logging.level = "debug".to_string();
        assert_eq!(logging.min_level(), LogLevel::Debug);
    }
}
