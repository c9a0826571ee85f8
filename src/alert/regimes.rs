//! Compost pile regime classification.
//!
//! Each telemetry sample is judged on its own: no smoothing, no hysteresis,
//! no memory of earlier samples. Callers that need debouncing layer it on
//! top of `classify`.
//!
//! Priority when several critical conditions hold at once:
//!   Critical-Hot > Critical-Dry > Critical-Other
//! Heat is checked first because it signals thermal runaway and fire risk.

use crate::model::{SensorReading, SensorRegime, SensorThresholds, SensorVerdict};

/// Sensor channels carried by a `SensorReading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorChannel {
    Temperature,
    Moisture,
    Ph,
}

impl std::fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorChannel::Temperature => write!(f, "temperature"),
            SensorChannel::Moisture => write!(f, "moisture"),
            SensorChannel::Ph => write!(f, "pH"),
        }
    }
}

// ---------------------------------------------------------------------------
// Critical conditions
// ---------------------------------------------------------------------------

pub fn is_critical_hot(reading: &SensorReading, t: &SensorThresholds) -> bool {
    reading.temperature_c > t.hot_above_c
}

pub fn is_critical_dry(reading: &SensorReading, t: &SensorThresholds) -> bool {
    reading.moisture_percent < t.dry_below_percent
}

/// Waterlogged pile, pH outside the tolerable band, or a channel that did
/// not report a finite value.
pub fn is_critical_other(reading: &SensorReading, t: &SensorThresholds) -> bool {
    let all_finite = [reading.temperature_c, reading.moisture_percent, reading.ph_level]
        .iter()
        .all(|v| v.is_finite());

    !all_finite
        || reading.moisture_percent > t.wet_above_percent
        || !t.tolerable_ph.contains(reading.ph_level)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Classifies one reading into its operating regime.
///
/// `alert` is set for every regime other than `Normal`. Readings outside the
/// ideal bands but inside the critical cutoffs stay `Normal`.
pub fn classify(reading: &SensorReading, thresholds: &SensorThresholds) -> SensorVerdict {
    let regime = if is_critical_hot(reading, thresholds) {
        SensorRegime::CriticalHot
    } else if is_critical_dry(reading, thresholds) {
        SensorRegime::CriticalDry
    } else if is_critical_other(reading, thresholds) {
        SensorRegime::CriticalOther
    } else {
        SensorRegime::Normal
    };

    SensorVerdict {
        regime,
        alert: regime != SensorRegime::Normal,
    }
}

/// Channels whose value lies outside its ideal band. Informational only;
/// does not influence the regime.
pub fn ideal_deviations(reading: &SensorReading, t: &SensorThresholds) -> Vec<SensorChannel> {
    let mut off = Vec::new();
    if !t.ideal_temperature_c.contains(reading.temperature_c) {
        off.push(SensorChannel::Temperature);
    }
    if !t.ideal_moisture_percent.contains(reading.moisture_percent) {
        off.push(SensorChannel::Moisture);
    }
    if !t.ideal_ph.contains(reading.ph_level) {
        off.push(SensorChannel::Ph);
    }
    off
}

/// Operator-facing one-liner for an alerting verdict. `None` when Normal.
pub fn alert_message(
    reading: &SensorReading,
    verdict: &SensorVerdict,
    t: &SensorThresholds,
) -> Option<String> {
    match verdict.regime {
        SensorRegime::Normal => None,
        SensorRegime::CriticalHot => Some(format!(
            "Temperature {} °C exceeds {} °C: thermal runaway / fire risk",
            reading.temperature_c, t.hot_above_c
        )),
        SensorRegime::CriticalDry => Some(format!(
            "Moisture {}% is below {}%: microbial activity stalling",
            reading.moisture_percent, t.dry_below_percent
        )),
        SensorRegime::CriticalOther => Some(format!(
            "Abnormal pile conditions: temperature {} °C, moisture {}%, pH {}",
            reading.temperature_c, reading.moisture_percent, reading.ph_level
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(temperature_c: f64, moisture_percent: f64, ph_level: f64) -> SensorReading {
        SensorReading {
            society_id: "SOC_HACKATHON_01".to_string(),
            temperature_c,
            moisture_percent,
            ph_level,
            day_of_cycle: 5,
        }
    }

    fn defaults() -> SensorThresholds {
        SensorThresholds::default()
    }

    // --- Scenarios ----------------------------------------------------------

    #[test]
    fn test_ideal_reading_is_normal() {
        let verdict = classify(&reading(60.0, 50.0, 7.0), &defaults());
        assert_eq!(verdict.regime, SensorRegime::Normal);
        assert!(!verdict.alert);
    }

    #[test]
    fn test_overheated_pile_is_critical_hot() {
        let verdict = classify(&reading(78.0, 50.0, 7.0), &defaults());
        assert_eq!(verdict.regime, SensorRegime::CriticalHot);
        assert!(verdict.alert);
    }

    #[test]
    fn test_dried_out_pile_is_critical_dry() {
        // Dry piles cool down as microbes stall, so temperature is low too.
        let verdict = classify(&reading(27.0, 12.0, 7.0), &defaults());
        assert_eq!(verdict.regime, SensorRegime::CriticalDry);
        assert!(verdict.alert);
    }

    #[test]
    fn test_hot_and_dry_resolves_to_hot() {
        let verdict = classify(&reading(80.0, 10.0, 7.0), &defaults());
        assert_eq!(verdict.regime, SensorRegime::CriticalHot, "heat must not be masked by moisture");
    }

    #[test]
    fn test_outside_ideal_but_tolerable_stays_normal() {
        let verdict = classify(&reading(40.0, 30.0, 8.0), &defaults());
        assert_eq!(verdict.regime, SensorRegime::Normal);
        assert_eq!(
            ideal_deviations(&reading(40.0, 30.0, 8.0), &defaults()),
            vec![SensorChannel::Temperature, SensorChannel::Moisture, SensorChannel::Ph]
        );
    }

    #[test]
    fn test_cutoffs_are_strict() {
        assert_eq!(classify(&reading(70.0, 50.0, 7.0), &defaults()).regime, SensorRegime::Normal);
        assert_eq!(classify(&reading(60.0, 20.0, 7.0), &defaults()).regime, SensorRegime::Normal);
    }

    // --- Critical-Other -----------------------------------------------------

    #[test]
    fn test_acidic_pile_is_critical_other() {
        let verdict = classify(&reading(60.0, 50.0, 4.8), &defaults());
        assert_eq!(verdict.regime, SensorRegime::CriticalOther);
        assert!(verdict.alert);
    }

    #[test]
    fn test_waterlogged_pile_is_critical_other() {
        assert_eq!(classify(&reading(60.0, 85.0, 7.0), &defaults()).regime, SensorRegime::CriticalOther);
    }

    #[test]
    fn test_non_finite_channel_is_critical_other() {
        assert_eq!(classify(&reading(f64::NAN, 50.0, 7.0), &defaults()).regime, SensorRegime::CriticalOther);
        assert_eq!(classify(&reading(60.0, 50.0, f64::NAN), &defaults()).regime, SensorRegime::CriticalOther);
    }

    #[test]
    fn test_dry_outranks_other() {
        assert_eq!(classify(&reading(60.0, 10.0, 4.0), &defaults()).regime, SensorRegime::CriticalDry);
    }

    // --- Properties over cutoff grids ---------------------------------------

    #[test]
    fn test_raising_temperature_past_cutoff_flips_to_hot() {
        for hot_above_c in [66.0, 70.0, 72.5, 90.0] {
            let t = SensorThresholds { hot_above_c, ..defaults() };
            assert_eq!(classify(&reading(hot_above_c, 50.0, 7.0), &t).regime, SensorRegime::Normal);
            assert_eq!(
                classify(&reading(hot_above_c + 0.1, 50.0, 7.0), &t).regime,
                SensorRegime::CriticalHot,
                "cutoff {}",
                hot_above_c
            );
        }
    }

    #[test]
    fn test_lowering_moisture_past_cutoff_flips_to_dry() {
        for dry_below_percent in [10.0, 15.0, 20.0, 35.0] {
            let t = SensorThresholds { dry_below_percent, ..defaults() };
            assert_eq!(classify(&reading(60.0, dry_below_percent, 7.0), &t).regime, SensorRegime::Normal);
            assert_eq!(
                classify(&reading(60.0, dry_below_percent - 0.1, 7.0), &t).regime,
                SensorRegime::CriticalDry,
                "cutoff {}",
                dry_below_percent
            );
        }
    }

    #[test]
    fn test_simultaneous_violation_resolves_to_hot_for_any_cutoffs() {
        for hot_above_c in [66.0, 70.0, 90.0] {
            for dry_below_percent in [10.0, 20.0, 35.0] {
                let t = SensorThresholds { hot_above_c, dry_below_percent, ..defaults() };
                let r = reading(hot_above_c + 1.0, dry_below_percent - 1.0, 7.0);
                assert_eq!(classify(&r, &t).regime, SensorRegime::CriticalHot);
            }
        }
    }

    #[test]
    fn test_alert_iff_not_normal() {
        for temperature in [20.0, 60.0, 71.0, 95.0] {
            for moisture in [5.0, 25.0, 50.0, 80.0] {
                for ph in [4.0, 7.0, 9.0] {
                    let verdict = classify(&reading(temperature, moisture, ph), &defaults());
                    assert_eq!(verdict.alert, verdict.regime != SensorRegime::Normal);
                }
            }
        }
    }

    #[test]
    fn test_classify_is_idempotent() {
        let r = reading(78.0, 12.0, 7.0);
        assert_eq!(classify(&r, &defaults()), classify(&r, &defaults()));
    }

    // --- Messages -----------------------------------------------------------

    #[test]
    fn test_alert_message_only_for_alerting_regimes() {
        let normal = reading(60.0, 50.0, 7.0);
        assert!(alert_message(&normal, &classify(&normal, &defaults()), &defaults()).is_none());

        let hot = reading(78.0, 50.0, 7.0);
        let msg = alert_message(&hot, &classify(&hot, &defaults()), &defaults())
            .expect("hot pile should produce a message");
        assert!(msg.contains("78"), "message should cite the reading: {}", msg);
        assert!(msg.contains("fire"));
    }
}
