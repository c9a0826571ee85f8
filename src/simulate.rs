/// Synthetic telemetry for development and demos
///
/// When no sensor unit is attached, use this module to generate plausible
/// compost-pile readings and exercise the classifier and alert webhook.
/// Generators are seeded so a run can be replayed exactly.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::str::FromStr;

use crate::model::SensorReading;

/// Operating condition to simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Healthy thermophilic pile
    Normal,
    /// Moisture collapses and the pile cools as microbes die off
    CriticalDry,
    /// Runaway heating, fire risk
    CriticalHot,
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "normal" => Ok(Scenario::Normal),
            "critical_dry" | "dry" => Ok(Scenario::CriticalDry),
            "critical_hot" | "hot" => Ok(Scenario::CriticalHot),
            other => Err(format!("unknown scenario '{}'", other)),
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scenario::Normal => write!(f, "NORMAL"),
            Scenario::CriticalDry => write!(f, "CRITICAL_DRY"),
            Scenario::CriticalHot => write!(f, "CRITICAL_HOT"),
        }
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Clamps a rate into [0, 1]; NaN and infinities count as never.
fn probability(rate: f64) -> f64 {
    if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 }
}

/// Configuration and state for a simulated sensor unit
pub struct SensorSimulator {
    pub society_id: String,
    /// Current day of the composting cycle
    pub day: u32,
    /// Chance that `next_reading` injects a Critical-Dry event (default: 0.2)
    pub failure_rate: f64,
    /// Chance that the cycle advances one day after a reading (default: 0.1)
    pub day_advance_rate: f64,
    rng: StdRng,
}

impl SensorSimulator {
    /// Create a simulator starting at `start_day`, seeded for replay
    pub fn new(society_id: impl Into<String>, start_day: u32, seed: u64) -> Self {
        Self {
            society_id: society_id.into(),
            day: start_day,
            failure_rate: 0.2,
            day_advance_rate: 0.1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate one reading for the given scenario on the current day
    pub fn generate(&mut self, scenario: Scenario) -> SensorReading {
        let mut temperature_c = self.rng.gen_range(55.0..=65.0);
        let mut moisture_percent = self.rng.gen_range(45.0..=55.0);
        let ph_level = self.rng.gen_range(6.5..=7.5);

        match scenario {
            Scenario::Normal => {}
            Scenario::CriticalDry => {
                moisture_percent = self.rng.gen_range(10.0..=15.0);
                temperature_c = self.rng.gen_range(25.0..=30.0);
            }
            Scenario::CriticalHot => {
                temperature_c = self.rng.gen_range(75.0..=80.0);
            }
        }

        SensorReading {
            society_id: self.society_id.clone(),
            temperature_c: round1(temperature_c),
            moisture_percent: round1(moisture_percent),
            ph_level: round1(ph_level),
            day_of_cycle: self.day,
        }
    }

    /// Generate the next reading of a free-running unit: mostly Normal with
    /// occasional Critical-Dry events, slowly advancing the cycle day
    pub fn next_reading(&mut self) -> (Scenario, SensorReading) {
        let scenario = if self.rng.gen_bool(probability(self.failure_rate)) {
            Scenario::CriticalDry
        } else {
            Scenario::Normal
        };
        let reading = self.generate(scenario);

        if self.rng.gen_bool(probability(self.day_advance_rate)) {
            self.day += 1;
        }
        (scenario, reading)
    }
}
