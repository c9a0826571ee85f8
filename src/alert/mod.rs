/// Telemetry alerting.
///
/// Submodules:
/// - `regimes` - classifies sensor readings into operating regimes and
///   decides whether an alert fires.

pub mod regimes;

pub use regimes::{classify, ideal_deviations, SensorChannel};
