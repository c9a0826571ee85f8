/// Signal extraction adapters.
///
/// Submodules:
/// - `detection` - runs the site-photo object detector and validates its output.
/// - `meter`     - reads serial number and kWh off a meter photo with a
///                 vision-language model.

pub mod detection;
pub mod meter;
