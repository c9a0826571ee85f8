//! Compliance monitoring for community composting sites.
//!
//! Verifies that a registered composting machine is installed and drawing
//! power (site photo + meter photo), and watches pile telemetry for
//! conditions that need an operator.
//!
//! Module map:
//! - `model`    - shared domain types and thresholds
//! - `serials`  - registered meter serial numbers
//! - `verify`   - submission verification rules
//! - `alert`    - telemetry regime classification
//! - `report`   - outbound payload shapes
//! - `ingest`   - detector and meter-extractor adapters
//! - `sink`     - workflow webhook delivery
//! - `pipeline` - wiring of the above, with logging
//! - `simulate` - synthetic telemetry
//! - `config`, `logging`

pub mod alert;
pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod serials;
pub mod simulate;
pub mod sink;
pub mod verify;
