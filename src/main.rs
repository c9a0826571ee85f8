use std::error::Error;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use compmon_service::config::ServiceConfig;
use compmon_service::ingest::detection::ScriptDetector;
use compmon_service::ingest::meter::{GeminiMeterExtractor, MeterExtractor, UnavailableExtractor};
use compmon_service::logging::{self, init_logger, Component};
use compmon_service::model::{SensorReading, Submission};
use compmon_service::pipeline::{process_readings, process_submission, SubmissionImages};
use compmon_service::simulate::{Scenario, SensorSimulator};
use compmon_service::sink::{PayloadSink, WebhookSink};

const USAGE: &str = "\
Usage:
  compmon verify <compost_img> <meter_img> <report_id> <society_id> <submitted_by> [--send]
  compmon classify <reading-json | -> [--send]
  compmon simulate <society_id> <count> [scenario] [--seed N] [--send]
  compmon check-config";

fn main() {
    if let Err(e) = run() {
        eprintln!("✗ {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let send = args.iter().any(|a| a == "--send");
    let positional: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| *a != "--send")
        .collect();

    let config = ServiceConfig::load_from_env()?;
    init_logger(
        config.logging.min_level(),
        config.logging.file.as_deref(),
        config.logging.timestamps,
    );
    logging::info(
        Component::System,
        None,
        &format!("compmon {} starting", env!("CARGO_PKG_VERSION")),
    );
    logging::debug(
        Component::Config,
        None,
        &format!(
            "{} registered serial(s), kWh threshold {}, detection threshold {}",
            config.registered_serials.len(),
            config.verification.kwh_threshold,
            config.verification.detection_threshold
        ),
    );

    match positional.first().copied() {
        Some("verify") => cmd_verify(&config, &positional[1..], send),
        Some("classify") => cmd_classify(&config, &positional[1..], send),
        Some("simulate") => cmd_simulate(&config, &positional[1..], send),
        Some("check-config") => cmd_check_config(&config),
        _ => Err(USAGE.into()),
    }
}

fn build_sink(config: &ServiceConfig, send: bool) -> Result<Option<WebhookSink>, Box<dyn Error>> {
    if send {
        Ok(Some(WebhookSink::from_config(&config.sink)?))
    } else {
        Ok(None)
    }
}

// ---------------------------------------------------------------------------
// verify
// ---------------------------------------------------------------------------

fn cmd_verify(config: &ServiceConfig, args: &[&str], send: bool) -> Result<(), Box<dyn Error>> {
    let [compost, meter, report_id, society_id, submitted_by] = args else {
        return Err(USAGE.into());
    };

    let detector = ScriptDetector::from_config(&config.extractor);
    let extractor: Box<dyn MeterExtractor> = match GeminiMeterExtractor::from_config(&config.extractor) {
        Ok(extractor) => Box::new(extractor),
        Err(e) => {
            logging::warn(Component::Config, Some(*report_id), &format!("Meter extractor unavailable: {}", e));
            Box::new(UnavailableExtractor::new(e))
        }
    };
    let sink = build_sink(config, send)?;

    let submission = Submission::new(*report_id, *society_id, *submitted_by);
    let images = SubmissionImages {
        compost_image: Path::new(compost),
        meter_image: Path::new(meter),
    };

    println!("🔍 Verifying {} for {}...", submission.report_id, submission.society_id);
    let outcome = process_submission(
        config,
        &detector,
        extractor.as_ref(),
        sink.as_ref().map(|s| s as &dyn PayloadSink),
        &submission,
        images,
    );

    println!("{}", serde_json::to_string_pretty(&outcome.payload)?);
    if let Some(Err(e)) = outcome.delivery {
        return Err(e.into());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

/// Sensor payload as pushed by field units: readings nested under `sensors`.
#[derive(Deserialize)]
struct WireReading {
    society_id: String,
    sensors: WireSensors,
}

#[derive(Deserialize)]
struct WireSensors {
    temperature_c: f64,
    moisture_percent: f64,
    ph_level: f64,
    day_of_cycle: u32,
}

fn parse_reading(text: &str) -> Result<SensorReading, Box<dyn Error>> {
    if let Ok(reading) = serde_json::from_str::<SensorReading>(text) {
        return Ok(reading);
    }
    let wire: WireReading = serde_json::from_str(text)?;
    Ok(SensorReading {
        society_id: wire.society_id,
        temperature_c: wire.sensors.temperature_c,
        moisture_percent: wire.sensors.moisture_percent,
        ph_level: wire.sensors.ph_level,
        day_of_cycle: wire.sensors.day_of_cycle,
    })
}

fn cmd_classify(config: &ServiceConfig, args: &[&str], send: bool) -> Result<(), Box<dyn Error>> {
    let text = match args.first().copied() {
        Some("-") | None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        Some(json) => json.to_string(),
    };
    let reading = parse_reading(&text)?;
    let sink = build_sink(config, send)?;

    let outcomes = process_readings(
        config,
        sink.as_ref().map(|s| s as &dyn PayloadSink),
        std::slice::from_ref(&reading),
    );
    for outcome in outcomes {
        println!("{}", serde_json::to_string_pretty(&outcome.payload)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// simulate
// ---------------------------------------------------------------------------

fn cmd_simulate(config: &ServiceConfig, args: &[&str], send: bool) -> Result<(), Box<dyn Error>> {
    let mut seed: u64 = 42;
    let mut rest = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if *arg == "--seed" {
            seed = iter.next().ok_or("--seed needs a value")?.parse()?;
        } else {
            rest.push(*arg);
        }
    }

    let (society_id, count, scenario) = match rest.as_slice() {
        [society_id, count] => (*society_id, count.parse::<usize>()?, None),
        [society_id, count, scenario] => (
            *society_id,
            count.parse::<usize>()?,
            Some(scenario.parse::<Scenario>()?),
        ),
        _ => return Err(USAGE.into()),
    };

    let mut sim = SensorSimulator::new(society_id, 5, seed);
    let readings: Vec<SensorReading> = (0..count)
        .map(|_| match scenario {
            Some(s) => sim.generate(s),
            None => sim.next_reading().1,
        })
        .collect();

    logging::info(
        Component::Telemetry,
        Some(society_id),
        &format!("Simulating {} reading(s), seed {}", count, seed),
    );

    let sink = build_sink(config, send)?;
    let outcomes = process_readings(config, sink.as_ref().map(|s| s as &dyn PayloadSink), &readings);
    for outcome in outcomes {
        println!("{}", serde_json::to_string(&outcome.payload)?);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// check-config
// ---------------------------------------------------------------------------

fn cmd_check_config(config: &ServiceConfig) -> Result<(), Box<dyn Error>> {
    config.validate()?;
    logging::info(Component::Config, None, "Configuration valid");
    println!("✓ Configuration valid");
    println!("  Registered serials: {}", config.registered_serials.len());
    println!("  kWh threshold:      {}", config.verification.kwh_threshold);
    println!("  Detection threshold: {}", config.verification.detection_threshold);
    println!(
        "  Report webhook:     {}",
        config.sink.report_webhook_url.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "  Alert webhook:      {}",
        config.sink.alert_webhook_url.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "  Vision API key:     {}",
        if config.extractor.gemini_api_key.is_some() { "set" } else { "missing" }
    );
    Ok(())
}
