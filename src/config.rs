//! Runtime configuration, read from `SMAM_*` environment variables.
//!
//! Every setting has a default. Values that fail to parse fall back to the
//! default rather than aborting startup.

use std::env;
use std::str::FromStr;

use crate::classifier::FallThresholds;
use crate::scheduler::DosagePolicy;

/// Default port if not specified via environment variable.
const DEFAULT_PORT: u16 = 3000;

/// Default database path if not specified via environment variable.
const DEFAULT_DB_PATH: &str = "sqlite:smam.db?mode=rwc";

const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub queue_capacity: usize,
    pub run_fall: bool,
    pub run_medication: bool,
    pub thresholds: FallThresholds,
    pub dosage: DosagePolicy,
    pub seed: Option<u64>,
    pub console: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: DEFAULT_DB_PATH.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            run_fall: true,
            run_medication: true,
            thresholds: FallThresholds::default(),
            dosage: DosagePolicy::default(),
            seed: None,
            console: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let (run_fall, run_medication) = match lookup("SMAM_SUBSCRIBERS") {
            Some(list) => {
                let names: Vec<String> = list
                    .split(',')
                    .map(|name| name.trim().to_ascii_lowercase())
                    .collect();
                (
                    names.iter().any(|n| n == "fall"),
                    names.iter().any(|n| n == "medication"),
                )
            }
            None => (defaults.run_fall, defaults.run_medication),
        };

        Self {
            port: parse_var(&lookup, "SMAM_PORT").unwrap_or(defaults.port),
            database_url: lookup("SMAM_DATABASE_URL").unwrap_or(defaults.database_url),
            queue_capacity: parse_var(&lookup, "SMAM_QUEUE_CAPACITY")
                .filter(|capacity: &usize| *capacity > 0)
                .unwrap_or(defaults.queue_capacity),
            run_fall,
            run_medication,
            thresholds: FallThresholds {
                x_max: parse_var(&lookup, "SMAM_FALL_X_MAX").unwrap_or(defaults.thresholds.x_max),
                y_min: parse_var(&lookup, "SMAM_FALL_Y_MIN").unwrap_or(defaults.thresholds.y_min),
                z_max: parse_var(&lookup, "SMAM_FALL_Z_MAX").unwrap_or(defaults.thresholds.z_max),
            },
            dosage: lookup("SMAM_DOSAGE_MG")
                .and_then(|v| parse_dosage(&v))
                .unwrap_or(defaults.dosage),
            seed: parse_var(&lookup, "SMAM_SEED"),
            console: lookup("SMAM_CONSOLE")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.console),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// `"75"` is a fixed dosage, `"50-200"` an inclusive range.
fn parse_dosage(value: &str) -> Option<DosagePolicy> {
    match value.split_once('-') {
        Some((min, max)) => {
            let min = min.trim().parse().ok()?;
            let max = max.trim().parse().ok()?;
            (min <= max).then_some(DosagePolicy::Range { min, max })
        }
        None => value.trim().parse().ok().map(DosagePolicy::Fixed),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
