use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::workflow::{DEFAULT_FAILURE_RATE, DEFAULT_SUBMIT_DELAY};

pub const DEFAULT_LOADING_DELAY: Duration = Duration::from_millis(500);

/// Runtime settings, read from `JOBBOARD_*` environment variables.
/// Command-line flags override individual fields afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// `None` means the platform data directory.
    pub db_path: Option<PathBuf>,
    pub catalog_path: Option<PathBuf>,
    pub failure_rate: f64,
    pub seed: Option<u64>,
    pub submit_delay: Duration,
    pub loading_delay: Duration,
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            catalog_path: None,
            failure_rate: DEFAULT_FAILURE_RATE,
            seed: None,
            submit_delay: DEFAULT_SUBMIT_DELAY,
            loading_delay: DEFAULT_LOADING_DELAY,
            log_filter: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let failure_rate = match var("JOBBOARD_FAILURE_RATE") {
            Some(raw) => {
                let rate: f64 = raw
                    .trim()
                    .parse()
                    .context("JOBBOARD_FAILURE_RATE must be a number")?;
                if !(0.0..=1.0).contains(&rate) {
                    return Err(anyhow!(
                        "JOBBOARD_FAILURE_RATE must be between 0 and 1, got {}",
                        rate
                    ));
                }
                rate
            }
            None => defaults.failure_rate,
        };

        let seed = var("JOBBOARD_SEED")
            .map(|raw| raw.trim().parse::<u64>())
            .transpose()
            .context("JOBBOARD_SEED must be a non-negative integer")?;

        Ok(Config {
            db_path: var("JOBBOARD_DB").map(PathBuf::from),
            catalog_path: var("JOBBOARD_CATALOG").map(PathBuf::from),
            failure_rate,
            seed,
            submit_delay: parse_millis(var("JOBBOARD_SUBMIT_DELAY_MS"), "JOBBOARD_SUBMIT_DELAY_MS")?
                .unwrap_or(defaults.submit_delay),
            loading_delay: parse_millis(var("JOBBOARD_LOADING_DELAY_MS"), "JOBBOARD_LOADING_DELAY_MS")?
                .unwrap_or(defaults.loading_delay),
            log_filter: var("RUST_LOG")
                .or_else(|| var("JOBBOARD_LOG"))
                .unwrap_or(defaults.log_filter),
        })
    }
}

fn parse_millis(raw: Option<String>, key: &str) -> Result<Option<Duration>> {
    raw.map(|v| {
        v.trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .with_context(|| format!("{key} must be a whole number of milliseconds"))
    })
    .transpose()
}
