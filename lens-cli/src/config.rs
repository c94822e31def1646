//! CLI config: database, logging, resolver tuning. Loaded from env.

use anyhow::{Context, Result};
use resolver::{ResolverConfig, RetrySchedule, DEFAULT_MAX_ANCESTOR_HOPS, DEFAULT_RETRY_DELAYS_MS};
use std::env;

/// More delays than this would keep an element pending for too long.
const MAX_RETRY_DELAYS: usize = 10;

#[derive(Debug, Clone)]
pub struct LensConfig {
    /// DATABASE_URL: SQLite file holding the backing key-value table
    pub database_url: String,
    /// LOG_FILE
    pub log_file: String,
    /// LENS_RETRY_DELAYS_MS, comma-separated milliseconds
    pub retry_delays_ms: Vec<u64>,
    /// LENS_MAX_ANCESTOR_HOPS
    pub max_ancestor_hops: usize,
}

impl LensConfig {
    /// Load from environment variables. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn load() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").unwrap_or_else(|_| "./lens.db".to_string());
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| "logs/lens.log".to_string());
        let retry_delays_ms = match env::var("LENS_RETRY_DELAYS_MS") {
            Ok(raw) => parse_delays(&raw)
                .with_context(|| format!("LENS_RETRY_DELAYS_MS is not a list of integers: {raw}"))?,
            Err(_) => DEFAULT_RETRY_DELAYS_MS.to_vec(),
        };
        let max_ancestor_hops = env::var("LENS_MAX_ANCESTOR_HOPS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_ANCESTOR_HOPS);

        Ok(Self {
            database_url,
            log_file,
            retry_delays_ms,
            max_ancestor_hops,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_delays_ms.is_empty() {
            anyhow::bail!("LENS_RETRY_DELAYS_MS must list at least one delay");
        }
        if self.retry_delays_ms.len() > MAX_RETRY_DELAYS {
            anyhow::bail!(
                "LENS_RETRY_DELAYS_MS lists {} delays; at most {} are allowed",
                self.retry_delays_ms.len(),
                MAX_RETRY_DELAYS
            );
        }
        if self.max_ancestor_hops == 0 {
            anyhow::bail!("LENS_MAX_ANCESTOR_HOPS must be at least 1");
        }
        Ok(())
    }

    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            max_ancestor_hops: self.max_ancestor_hops,
            retry: RetrySchedule::from_millis(&self.retry_delays_ms),
            ..ResolverConfig::default()
        }
    }
}

fn parse_delays(raw: &str) -> Result<Vec<u64>, std::num::ParseIntError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}
