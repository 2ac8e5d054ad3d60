//! # Runtime Configuration
//!
//! Loaded from `RV_*` environment variables on top of defaults. Bad values
//! are logged and ignored rather than aborting startup.

use ranked_voting::RankingConfig;
use std::str::FromStr;
use tracing::warn;

/// Complete runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Redis URL. `None` selects the in-memory store.
    pub redis_url: Option<String>,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Submit the demo articles before replaying the flow.
    pub seed_demo: bool,
    /// Score range whose first article's link is printed.
    pub range_min: f64,
    pub range_max: f64,
    /// Ranking parameters.
    pub ranking: RankingConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            log_level: "info".to_string(),
            seed_demo: false,
            range_min: 10.0,
            range_max: 20.0,
            ranking: RankingConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup("RV_REDIS_URL").filter(|u| !u.is_empty()) {
            config.redis_url = Some(url);
        }
        if let Some(level) = lookup("RV_LOG_LEVEL") {
            config.log_level = level;
        }

        override_parsed(&lookup, "RV_SEED_DEMO", &mut config.seed_demo);
        override_parsed(&lookup, "RV_RANGE_MIN", &mut config.range_min);
        override_parsed(&lookup, "RV_RANGE_MAX", &mut config.range_max);

        let ranking = &mut config.ranking;
        override_parsed(
            &lookup,
            "RV_ELIGIBILITY_WINDOW_SECS",
            &mut ranking.eligibility_window_secs,
        );
        override_parsed(&lookup, "RV_VOTE_SCORE", &mut ranking.vote_score);
        override_parsed(&lookup, "RV_MAX_COMMIT_RETRIES", &mut ranking.max_commit_retries);
        override_parsed(&lookup, "RV_STORE_TIMEOUT_MS", &mut ranking.store_timeout_ms);
        override_parsed(&lookup, "RV_SCAN_PAGE_SIZE", &mut ranking.scan_page_size);

        config
    }
}

fn override_parsed<V: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut V) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => warn!(key, value = %raw, "Ignoring unparsable setting"),
        }
    }
}
