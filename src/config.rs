use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::ttl_from_secs;

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub odds_feed: OddsFeedConfig,
}

/// Thresholds for the arbitrage and EV detectors.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum locked-in profit (%) for an arbitrage or a narrow middle.
    pub min_arbitrage_profit_pct: f64,
    /// Minimum best-side EV (%) for an EV opportunity.
    pub min_ev_pct: f64,
    /// Units split across the two arbitrage legs.
    pub total_stake: f64,
    /// Soft expiry stamped on arbitrage results.
    pub arbitrage_ttl_mins: i64,
    /// Line gap at which a pair is considered for a middle.
    pub middle_min_line_diff: f64,
    /// Line gap at which a middle is worth flagging even without profit.
    pub middle_wide_line_diff: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            min_arbitrage_profit_pct: 0.5,
            min_ev_pct: 2.0,
            total_stake: 100.0,
            arbitrage_ttl_mins: 30,
            middle_min_line_diff: 2.0,
            middle_wide_line_diff: 3.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SizingConfig {
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly).
    pub kelly_fraction: f64,
    /// Per-bet ceiling as a fraction of bankroll; never above 0.10.
    pub max_bankroll_fraction: f64,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            kelly_fraction: 0.25,
            max_bankroll_fraction: 0.10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_secs: u64,
    pub low_quota_threshold: u64,
    /// Persist records as JSON files here instead of in memory.
    pub store_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            low_quota_threshold: 10,
            store_dir: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OddsFeedConfig {
    pub base_url: String,
    pub regions: String,
    pub bookmakers: Option<String>,
    pub sport: String,
    pub markets: Vec<String>,
    pub request_timeout_ms: u64,
}

impl Default for OddsFeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.the-odds-api.com".to_string(),
            regions: "us".to_string(),
            bookmakers: None,
            sport: "basketball_nba".to_string(),
            markets: vec![
                "player_points".to_string(),
                "player_rebounds".to_string(),
                "player_assists".to_string(),
            ],
            request_timeout_ms: 10_000,
        }
    }
}

impl OddsFeedConfig {
    /// Cache market-type key and `markets=` query value.
    pub fn market_list(&self) -> String {
        self.markets.join(",")
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine or cache cannot represent.
    pub fn validate(&self) -> Result<()> {
        if ttl_from_secs(self.cache.ttl_secs).is_none() {
            anyhow::bail!("cache.ttl_secs out of range: {}", self.cache.ttl_secs);
        }
        let ttl_mins = self.detection.arbitrage_ttl_mins;
        if ttl_mins < 0 || chrono::Duration::try_minutes(ttl_mins).is_none() {
            anyhow::bail!("detection.arbitrage_ttl_mins out of range: {ttl_mins}");
        }
        let sizing = &self.sizing;
        if !(sizing.kelly_fraction.is_finite() && sizing.kelly_fraction >= 0.0) {
            anyhow::bail!("sizing.kelly_fraction must be non-negative, got {}", sizing.kelly_fraction);
        }
        if self.odds_feed.markets.is_empty() {
            anyhow::bail!("odds_feed.markets must list at least one market");
        }
        Ok(())
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    pub fn odds_api_key() -> Result<String> {
        match std::env::var("ODDS_API_KEY") {
            Ok(key) if !sanitize_key(&key).is_empty() => Ok(sanitize_key(&key)),
            _ => anyhow::bail!("ODDS_API_KEY is not set (environment or {})", ENV_FILE),
        }
    }
}

/// Strip carriage returns, BOM, and other invisible chars from a key value.
fn sanitize_key(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_parses() {
        let config = Config::load(Path::new("config.toml")).unwrap();
        assert_eq!(config.detection.min_arbitrage_profit_pct, 0.5);
        assert_eq!(config.detection.min_ev_pct, 2.0);
        assert_eq!(config.sizing.kelly_fraction, 0.25);
        assert_eq!(config.cache.ttl_secs, 300);
        assert!(!config.odds_feed.markets.is_empty());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::parse("[sizing]\nkelly_fraction = 0.5\n").unwrap();
        assert_eq!(config.sizing.kelly_fraction, 0.5);
        assert_eq!(config.sizing.max_bankroll_fraction, 0.10);
        assert_eq!(config.detection.total_stake, 100.0);
        assert_eq!(config.cache.low_quota_threshold, 10);
        assert_eq!(config.odds_feed.sport, "basketball_nba");
    }

    #[test]
    fn test_market_list() {
        let config = OddsFeedConfig {
            markets: vec!["player_points".into(), "player_threes".into()],
            ..Default::default()
        };
        assert_eq!(config.market_list(), "player_points,player_threes");
    }

    #[test]
    fn test_out_of_range_ttl_rejected() {
        let err = Config::parse("[cache]\nttl_secs = 9223372036854775807\n").unwrap_err();
        assert!(err.to_string().contains("ttl_secs"), "{err}");
        assert!(Config::parse("[cache]\nttl_secs = 86400\n").is_ok());
    }

    #[test]
    fn test_bad_detection_and_feed_values_rejected() {
        assert!(Config::parse("[detection]\narbitrage_ttl_mins = -5\n").is_err());
        assert!(Config::parse("[detection]\narbitrage_ttl_mins = 9223372036854775807\n").is_err());
        assert!(Config::parse("[sizing]\nkelly_fraction = -0.25\n").is_err());
        assert!(Config::parse("[odds_feed]\nmarkets = []\n").is_err());
    }

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("\u{feff}abc123\r\n"), "abc123");
    }
}
