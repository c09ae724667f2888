use std::env;

/// Service configuration derived from environment variables, with
/// the defaults of the original deployment. A `.env` file is loaded
/// by main before this runs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Seconds between periodic refreshes.
    pub refresh_interval_secs: u64,
    /// Instrument count when the caller does not specify one.
    pub default_limit: usize,
    /// Hard cap on any requested instrument count.
    pub max_limit: usize,
    /// Start the periodic refresh loop at startup.
    pub auto_refresh: bool,
    /// Delay between successive per-instrument upstream calls.
    pub pace_delay_ms: u64,
    /// Quote-asset suffix instruments must trade against.
    pub quote_asset: String,
    /// HTTP listen port.
    pub port: u16,
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|s| matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_str(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

impl Config {
    pub fn from_env() -> Self {
        let default_limit = env_usize("QB_DEFAULT_LIMIT", 20);
        let max_limit = env_usize("QB_MAX_LIMIT", 100);

        Self {
            refresh_interval_secs: env_u64("QB_REFRESH_INTERVAL_SECS", 30),
            default_limit: default_limit.min(max_limit),
            max_limit,
            auto_refresh: env_bool("QB_AUTO_REFRESH", true),
            pace_delay_ms: env_u64("QB_PACE_DELAY_MS", 100),
            quote_asset: env_str("QB_QUOTE_ASSET", "USDT"),
            port: env_u16("QB_PORT", 8080),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 30,
            default_limit: 20,
            max_limit: 100,
            auto_refresh: true,
            pace_delay_ms: 100,
            quote_asset: "USDT".to_string(),
            port: 8080,
        }
    }
}
