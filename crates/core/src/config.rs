use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::duration::{format_duration, parse_duration};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_duration(profile: &str, key: &str) -> Option<Duration> {
    let raw = profiled_env_opt(profile, key)?;
    match parse_duration(&raw) {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(key = %key, value = %raw, error = %e, "ignoring invalid duration");
            None
        }
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub module: ModuleConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `WEIR_PROFILE` env var. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("WEIR_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            module: ModuleConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  module:      update_timeout={}, poll_frequency={}",
            self.module
                .update_timeout
                .map(format_duration)
                .unwrap_or_else(|| "(none)".to_string()),
            format_duration(self.module.poll_frequency),
        );
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "127.0.0.1"),
            port: profiled_env_u16(p, "PORT", 12345),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// ── Module loader ─────────────────────────────────────────────

/// Defaults applied to every module loader built by a binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Upper bound on how long an update waits for its watcher (None = unbounded).
    pub update_timeout: Option<Duration>,
    /// Poll frequency used when a poll detector does not set its own.
    pub poll_frequency: Duration,
}

pub const DEFAULT_POLL_FREQUENCY: Duration = Duration::from_secs(60);

impl ModuleConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            update_timeout: profiled_env_duration(p, "MODULE_UPDATE_TIMEOUT"),
            poll_frequency: profiled_env_duration(p, "MODULE_POLL_FREQUENCY")
                .filter(|d| !d.is_zero())
                .unwrap_or(DEFAULT_POLL_FREQUENCY),
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            update_timeout: None,
            poll_frequency: DEFAULT_POLL_FREQUENCY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own profile prefix so parallel tests do not collide.

    #[test]
    fn profiled_key_wins_over_plain_key() {
        env::set_var("CFGTEST_A_MODULE_UPDATE_TIMEOUT", "5s");
        let cfg = Config::for_profile("cfgtest_a");
        assert_eq!(cfg.profile, "CFGTEST_A");
        assert_eq!(cfg.module.update_timeout, Some(Duration::from_secs(5)));
        env::remove_var("CFGTEST_A_MODULE_UPDATE_TIMEOUT");
    }

    #[test]
    fn invalid_duration_falls_back_to_default() {
        env::set_var("CFGTEST_B_MODULE_POLL_FREQUENCY", "soon");
        let cfg = Config::for_profile("CFGTEST_B");
        assert_eq!(cfg.module.poll_frequency, DEFAULT_POLL_FREQUENCY);
        env::remove_var("CFGTEST_B_MODULE_POLL_FREQUENCY");
    }

    #[test]
    fn zero_poll_frequency_is_rejected() {
        env::set_var("CFGTEST_C_MODULE_POLL_FREQUENCY", "0s");
        let cfg = Config::for_profile("CFGTEST_C");
        assert_eq!(cfg.module.poll_frequency, DEFAULT_POLL_FREQUENCY);
        env::remove_var("CFGTEST_C_MODULE_POLL_FREQUENCY");
    }

    #[test]
    fn listen_addr_joins_host_and_port() {
        let server = ServerConfig {
            host: "0.0.0.0".into(),
            port: 9000,
        };
        assert_eq!(server.listen_addr(), "0.0.0.0:9000");
    }
}
