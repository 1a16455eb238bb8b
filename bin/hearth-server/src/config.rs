//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use hearth_core::ServiceOptions;

/// Runtime configuration for hearth-server.
///
/// Every field has a default so the server starts against a local Ollama
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://hearth.db?mode=rwc"`).
    pub database_url: String,

    /// Base URL of the Ollama HTTP API.
    pub ollama_url: String,

    /// Public model library page scraped for downloadable names.
    pub library_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Bearer token required on `/admin`; `None` leaves it open.
    pub admin_token: Option<String>,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    pub enable_swagger: bool,

    /// Seconds between background syncs; 0 disables them.
    pub sync_interval_secs: u64,

    pub download_timeout_secs: u64,

    pub library_ttl_secs: u64,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("HEARTH_BIND", "0.0.0.0:3000"),
            database_url: env_or("HEARTH_DATABASE_URL", "sqlite://hearth.db?mode=rwc"),
            ollama_url: env_or("HEARTH_OLLAMA_URL", "http://127.0.0.1:11434"),
            library_url: env_or("HEARTH_LIBRARY_URL", "https://ollama.com/library"),
            log_level: env_or("HEARTH_LOG", "info"),
            log_json: env_flag("HEARTH_LOG_JSON", false),
            admin_token: env_opt("HEARTH_ADMIN_TOKEN"),
            cors_allowed_origins: env_opt("HEARTH_CORS_ORIGINS"),
            enable_swagger: env_flag("HEARTH_ENABLE_SWAGGER", true),
            sync_interval_secs: parse_env("HEARTH_SYNC_INTERVAL_SECS", 300),
            download_timeout_secs: parse_env("HEARTH_DOWNLOAD_TIMEOUT_SECS", 1800),
            library_ttl_secs: parse_env("HEARTH_LIBRARY_TTL_SECS", 86_400),
        }
    }

    pub fn service_options(&self) -> ServiceOptions {
        ServiceOptions {
            download_timeout: Duration::from_secs(self.download_timeout_secs),
            catalog_ttl: Duration::from_secs(self.library_ttl_secs),
        }
    }

    /// `None` when periodic sync is disabled.
    pub fn sync_interval(&self) -> Option<Duration> {
        (self.sync_interval_secs > 0).then(|| Duration::from_secs(self.sync_interval_secs))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".into(),
            database_url: "sqlite://hearth.db?mode=rwc".into(),
            ollama_url: "http://127.0.0.1:11434".into(),
            library_url: "https://ollama.com/library".into(),
            log_level: "info".into(),
            log_json: false,
            admin_token: None,
            cors_allowed_origins: None,
            enable_swagger: true,
            sync_interval_secs: 300,
            download_timeout_secs: 1800,
            library_ttl_secs: 86_400,
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zero_interval_disables_periodic_sync() {
        let cfg = Config {
            sync_interval_secs: 0,
            ..Config::default()
        };
        assert!(cfg.sync_interval().is_none());
        assert_eq!(
            Config::default().sync_interval(),
            Some(Duration::from_secs(300))
        );
    }

    #[test]
    fn service_options_carry_timeouts() {
        let opts = Config::default().service_options();
        assert_eq!(opts.download_timeout, Duration::from_secs(1800));
        assert_eq!(opts.catalog_ttl, Duration::from_secs(86_400));
    }
}
