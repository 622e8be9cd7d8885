use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

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

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Split a comma-separated env value into trimmed, non-empty items.
fn profiled_env_list(profile: &str, key: &str, default: &[&str]) -> Vec<String> {
    match profiled_env_opt(profile, key) {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

// ── Top-level config ──────────────────────────────────────────

/// Plugin name that marks the distributed-search extension as installed.
pub const DISTRIBUTED_SEARCH_PLUGIN: &str = "siren-vanguard";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub elasticsearch: ElasticsearchConfig,
    pub watcher: WatcherConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `WATCHKEEPER_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("WATCHKEEPER_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            elasticsearch: ElasticsearchConfig::from_env_profiled(p),
            watcher: WatcherConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        let es = &self.elasticsearch;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  elasticsearch: url={}, auth={}, plugins=[{}], operations=[{}]",
            es.base_url(),
            if es.username.is_some() { "basic" } else { "none" },
            es.plugins.join(","),
            es.search_operations.join(","),
        );
        tracing::info!(
            "  watcher:       index={}, reload={}s, firing_timeout={}",
            self.watcher.index,
            self.watcher.reload_interval_secs,
            match self.watcher.firing_timeout() {
                Some(t) => format!("{}s", t.as_secs()),
                None => "off".to_string(),
            },
        );
    }
}

// ── Elasticsearch ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    pub host: String,
    pub port: u16,
    pub use_ssl: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Installed cluster plugins, as reported by the deployment.
    pub plugins: Vec<String>,
    /// Search endpoints the cluster offers (`search`, `kibi_search`, `vanguard_search`).
    pub search_operations: Vec<String>,
    pub timeout_ms: u64,
}

impl ElasticsearchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "ELASTICSEARCH_HOST", "localhost"),
            port: profiled_env_u16(p, "ELASTICSEARCH_PORT", 9200),
            use_ssl: profiled_env_or(p, "ELASTICSEARCH_USE_SSL", "false") == "true",
            username: profiled_env_opt(p, "ELASTICSEARCH_USERNAME"),
            password: profiled_env_opt(p, "ELASTICSEARCH_PASSWORD"),
            plugins: profiled_env_list(p, "ELASTICSEARCH_PLUGINS", &[]),
            search_operations: profiled_env_list(p, "ELASTICSEARCH_SEARCH_OPERATIONS", &["search"]),
            timeout_ms: profiled_env_u64(p, "ELASTICSEARCH_TIMEOUT_MS", 30_000),
        }
    }

    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// Whether the distributed-search extension is installed on the cluster.
    pub fn distributed_search_available(&self) -> bool {
        self.plugins.iter().any(|p| p == DISTRIBUTED_SEARCH_PLUGIN)
    }
}

// ── Watcher scheduling ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Index holding watcher definitions.
    pub index: String,
    /// Seconds between reconciliation passes.
    pub reload_interval_secs: u64,
    /// Upper bound on a single firing in seconds; 0 disables the bound.
    pub firing_timeout_secs: u64,
}

impl WatcherConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            index: profiled_env_or(p, "WATCHER_INDEX", "watcher"),
            reload_interval_secs: profiled_env_u64(p, "WATCHER_RELOAD_INTERVAL_SECS", 60),
            firing_timeout_secs: profiled_env_u64(p, "WATCHER_FIRING_TIMEOUT_SECS", 300),
        }
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs.max(1))
    }

    pub fn firing_timeout(&self) -> Option<Duration> {
        match self.firing_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}
