use chrono::{DateTime, TimeZone, Utc};
use config::{Config, ConfigError, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

use crate::domain::Environment;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub broker: BrokerConfig,
    pub database: DatabaseConfig,
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub preflight: PreflightConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// REST endpoint (practice or live host)
    pub base_url: String,
    pub account_id: String,
    /// Bearer token; usually supplied via GOVEX_BROKER__API_TOKEN
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub environment: Environment,
    /// Instruments candidates are drawn from
    pub pairs: Vec<String>,
    /// Hard cap on candidates per tick, on top of the session density
    #[serde(default = "default_max_candidates")]
    pub max_candidates: u32,
    /// Delay between broker submissions within one tick
    #[serde(default = "default_submit_delay")]
    pub submit_delay_ms: u64,
    /// Retries for transient broker errors (attempts = retries + 1)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Backoff unit; attempt n waits n * retry_backoff_ms
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// A pair filled within this window is not traded again
    #[serde(default = "default_dedup_window")]
    pub dedup_window_secs: i64,
    /// Used for sizing when the account summary cannot be fetched
    #[serde(default = "default_fallback_balance")]
    pub fallback_balance: Decimal,
    #[serde(default = "default_price_cache_ttl")]
    pub price_cache_ttl_secs: u64,
    /// Trailing ledger rows loaded per tick
    #[serde(default = "default_history_limit")]
    pub history_limit: i64,
    /// Closed trades requested from the broker for reconciliation
    #[serde(default = "default_reconcile_limit")]
    pub reconcile_limit: u32,
    /// Fixed seed for agent/pair selection (unset = entropy)
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

fn default_max_candidates() -> u32 {
    6
}

fn default_submit_delay() -> u64 {
    250
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    500
}

fn default_dedup_window() -> i64 {
    120
}

fn default_fallback_balance() -> Decimal {
    Decimal::new(100_000, 0)
}

fn default_price_cache_ttl() -> u64 {
    15
}

fn default_history_limit() -> i64 {
    500
}

fn default_reconcile_limit() -> u32 {
    50
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Paper,
            pairs: ["EUR_USD", "GBP_USD", "USD_JPY", "AUD_USD", "USD_CAD"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            max_candidates: default_max_candidates(),
            submit_delay_ms: default_submit_delay(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            dedup_window_secs: default_dedup_window(),
            fallback_balance: default_fallback_balance(),
            price_cache_ttl_secs: default_price_cache_ttl(),
            history_limit: default_history_limit(),
            reconcile_limit: default_reconcile_limit(),
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentsConfig {
    /// Agents expected to be trading; agents without history still count
    #[serde(default)]
    pub roster: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default)]
    pub blocked_agents: Vec<String>,
    /// Spread above this many pips blocks the candidate
    #[serde(default = "default_max_spread_pips")]
    pub max_spread_pips: f64,
}

fn default_max_spread_pips() -> f64 {
    3.0
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            blocked_agents: Vec::new(),
            max_spread_pips: default_max_spread_pips(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PreflightConfig {
    /// No short fills may exist after this instant
    #[serde(default = "default_long_only_cutover")]
    pub long_only_cutover: DateTime<Utc>,
}

fn default_long_only_cutover() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

impl Default for PreflightConfig {
    fn default() -> Self {
        Self {
            long_only_cutover: default_long_only_cutover(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory for daily rolling log files
    #[serde(default)]
    pub dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bearer token required on POST /api/execute; unset leaves it open
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_token: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default values
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            .set_default("database.max_connections", 5)?
            .set_default("execution.environment", "paper")?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("GOVEX_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (GOVEX_BROKER__API_TOKEN, etc.)
            .add_source(
                config::Environment::with_prefix("GOVEX")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("execution.pairs")
                    .with_list_parse_key("agents.roster")
                    .with_list_parse_key("discovery.blocked_agents")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Paper-trading configuration used by tests and `--dry-run` style CLI runs
    pub fn default_config() -> Self {
        Self {
            broker: BrokerConfig {
                base_url: "https://api-fxpractice.oanda.com".to_string(),
                account_id: "000-000-0000000-000".to_string(),
                api_token: None,
                request_timeout_secs: default_request_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/govex".to_string(),
                max_connections: default_max_connections(),
            },
            execution: ExecutionConfig::default(),
            agents: AgentsConfig {
                roster: vec![
                    "momentum-1".to_string(),
                    "breakout-2".to_string(),
                    "meanrev-3".to_string(),
                ],
            },
            discovery: DiscoveryConfig::default(),
            preflight: PreflightConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.broker.base_url.trim().is_empty() {
            errors.push("broker.base_url must be set".to_string());
        }
        if self.broker.account_id.trim().is_empty() {
            errors.push("broker.account_id must be set".to_string());
        }
        if self.execution.environment.is_live() && self.broker.api_token.is_none() {
            errors.push("broker.api_token is required for the live environment".to_string());
        }

        if self.execution.pairs.is_empty() {
            errors.push("execution.pairs must list at least one instrument".to_string());
        }
        for pair in &self.execution.pairs {
            if pair.split('_').count() != 2 {
                errors.push(format!("execution.pairs: '{pair}' is not BASE_QUOTE"));
            }
        }
        if self.execution.max_candidates == 0 {
            errors.push("execution.max_candidates must be positive".to_string());
        }
        if self.execution.dedup_window_secs < 0 {
            errors.push("execution.dedup_window_secs must not be negative".to_string());
        }
        if self.execution.fallback_balance <= Decimal::ZERO {
            errors.push("execution.fallback_balance must be positive".to_string());
        }
        if self.execution.history_limit <= 0 {
            errors.push("execution.history_limit must be positive".to_string());
        }

        if self.discovery.max_spread_pips <= 0.0 {
            errors.push("discovery.max_spread_pips must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
