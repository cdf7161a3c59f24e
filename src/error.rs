use thiserror::Error;

/// Main error type for the execution engine
#[derive(Error, Debug)]
pub enum GovexError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Broker errors
    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    // Safety gates
    #[error("Preflight failed: {0}")]
    PreflightFailed(String),

    #[error("Long-only invariant violated: {0}")]
    DirectionViolation(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for GovexError
pub type Result<T> = std::result::Result<T, GovexError>;

/// Broker failure taxonomy.
///
/// Transient failures (rate limiting, 503, market halted) are retried by the
/// submission layer; everything else terminates the candidate immediately.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BrokerError {
    #[error("transient broker failure (status {status}): {message}")]
    Transient { status: u16, message: String },

    #[error("market halted: {0}")]
    MarketHalted(String),

    #[error("broker rejected request: {0}")]
    Permanent(String),

    #[error("order cancelled by broker: {reason}")]
    OrderCancelled { reason: String },

    #[error("invalid broker response: {0}")]
    InvalidResponse(String),

    #[error("broker transport error: {0}")]
    Transport(String),
}

impl BrokerError {
    /// Whether a retry may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Transient { .. } | BrokerError::MarketHalted(_) | BrokerError::Transport(_)
        )
    }

    pub fn is_market_halted(&self) -> bool {
        matches!(self, BrokerError::MarketHalted(_))
    }

    /// Classify an HTTP status and body returned by the broker.
    pub fn from_status(status: u16, body: &str) -> Self {
        let upper = body.to_ascii_uppercase();
        if upper.contains("MARKET_HALTED") || upper.contains("MARKET HALTED") {
            return BrokerError::MarketHalted(truncate(body, 200));
        }
        match status {
            429 | 503 => BrokerError::Transient {
                status,
                message: truncate(body, 200),
            },
            _ => BrokerError::Permanent(format!("status={} body={}", status, truncate(body, 200))),
        }
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        // Timeouts and connection resets are worth another attempt.
        if err.is_timeout() || err.is_connect() {
            BrokerError::Transport(err.to_string())
        } else {
            BrokerError::Permanent(err.to_string())
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
