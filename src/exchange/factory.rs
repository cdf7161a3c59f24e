use std::sync::Arc;
use std::time::Duration;

use crate::adapters::OandaClient;
use crate::config::AppConfig;
use crate::error::{GovexError, Result};

use super::BrokerClient;

/// Create the broker client from `AppConfig`.
///
/// The token may come from config or `GOVEX_BROKER__API_TOKEN`; the
/// environment (paper/live) is taken from `execution.environment`.
pub fn build_broker_client(app_config: &AppConfig) -> Result<Arc<dyn BrokerClient>> {
    let token = app_config
        .broker
        .api_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            GovexError::Validation(
                "broker.api_token is required (set GOVEX_BROKER__API_TOKEN)".to_string(),
            )
        })?;

    let client = OandaClient::new(
        &app_config.broker.base_url,
        &app_config.broker.account_id,
        token,
        app_config.execution.environment,
        Duration::from_secs(app_config.broker.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Environment;

    #[test]
    fn missing_token_is_a_validation_error() {
        let cfg = AppConfig::default_config();
        assert!(matches!(
            build_broker_client(&cfg),
            Err(GovexError::Validation(_))
        ));
    }

    #[test]
    fn client_reports_configured_environment() {
        let mut cfg = AppConfig::default_config();
        cfg.broker.api_token = Some("test-token".into());
        cfg.execution.environment = Environment::Live;
        let client = build_broker_client(&cfg).unwrap();
        assert_eq!(client.environment(), Environment::Live);
    }
}
