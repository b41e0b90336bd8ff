//! OpenRouter chat-completion transport
//!
//! This module implements the ChatTransport trait for the OpenRouter
//! `/chat/completions` endpoint using reqwest.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use super::client::{ChatTransport, TransportError};
use super::types::{ChatRequest, HttpReply};
use crate::error::{CritiqueError, Result};

/// OpenRouter chat-completion endpoint
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Environment variable holding the bearer credential
pub const DEFAULT_API_KEY_ENV: &str = "OPENROUTER_API_KEY";

/// Referer OpenRouter uses to attribute traffic
pub const DEFAULT_REFERER: &str = "http://localhost:8000";

/// Configuration for the OpenRouter client
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub referer: String,
    pub timeout: Duration,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

/// OpenRouter API client
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    config: OpenRouterConfig,
}

impl OpenRouterClient {
    /// Create a new client, reading the API key from `config.api_key_env`.
    ///
    /// A missing or empty key is a configuration error; nothing touches the
    /// network before this check.
    pub fn new(config: OpenRouterConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                CritiqueError::Configuration(format!("{} environment variable is not set", config.api_key_env))
            })?;

        Self::with_api_key(api_key, config)
    }

    /// Create a client with an explicit API key
    pub fn with_api_key(api_key: String, config: OpenRouterConfig) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(CritiqueError::Configuration("API key is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CritiqueError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, api_key, config })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl ChatTransport for OpenRouterClient {
    async fn send(&self, request: &ChatRequest) -> std::result::Result<HttpReply, TransportError> {
        debug!("POST {} model={}", self.config.base_url, request.model);

        let response = self
            .client
            .post(&self.config.base_url)
            .bearer_auth(&self.api_key)
            .header("HTTP-Referer", &self.config.referer)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(HttpReply { status, body })
    }
}

// Keep the API key out of debug output
impl std::fmt::Debug for OpenRouterClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterClient")
            .field("base_url", &self.config.base_url)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = OpenRouterConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_key_env, "OPENROUTER_API_KEY");
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_client_without_api_key() {
        let config = OpenRouterConfig {
            api_key_env: "CRITIQUER_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };

        let result = OpenRouterClient::new(config);
        match result {
            Err(CritiqueError::Configuration(msg)) => {
                assert!(msg.contains("CRITIQUER_TEST_KEY_THAT_IS_NEVER_SET"));
            }
            other => panic!("expected configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_client_with_api_key() {
        let client = OpenRouterClient::with_api_key("test-key".to_string(), OpenRouterConfig::default()).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = OpenRouterClient::with_api_key("   ".to_string(), OpenRouterConfig::default());
        assert!(matches!(result, Err(CritiqueError::Configuration(_))));
    }

    #[test]
    fn test_debug_impl_hides_key() {
        let client = OpenRouterClient::with_api_key("secret-key".to_string(), OpenRouterConfig::default()).unwrap();
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("OpenRouterClient"));
        assert!(!debug_str.contains("secret-key"));
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<OpenRouterClient>();
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let config = OpenRouterConfig {
            base_url: "http://127.0.0.1:9/chat/completions".to_string(),
            timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let client = OpenRouterClient::with_api_key("k".to_string(), config).unwrap();
        let request = ChatRequest::new("m", vec![crate::llm::Message::user("hi")]);

        assert!(client.send(&request).await.is_err());
    }
}
