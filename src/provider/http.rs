//! HTTP provider gateway client.
//!
//! Talks to a provider gateway that exposes every cloud operation as
//! `POST {endpoint}/{service}/{operation}` with a JSON body of the form
//! `{"parameters": {...}}`. Successful calls answer with `{"payload": ...}`;
//! rejected operations answer with `{"error": {"message": "..."}}`.

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::ProviderConfig;
use crate::error::{ConfigError, ProviderError, Result};
use crate::plan::{ParamValue, Parameters};

use super::client::{ProviderClient, ProviderResult};

/// Provider gateway client.
#[derive(Debug, Clone)]
pub struct HttpProviderClient {
    /// HTTP client.
    client: Client,
    /// Gateway base URL without trailing slash.
    endpoint: String,
    /// Bearer token, if the gateway requires one.
    api_key: Option<String>,
    /// Maximum attempts for retryable failures.
    max_retries: u32,
    /// Base delay between attempts.
    retry_delay: Duration,
}

/// Request body.
#[derive(Debug, Serialize)]
struct InvokeRequest<'a> {
    parameters: &'a Parameters,
}

/// Response body.
#[derive(Debug, Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    payload: ParamValue,
    #[serde(default)]
    error: Option<GatewayError>,
}

/// Gateway error body.
#[derive(Debug, Deserialize)]
struct GatewayError {
    message: String,
}

/// Envelope of a non-2xx response.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: GatewayError,
}

impl HttpProviderClient {
    /// Creates a client from provider settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no endpoint is configured or the HTTP client cannot
    /// be created.
    pub fn new(config: &ProviderConfig, api_key: Option<String>) -> Result<Self> {
        let endpoint = config.endpoint.as_deref().ok_or_else(|| {
            ConfigError::validation("A provider endpoint is required", "provider.endpoint")
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries.max(1),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    /// The gateway base URL.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn operation_url(&self, service: &str, operation: &str) -> String {
        format!("{}/{service}/{operation}", self.endpoint)
    }

    /// Delay before `attempt`: the gateway's `Retry-After` hint when it gave
    /// one, linear backoff otherwise.
    fn retry_delay_after(&self, error: &ProviderError, attempt: u32) -> Duration {
        match error {
            ProviderError::RateLimited { retry_after_secs } if *retry_after_secs > 0 => {
                Duration::from_secs(*retry_after_secs)
            }
            _ => self.retry_delay * attempt,
        }
    }

    /// Executes a single request.
    async fn invoke_once(
        &self,
        service: &str,
        operation: &str,
        parameters: &Parameters,
    ) -> ProviderResult {
        let url = self.operation_url(service, operation);
        trace!("POST {url}");

        let mut request = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&InvokeRequest { parameters });
        if let Some(key) = &self.api_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::network(format!("Request failed: {e}")))?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or_default();

            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::AuthenticationFailed {
                message: String::from("Gateway rejected the API key"),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map_or(body, |envelope| envelope.error.message);
            return Err(ProviderError::api_error(status.as_u16(), message));
        }

        let body: InvokeResponse = response.json().await.map_err(|e| ProviderError::InvalidResponse {
            message: format!("Failed to parse response: {e}"),
        })?;

        if let Some(error) = body.error {
            return Err(ProviderError::failed(service, operation, error.message));
        }

        Ok(body.payload)
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn invoke(&self, service: &str, operation: &str, parameters: &Parameters) -> ProviderResult {
        let mut last_error: Option<ProviderError> = None;

        for attempt in 0..self.max_retries {
            if let Some(previous) = &last_error {
                let delay = self.retry_delay_after(previous, attempt);
                debug!(
                    "Retry attempt {attempt} of {} for {service}.{operation} in {delay:?}",
                    self.max_retries
                );
                tokio::time::sleep(delay).await;
            }

            match self.invoke_once(service, operation, parameters).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.is_retryable() => {
                    warn!("Retryable failure from {service}.{operation}: {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::network("Max retries exceeded")))
    }
}
