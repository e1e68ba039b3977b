//! Retrying request helper shared by every HTTP collaborator client.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use flare_core::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_error,
};
use serde::de::DeserializeOwned;
use tracing::debug;

const RETRY_ATTEMPT_HEADER: &str = "x-flare-retry-attempt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Timeout and retry knobs for one HTTP client.
pub struct HttpClientSettings {
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for HttpClientSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
        }
    }
}

#[derive(Clone)]
pub(crate) struct RetryingHttpClient {
    service: &'static str,
    http: reqwest::Client,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl RetryingHttpClient {
    pub(crate) fn new(
        service: &'static str,
        user_agent: &'static str,
        settings: HttpClientSettings,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static(user_agent),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(settings.request_timeout_ms.max(1)))
            .build()
            .with_context(|| format!("failed to create {service} api client"))?;
        Ok(Self {
            service,
            http,
            retry_max_attempts: settings.retry_max_attempts.max(1),
            retry_base_delay_ms: settings.retry_base_delay_ms.max(1),
        })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) async fn request_json<T, F>(&self, operation: &str, builder: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, builder).await?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("failed to decode {} {operation}", self.service))
    }

    pub(crate) async fn request_text<F>(&self, operation: &str, builder: F) -> Result<String>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let response = self.send_with_retry(operation, builder).await?;
        response
            .text()
            .await
            .with_context(|| format!("failed to read {} {operation} body", self.service))
    }

    pub(crate) async fn request_empty<F>(&self, operation: &str, builder: F) -> Result<()>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        self.send_with_retry(operation, builder).await.map(|_| ())
    }

    /// Sends until a success status, a non-retryable failure or the attempt budget runs out.
    async fn send_with_retry<F>(
        &self,
        operation: &str,
        mut builder: F,
    ) -> Result<reqwest::Response>
    where
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts && is_retryable_status(status.as_u16()) {
                        debug!(
                            service = self.service,
                            operation,
                            attempt,
                            status = status.as_u16(),
                            "http-retry-scheduled"
                        );
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }
                    bail!(
                        "{} api {operation} failed with status {}: {}",
                        self.service,
                        status.as_u16(),
                        truncate_for_error(&body, 800)
                    );
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(error).with_context(|| {
                        format!("{} api {operation} request failed", self.service)
                    });
                }
            }
        }
    }
}
