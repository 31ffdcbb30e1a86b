//! AniList API client with optional rate limiting and retry logic.

use super::error::ClientError;
use super::rate_limiter::RateLimiter;
use super::transport::{GraphQlTransport, HttpTransport};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::AniListConfig;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Default GraphQL endpoint
pub const DEFAULT_BASE_URL: &str = "https://graphql.anilist.co";

/// Connection options for the HTTP transport
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// GraphQL endpoint
    pub base_url: String,
    /// OAuth token sent as a bearer token
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            timeout: Duration::from_secs(30),
        }
    }
}

impl ClientOptions {
    /// Build from the `[anilist]` section of the config file
    pub fn from_config(config: &AniListConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            token: config.token.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// AniList GraphQL client
pub struct AniListClient {
    /// Transport executing the queries
    transport: Arc<dyn GraphQlTransport>,
    /// Options used to (re)build the HTTP transport
    options: ClientOptions,
    /// Shared request budget, if any
    rate_limiter: Option<RateLimiter>,
    /// Maximum retries for retryable failures
    max_retries: u32,
    /// Base delay for retry (exponential backoff)
    retry_delay: Duration,
}

impl AniListClient {
    /// Create a client talking HTTP to `options.base_url`
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        let transport = HttpTransport::new(
            options.base_url.clone(),
            options.token.as_deref(),
            options.timeout,
        )?;

        Ok(Self {
            transport: Arc::new(transport),
            options,
            rate_limiter: None,
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
        })
    }

    /// Create a client over a custom transport
    pub fn with_transport(transport: Arc<dyn GraphQlTransport>) -> Self {
        Self {
            transport,
            options: ClientOptions::default(),
            rate_limiter: None,
            max_retries: 0,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Create a client from the `[anilist]` config section.
    ///
    /// The limiter is attached only when `rate_limit.enabled` is set.
    pub fn from_config(config: &AniListConfig) -> Result<Self, ClientError> {
        let mut client = Self::new(ClientOptions::from_config(config))?
            .with_retry(config.max_retries, Duration::from_millis(config.retry_delay_ms));

        if config.rate_limit.enabled {
            let limiter = RateLimiter::new(config.rate_limit.requests_per_minute)?;
            client = client.with_rate_limiter(limiter);
        }

        info!(
            base_url = %config.base_url,
            authenticated = config.token.is_some(),
            rate_limited = config.rate_limit.enabled,
            "AniList client created"
        );

        Ok(client)
    }

    /// Route every request through `limiter`
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Retry retryable failures up to `max_retries` times
    pub fn with_retry(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Replace the bearer token.
    ///
    /// Rebuilds the HTTP transport against the current base URL, replacing
    /// any custom transport.
    pub fn set_token(&mut self, token: impl Into<String>) -> Result<(), ClientError> {
        let token = token.into();
        let transport =
            HttpTransport::new(self.options.base_url.clone(), Some(&token), self.options.timeout)?;

        self.options.token = Some(token);
        self.transport = Arc::new(transport);
        debug!(base_url = %self.options.base_url, "Token updated");
        Ok(())
    }

    /// Attached limiter, if any
    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    /// Whether requests carry a bearer token
    pub fn is_authenticated(&self) -> bool {
        self.options.token.is_some()
    }

    /// Execute a GraphQL query and decode its `data` member into `T`.
    ///
    /// Every attempt is a separate rate-limited request.
    pub async fn raw_query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Option<Value>,
    ) -> Result<T, ClientError> {
        let query: Arc<str> = Arc::from(query);
        let variables = variables.map(Arc::new);
        let mut attempt = 0;

        loop {
            debug!(attempt = attempt + 1, "Executing GraphQL query");

            match self.execute_once(Arc::clone(&query), variables.clone()).await {
                Ok(data) => return Ok(serde_json::from_value(data)?),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self
                        .retry_delay
                        .checked_mul(2u32.saturating_pow(attempt))
                        .unwrap_or(Duration::MAX);
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Request failed, retrying after delay"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn execute_once(
        &self,
        query: Arc<str>,
        variables: Option<Arc<Value>>,
    ) -> Result<Value, ClientError> {
        let transport = Arc::clone(&self.transport);
        let operation =
            move || async move { transport.execute(&query, variables.as_deref()).await };

        match &self.rate_limiter {
            Some(limiter) => limiter.submit(operation).await,
            None => operation().await,
        }
    }
}

impl fmt::Debug for AniListClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AniListClient")
            .field("base_url", &self.options.base_url)
            .field("authenticated", &self.is_authenticated())
            .field("rate_limiter", &self.rate_limiter)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
