//! Remote wiki platform API: existence check and bootstrap.

use std::env;
use std::thread::sleep;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use reqwest::StatusCode;
use reqwest::blocking::Client;

use crate::error::{Result, SyncError};

pub const DEFAULT_USER_AGENT: &str = "wikipub/0.1";

/// The wiki platform collaborator. Existence check and bootstrap only; page
/// content always travels through the repository clone, never this API.
pub trait WikiHost {
    /// Does the wiki for this project exist?
    fn wiki_exists(&mut self) -> Result<bool>;
    /// Create the wiki with a single landing page. Invoked only when
    /// [`wiki_exists`](Self::wiki_exists) reported false.
    fn bootstrap(&mut self, landing_title: &str, landing_content: &str) -> Result<()>;
    fn request_count(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct WikiHostConfig {
    pub api_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl WikiHostConfig {
    pub fn new(api_url: &str, user_agent: &str) -> Self {
        Self {
            api_url: api_url.to_string(),
            user_agent: user_agent.to_string(),
            timeout_ms: env_value_u64("WIKIPUB_HTTP_TIMEOUT_MS", 30_000),
            max_retries: env_value_usize("WIKIPUB_HTTP_RETRIES", 2),
            retry_delay_ms: env_value_u64("WIKIPUB_HTTP_RETRY_DELAY_MS", 500),
        }
    }
}

pub struct HttpWikiHost {
    client: Client,
    config: WikiHostConfig,
    token: Option<String>,
    request_count: usize,
}

impl HttpWikiHost {
    pub fn new(config: WikiHostConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|error| {
                SyncError::RemoteUnavailable(format!("failed to build wiki HTTP client: {error}"))
            })?;

        Ok(Self {
            client,
            config,
            token: env::var(crate::vcs::TOKEN_ENV_VAR)
                .ok()
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty()),
            request_count: 0,
        })
    }

    fn send_with_retry<F>(&mut self, describe: &str, send: F) -> Result<reqwest::blocking::Response>
    where
        F: Fn(&Client, Option<&str>) -> reqwest::Result<reqwest::blocking::Response>,
    {
        let started = Instant::now();
        for attempt in 0..=self.config.max_retries {
            self.request_count += 1;
            match send(&self.client, self.token.as_deref()) {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() || status == StatusCode::NOT_FOUND {
                        return Ok(response);
                    }
                    if attempt < self.config.max_retries && is_retryable_status(status) {
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(SyncError::RemoteUnavailable(format!(
                        "{describe} failed with HTTP {status}"
                    )));
                }
                Err(error) => {
                    if attempt < self.config.max_retries && (error.is_timeout() || error.is_connect())
                    {
                        self.wait_before_retry(attempt);
                        continue;
                    }
                    return Err(SyncError::RemoteUnavailable(format!("{describe}: {error}")));
                }
            }
        }
        Err(SyncError::RemoteUnavailable(format!(
            "{describe} exhausted retry budget after {:?}",
            started.elapsed()
        )))
    }

    fn wait_before_retry(&self, attempt: usize) {
        let exponent = u32::try_from(attempt).unwrap_or(16);
        let base = self
            .config
            .retry_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent));
        let jitter = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| u64::from(duration.subsec_millis() % 100))
            .unwrap_or(0);
        sleep(Duration::from_millis(base.saturating_add(jitter)));
    }
}

impl WikiHost for HttpWikiHost {
    fn wiki_exists(&mut self) -> Result<bool> {
        let url = self.config.api_url.clone();
        let user_agent = self.config.user_agent.clone();
        let response = self.send_with_retry("wiki existence check", move |client, token| {
            let mut request = client.get(&url).header("User-Agent", user_agent.clone());
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            request.send()
        })?;
        Ok(response.status() != StatusCode::NOT_FOUND)
    }

    fn bootstrap(&mut self, landing_title: &str, landing_content: &str) -> Result<()> {
        let url = self.config.api_url.clone();
        let user_agent = self.config.user_agent.clone();
        let body = serde_json::json!({
            "landing_page": {
                "title": landing_title,
                "content": landing_content,
            }
        });
        let response = self.send_with_retry("wiki bootstrap", move |client, token| {
            let mut request = client
                .post(&url)
                .header("User-Agent", user_agent.clone())
                .json(&body);
            if let Some(token) = token {
                request = request.bearer_auth(token);
            }
            request.send()
        })?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(SyncError::RemoteUnavailable(
                "wiki bootstrap endpoint not found".to_string(),
            ));
        }
        Ok(())
    }

    fn request_count(&self) -> usize {
        self.request_count
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn env_value_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

fn env_value_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
