use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{FetchPolicy, RetryPolicy};
use crate::error::FetchError;

/// Source of page and image bodies.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Throttled HTTP fetcher. Requests are spaced at least
/// `policy.request_delay` apart and retried with backoff on transient
/// failures.
pub struct HttpFetcher {
    client: reqwest::Client,
    policy: FetchPolicy,
    last_request: Mutex<Option<Instant>>,
}

impl HttpFetcher {
    pub fn new(policy: FetchPolicy) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(policy.user_agent.as_str())
            .timeout(policy.timeout)
            .gzip(true)
            .build()?;

        Ok(Self {
            client,
            policy,
            last_request: Mutex::new(None),
        })
    }

    async fn throttle(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.policy.request_delay {
                tokio::time::sleep(self.policy.request_delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.throttle().await;
        debug!("GET {}", url);

        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(transport)?;
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        with_retry(&self.policy.retry, || self.fetch_once(url)).await
    }
}

/// Runs `attempt` until it succeeds, fails for good, or `policy.max_attempts`
/// tries have been made. Only retryable failures are tried again.
pub async fn with_retry<F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<Vec<u8>, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Vec<u8>, FetchError>>,
{
    let mut tries = 1;

    loop {
        match attempt().await {
            Ok(body) => return Ok(body),
            Err(e) if e.is_retryable() && tries < policy.max_attempts => {
                let delay = policy.delay_for(tries);
                warn!(
                    "{} (attempt {}/{}), retrying in {:?}",
                    e, tries, policy.max_attempts, delay
                );
                tokio::time::sleep(delay).await;
                tries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex as StdMutex;

    /// In-memory site: known URLs return their body, everything else is a 404.
    /// Every requested URL is recorded.
    #[derive(Default)]
    pub struct StaticFetcher {
        pages: HashMap<String, Vec<u8>>,
        statuses: HashMap<String, u16>,
        requests: StdMutex<Vec<String>>,
    }

    impl StaticFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_page(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }

        pub fn with_status(mut self, url: &str, status: u16) -> Self {
            self.statuses.insert(url.to_string(), status);
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            if let Some(status) = self.statuses.get(url) {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: *status,
                });
            }
            self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
                url: url.to_string(),
                status: 404,
            })
        }
    }
}
