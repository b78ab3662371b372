use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

/// Errors that can occur when calling the LLM provider
///
/// All of these are degradations: the caller falls back to the
/// deterministic explanation and none of them reach the response path.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),
}

/// Shared rate-limiter state for the LLM provider
///
/// The one piece of genuinely shared mutable state in the pipeline: all
/// concurrent requests funnel their provider calls through one instance.
/// The semaphore bounds in-flight calls with FIFO waiting; the window state
/// tracks what the provider's rate-limit headers last told us.
pub struct RateLimiter {
    permits: Semaphore,
    state: Mutex<RateLimitWindow>,
}

#[derive(Debug, Default)]
struct RateLimitWindow {
    remaining: Option<u32>,
    reset_at: Option<Instant>,
    limited_until: Option<Instant>,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Semaphore::new(max_concurrent.max(1)),
            state: Mutex::new(RateLimitWindow::default()),
        }
    }

    /// Whether callers should skip the provider right now. True while a 429
    /// backoff is pending or the advertised quota is exhausted; checking
    /// never blocks beyond the state lock.
    pub async fn is_limited(&self) -> bool {
        let state = self.state.lock().await;
        let now = Instant::now();
        if state.limited_until.is_some_and(|until| until > now) {
            return true;
        }
        state.remaining == Some(0) && state.reset_at.is_some_and(|reset| reset > now)
    }

    /// Acquire an in-flight slot; excess callers queue FIFO.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>, LlmError> {
        self.permits.acquire().await.map_err(|e| LlmError::ApiError {
            status: 0,
            message: format!("Rate limiter error: {}", e),
        })
    }

    /// Fold the provider's quota headers into the window state.
    pub async fn record_headers(&self, remaining: Option<u32>, reset_secs: Option<f64>) {
        let mut state = self.state.lock().await;
        if remaining.is_some() {
            state.remaining = remaining;
        }
        if let Some(secs) = reset_secs {
            if secs.is_finite() && secs >= 0.0 {
                state.reset_at = Some(Instant::now() + Duration::from_secs_f64(secs));
            }
        }
    }

    /// A 429 sets the limited flag until the indicated reset time.
    pub async fn record_rate_limited(&self, retry_after_secs: u64) {
        let mut state = self.state.lock().await;
        state.limited_until = Some(Instant::now() + Duration::from_secs(retry_after_secs));
        state.remaining = Some(0);
        tracing::warn!(
            "LLM provider rate limited, backing off {}s",
            retry_after_secs
        );
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Chat-completions client for the explanation provider
///
/// Every call acquires a slot from the injected [`RateLimiter`], runs under
/// an explicit deadline, and feeds rate-limit headers back into the shared
/// window state.
pub struct LlmClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    limiter: Arc<RateLimiter>,
}

impl LlmClient {
    pub fn new(
        base_url: String,
        api_key: String,
        model: String,
        temperature: f32,
        max_tokens: u32,
        timeout_secs: u64,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1) + 5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            api_key,
            model,
            temperature,
            max_tokens,
            timeout: Duration::from_secs(timeout_secs.max(1)),
            limiter,
        }
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        Arc::clone(&self.limiter)
    }

    /// Run one chat completion and return the first choice's content.
    ///
    /// A timeout counts as a plain failure; a 429 records the backoff in
    /// the shared limiter before surfacing as [`LlmError::RateLimited`].
    pub async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, LlmError> {
        let _permit = self.limiter.acquire().await?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let request = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send();

        let response = match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result?,
            Err(_) => return Err(LlmError::Timeout(self.timeout)),
        };

        let status = response.status();
        let remaining = header_u32(response.headers(), "x-ratelimit-remaining");
        let reset_secs = header_f64(response.headers(), "x-ratelimit-reset");
        let retry_after = header_f64(response.headers(), "retry-after");

        self.limiter.record_headers(remaining, reset_secs).await;

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = retry_after.or(reset_secs).unwrap_or(60.0).ceil() as u64;
            self.limiter.record_rate_limited(retry_after_secs).await;
            return Err(LlmError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| LlmError::InvalidResponse("Empty choices array".to_string()))
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

fn header_u32(headers: &reqwest::header::HeaderMap, name: &str) -> Option<u32> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn header_f64(headers: &reqwest::header::HeaderMap, name: &str) -> Option<f64> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}
