//! Call sites of the shared stream driver.
//!
//! Each chat surface is just a [`ChatEndpoint`]: which function to call, the
//! bearer key, and whether to attach the member's business profile.

use std::future::Future;
use std::time::Duration;

use futures::Stream;
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::driver::{ChatEvent, SnapshotSink, StreamDriver, TurnOutcome};
use crate::error::{ChatError, GENERIC_FAILURE_MESSAGE};
use crate::types::{ChatMessage, ChatRequest, ErrorBody, UserContext};

pub const COACH_FUNCTION: &str = "ai-coach-chat";
pub const GENIE_FUNCTION: &str = "genie-chat";

#[derive(Debug, Clone)]
pub struct ChatEndpoint {
    pub url: String,
    pub bearer: String,
    pub user_context: Option<UserContext>,
}

impl ChatEndpoint {
    /// AI Coach: the coach function, personalised with the member profile.
    pub fn ai_coach(config: &ClientConfig, user_context: Option<UserContext>) -> Self {
        Self {
            url: config.function_url(COACH_FUNCTION),
            bearer: config.publishable_key.clone(),
            user_context,
        }
    }

    /// AI Genius: the coach function without a profile.
    pub fn ai_genius(config: &ClientConfig) -> Self {
        Self::ai_coach(config, None)
    }

    pub fn genie(config: &ClientConfig) -> Self {
        Self {
            url: config.function_url(GENIE_FUNCTION),
            bearer: config.publishable_key.clone(),
            user_context: None,
        }
    }
}

#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: ChatEndpoint,
    idle_timeout: Option<Duration>,
}

impl ChatClient {
    pub fn new(endpoint: ChatEndpoint) -> Self {
        Self::with_http(reqwest::Client::new(), endpoint)
    }

    pub fn with_http(http: reqwest::Client, endpoint: ChatEndpoint) -> Self {
        Self {
            http,
            endpoint,
            idle_timeout: None,
        }
    }

    /// Client for `endpoint` using the idle timeout from `config`.
    pub fn from_config(config: &ClientConfig, endpoint: ChatEndpoint) -> Self {
        Self::new(endpoint).idle_timeout(config.idle_timeout)
    }

    pub fn idle_timeout(mut self, idle_timeout: Option<Duration>) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn endpoint(&self) -> &ChatEndpoint {
        &self.endpoint
    }

    /// Runs one assistant turn for `messages` (which end with the user's new
    /// message), publishing every intermediate list to `sink`.
    pub async fn send<K: SnapshotSink>(
        &self,
        messages: Vec<ChatMessage>,
        mode: Option<&str>,
        cancel: &CancellationToken,
        sink: K,
    ) -> TurnOutcome {
        let request = ChatRequest {
            messages: messages.clone(),
            mode: mode.map(str::to_owned),
            user_context: self.endpoint.user_context.clone(),
        };
        let driver = StreamDriver::new(messages, sink);

        info!(
            url = %self.endpoint.url,
            mode = mode.unwrap_or("default"),
            messages = request.messages.len(),
            "starting chat request"
        );

        let sent = self
            .http
            .post(&self.endpoint.url)
            .bearer_auth(&self.endpoint.bearer)
            .json(&request)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return driver.cancel(),
            response = within(self.idle_timeout, sent) => response,
        };

        let response = match response {
            Some(Ok(response)) => response,
            Some(Err(err)) => return driver.fail(err.into()),
            None => return driver.fail(self.timed_out()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return driver.cancel(),
                body = within(self.idle_timeout, response.text()) => body,
            };
            let body = body.and_then(Result::ok).unwrap_or_default();
            return driver.fail(status_error(status, &body));
        }

        debug!(%status, "chat stream opened");
        driver
            .run(response.bytes_stream(), cancel, self.idle_timeout)
            .await
    }

    fn timed_out(&self) -> ChatError {
        let idle = self.idle_timeout.unwrap_or_default();
        warn!(?idle, "no response from chat function");
        ChatError::Timeout(idle)
    }

    /// Spawns [`send`](Self::send) and exposes the turn as a stream of
    /// events: snapshots first, then exactly one terminal event.
    pub fn stream_turn(
        &self,
        messages: Vec<ChatMessage>,
        mode: Option<String>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.clone();

        tokio::spawn(async move {
            let outcome = client
                .send(messages, mode.as_deref(), &cancel, tx.clone())
                .await;
            let _ = tx.send(outcome.into_event());
        });

        UnboundedReceiverStream::new(rx)
    }
}

/// `None` when `idle_timeout` elapsed before `fut` resolved.
async fn within<F: Future>(idle_timeout: Option<Duration>, fut: F) -> Option<F::Output> {
    match idle_timeout {
        Some(idle) => tokio::time::timeout(idle, fut).await.ok(),
        None => Some(fut.await),
    }
}

/// Maps a non-success status to the error the user sees.
pub fn status_error(status: StatusCode, body: &str) -> ChatError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => ChatError::RateLimited,
        StatusCode::PAYMENT_REQUIRED => ChatError::Unavailable,
        _ => {
            let message = serde_json::from_str::<ErrorBody>(body)
                .ok()
                .map(|b| b.error)
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
            ChatError::RequestFailed(message)
        }
    }
}
