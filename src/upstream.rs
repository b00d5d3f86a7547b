use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use reqwest::StatusCode;
use tracing::{debug, error, info, warn};

use crate::error::RelayError;
use crate::prompts::Persona;
use crate::relay::RelayState;
use crate::types::{ChatMessage, GatewayMessage, GatewayRequest, Role};

pub fn build_gateway_messages(system_prompt: String, input: Vec<ChatMessage>) -> Vec<GatewayMessage> {
    let mut messages = Vec::with_capacity(input.len() + 1);
    messages.push(GatewayMessage {
        role: "system".to_string(),
        content: system_prompt,
    });

    for message in input {
        let role = match message.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        messages.push(GatewayMessage {
            role: role.to_string(),
            content: message.content,
        });
    }
    messages
}

/// Sends the conversation to the gateway and streams its SSE body back
/// unchanged.
pub async fn forward(
    state: &RelayState,
    persona: &'static Persona,
    system_prompt: String,
    input: Vec<ChatMessage>,
) -> Result<Response, RelayError> {
    let api_key = state
        .config
        .gateway_api_key
        .as_deref()
        .ok_or(RelayError::MissingApiKey)?;

    let request = GatewayRequest {
        model: state.config.model.clone(),
        messages: build_gateway_messages(system_prompt, input),
        stream: true,
    };

    let response = state
        .http
        .post(&state.config.gateway_url)
        .bearer_auth(api_key)
        .json(&request)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        error!(persona = persona.name, %status, body = %error_text, "gateway error");
        return Err(match status {
            StatusCode::TOO_MANY_REQUESTS => RelayError::RateLimited(persona.rate_limited_message),
            StatusCode::PAYMENT_REQUIRED => RelayError::QuotaExhausted(persona.quota_message),
            _ => RelayError::Unavailable(persona.unavailable_message),
        });
    }

    info!(persona = persona.name, "streaming response started");

    let upstream = response.bytes_stream();
    let body = async_stream::stream! {
        futures::pin_mut!(upstream);
        let mut relayed = 0usize;
        while let Some(chunk) = upstream.next().await {
            match chunk {
                Ok(bytes) => {
                    relayed += bytes.len();
                    yield Ok(bytes);
                }
                Err(e) => {
                    warn!(persona = persona.name, "gateway stream interrupted: {}", e);
                    yield Err(e);
                    break;
                }
            }
        }
        debug!(persona = persona.name, bytes = relayed, "relay stream finished");
    };

    Ok((
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(body),
    )
        .into_response())
}
