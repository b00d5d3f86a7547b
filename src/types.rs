use serde::{Deserialize, Serialize};

// ================================================================================================
// CONVERSATION
// ================================================================================================

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

/// Business profile the coach call site attaches so replies can be personalised.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_size_band: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frustration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_tech: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biggest_win: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_style: Option<String>,
}

// ================================================================================================
// CHAT FUNCTION REQUESTS (CLIENT -> RELAY)
// ================================================================================================

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(
        default,
        rename = "userContext",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_context: Option<UserContext>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct GenieRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default, rename = "memoryContext")]
    pub memory_context: Option<String>,
    #[serde(default, rename = "documentContext")]
    pub document_context: Option<String>,
}

/// Error body returned by the chat functions on non-success statuses.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ErrorBody {
    pub error: String,
}

// ================================================================================================
// GATEWAY UPSTREAM (OPENAI-COMPATIBLE)
// ================================================================================================

#[derive(Serialize, Debug)]
pub struct GatewayRequest {
    pub model: String,
    pub messages: Vec<GatewayMessage>,
    pub stream: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GatewayMessage {
    pub role: String,
    pub content: String,
}

/// One streamed chat-completion chunk. Every field is optional so that
/// role-only, finish-only and foreign-shaped payloads still deserialize.
#[derive(Deserialize, Debug, Default)]
pub struct ChatChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
