//! Streaming chat core for the advisor surfaces.
//!
//! The client half turns a chat function's SSE body into a growing assistant
//! message ([`driver::StreamDriver`]), shared by every chat surface through
//! [`client::ChatClient`]. The relay half ([`relay`]) is the chat function
//! itself: persona prompts plus a pass-through to the LLM gateway.

pub mod accumulator;
pub mod client;
pub mod config;
pub mod delta;
pub mod driver;
pub mod error;
pub mod frame;
pub mod prompts;
pub mod relay;
pub mod sse_codec;
pub mod types;
pub mod upstream;

pub use client::{ChatClient, ChatEndpoint};
pub use config::{ClientConfig, ConfigError, RelayConfig};
pub use driver::{ChatEvent, SnapshotSink, StreamDriver, StreamPhase, TurnOutcome};
pub use error::{ChatError, ErrorKind, RelayError};
pub use types::{ChatMessage, Role, UserContext};
