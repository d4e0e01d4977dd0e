//! Wire types for the OpenAI-compatible chat-completions API and the client
//! that speaks it.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod client;
pub mod error;
pub mod models;
pub mod sse;

pub use client::{ChatApiClient, CompletionStream};
pub use error::ApiError;

pub const DEFAULT_MODEL: &str = "Qwen/Qwen2.5-72B-Instruct";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 512;
/// Connect timeout for the HTTP client built by the binary.
pub const API_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Request body for `/v1/chat/completions`.
///
/// Optional sampling parameters are omitted from the JSON entirely when
/// unset so providers apply their own defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<FunctionTool>>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            stream: false,
            frequency_penalty: None,
            n: None,
            response_format: None,
            stop: None,
            top_k: None,
            top_p: None,
            tools: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionChoice {
    pub message: ChatMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub model: String,
    #[serde(default)]
    pub created: u64,
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, which is all a single-`n` request produces.
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .map(|choice| choice.message.content.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatResponseDelta {
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseChoice {
    #[serde(default)]
    pub delta: ChatResponseDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// One `data:` payload of a streamed completion.
#[derive(Debug, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub choices: Vec<ChatResponseChoice>,
    #[serde(default)]
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Text,
    Image,
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelSubType {
    Chat,
    Embedding,
    Reranker,
    TextToImage,
    ImageToImage,
    SpeechToText,
    TextToVideo,
}

impl ModelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelType::Text => "text",
            ModelType::Image => "image",
            ModelType::Audio => "audio",
            ModelType::Video => "video",
        }
    }
}

impl FromStr for ModelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            ModelType::Text,
            ModelType::Image,
            ModelType::Audio,
            ModelType::Video,
        ]
        .into_iter()
        .find(|candidate| candidate.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("unknown model type '{s}' (expected text, image, audio or video)"))
    }
}

impl ModelSubType {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelSubType::Chat => "chat",
            ModelSubType::Embedding => "embedding",
            ModelSubType::Reranker => "reranker",
            ModelSubType::TextToImage => "text-to-image",
            ModelSubType::ImageToImage => "image-to-image",
            ModelSubType::SpeechToText => "speech-to-text",
            ModelSubType::TextToVideo => "text-to-video",
        }
    }
}

impl FromStr for ModelSubType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            ModelSubType::Chat,
            ModelSubType::Embedding,
            ModelSubType::Reranker,
            ModelSubType::TextToImage,
            ModelSubType::ImageToImage,
            ModelSubType::SpeechToText,
            ModelSubType::TextToVideo,
        ]
        .into_iter()
        .find(|candidate| candidate.as_str().eq_ignore_ascii_case(s.trim()))
        .ok_or_else(|| format!("unknown model sub-type '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub created: Option<u64>,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub object: Option<String>,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserInfo {
    pub id: String,
    pub name: String,
    pub email: String,
    pub image: String,
    pub introduction: String,
    pub role: String,
    pub status: String,
    pub is_admin: bool,
    pub balance: String,
    pub charge_balance: String,
    pub total_balance: String,
}

/// Application envelope returned by `/v1/user/info`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserResponse {
    pub code: i64,
    pub status: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<UserInfo>,
}
