//! Conversational assistant
//!
//! A prompt is classified into an [`Intent`] by an [`Assistant`] backend and
//! then executed by the [`IntentRouter`] against the business services.

pub mod intent;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::service::approval::CreateApprovalRequest;
use crate::service::todo::CreateTodoRequest;

pub use intent::IntentRouter;
pub use openai::OpenAiAssistant;

/// Kind of answer carried by a [`ChatResp`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiChatType {
    Default,
    TodoFind,
    TodoAdd,
    ApprovalFind,
    ChatLog,
    ApprovalAdd,
}

impl AiChatType {
    pub fn code(&self) -> u8 {
        match self {
            AiChatType::Default => 0,
            AiChatType::TodoFind => 1,
            AiChatType::TodoAdd => 2,
            AiChatType::ApprovalFind => 3,
            AiChatType::ChatLog => 4,
            AiChatType::ApprovalAdd => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(AiChatType::Default),
            1 => Some(AiChatType::TodoFind),
            2 => Some(AiChatType::TodoAdd),
            3 => Some(AiChatType::ApprovalFind),
            4 => Some(AiChatType::ChatLog),
            5 => Some(AiChatType::ApprovalAdd),
            _ => None,
        }
    }
}

impl Serialize for AiChatType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for AiChatType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = u8::deserialize(deserializer)?;
        AiChatType::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown chat type {}", code)))
    }
}

/// Body of `POST /v1/chat`
#[derive(Debug, Deserialize)]
pub struct ChatReq {
    #[serde(default)]
    pub prompts: String,
    /// `ChatLog` skips classification and summarizes the conversation
    #[serde(rename = "chatType", default)]
    pub chat_type: Option<AiChatType>,
    /// Conversation to summarize
    #[serde(rename = "relationId", default)]
    pub relation_id: String,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<i64>,
    #[serde(rename = "endTime", default)]
    pub end_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatResp {
    #[serde(rename = "chatType")]
    pub chat_type: AiChatType,
    pub data: serde_json::Value,
}

impl ChatResp {
    pub fn new(chat_type: AiChatType, data: impl Serialize) -> AppResult<Self> {
        Ok(Self {
            chat_type,
            data: serde_json::to_value(data)?,
        })
    }

    pub fn reply(text: impl Into<String>) -> Self {
        Self {
            chat_type: AiChatType::Default,
            data: serde_json::Value::String(text.into()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TodoFindArgs {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "startTime", default)]
    pub start_time: Option<i64>,
    #[serde(rename = "endTime", default)]
    pub end_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApprovalFindArgs {
    #[serde(default)]
    pub id: Option<String>,
    /// 1 = submitted by me, 2 = awaiting my audit
    #[serde(rename = "type", default)]
    pub list_type: Option<u8>,
}

/// What the user asked for, with the arguments extracted from the prompt
#[derive(Debug, Deserialize)]
#[serde(tag = "intent", content = "args", rename_all = "snake_case")]
pub enum Intent {
    TodoAdd(CreateTodoRequest),
    TodoFind(TodoFindArgs),
    ApprovalAdd(CreateApprovalRequest),
    ApprovalFind(ApprovalFindArgs),
    ChatLog,
    Reply(String),
}

/// Handler key of an intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntentKind {
    TodoAdd,
    TodoFind,
    ApprovalAdd,
    ApprovalFind,
    ChatLog,
    Reply,
}

impl Intent {
    pub fn kind(&self) -> IntentKind {
        match self {
            Intent::TodoAdd(_) => IntentKind::TodoAdd,
            Intent::TodoFind(_) => IntentKind::TodoFind,
            Intent::ApprovalAdd(_) => IntentKind::ApprovalAdd,
            Intent::ApprovalFind(_) => IntentKind::ApprovalFind,
            Intent::ChatLog => IntentKind::ChatLog,
            Intent::Reply(_) => IntentKind::Reply,
        }
    }
}

/// Language model backend
#[async_trait]
pub trait Assistant: Send + Sync {
    /// Classify `prompt`; `now` lets relative dates resolve to unix seconds
    async fn classify(&self, prompt: &str, now: i64) -> AppResult<Intent>;

    async fn summarize(&self, transcript: &str) -> AppResult<String>;
}

/// Backend used when no assistant endpoint is configured
pub struct DisabledAssistant;

#[async_trait]
impl Assistant for DisabledAssistant {
    async fn classify(&self, _prompt: &str, _now: i64) -> AppResult<Intent> {
        Err(AppError::Upstream("assistant is not configured".to_string()))
    }

    async fn summarize(&self, _transcript: &str) -> AppResult<String> {
        Err(AppError::Upstream("assistant is not configured".to_string()))
    }
}

/// Parse an intent out of model output, which may wrap the JSON object in
/// prose or a code fence
pub fn parse_intent(output: &str) -> Intent {
    let object = match (output.find('{'), output.rfind('}')) {
        (Some(start), Some(end)) if start < end => &output[start..=end],
        _ => return Intent::Reply(output.trim().to_string()),
    };
    match serde_json::from_str(object) {
        Ok(intent) => intent,
        Err(e) => {
            tracing::debug!("Assistant output is not an intent: {}", e);
            Intent::Reply(output.trim().to_string())
        }
    }
}
