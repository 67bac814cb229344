use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::{Conversation, ToolCall, ToolDeclaration};
use crate::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFormat {
    pub json_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model: String,
    pub conversation: Conversation,
    pub response_format: ResponseFormat,
    #[serde(default)]
    pub tools: Vec<ToolDeclaration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub text: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl InferenceResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            text: String::new(),
            tool_calls,
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A large-language-model endpoint that takes a conversation and answers with
/// text and/or tool-call requests.
#[async_trait]
pub trait InferenceService: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse>;
}
