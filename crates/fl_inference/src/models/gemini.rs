use std::fmt;

use async_trait::async_trait;
use fl_core::{
    ConversationTurn, Error, InferenceRequest, InferenceResponse, InferenceService, Result,
    ToolCall, ToolDeclaration,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};
use url::Url;

use crate::InferenceConfig;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool<'a> {
    function_declarations: &'a [ToolDeclaration],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    role: String,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
    #[serde(default, skip_serializing)]
    thought: bool,
}

#[derive(Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Map<String, Value>,
}

#[derive(Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            ..Self::default()
        }
    }
}

impl From<&ConversationTurn> for Content {
    fn from(turn: &ConversationTurn) -> Self {
        match turn {
            ConversationTurn::User { parts } => Content {
                role: "user".to_string(),
                parts: parts.iter().cloned().map(Part::text).collect(),
            },
            ConversationTurn::Model { text, tool_calls } => {
                let mut parts: Vec<Part> = text.iter().cloned().map(Part::text).collect();
                parts.extend(tool_calls.iter().map(|call| Part {
                    function_call: Some(FunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Part::default()
                }));
                Content {
                    role: "model".to_string(),
                    parts,
                }
            }
            ConversationTurn::ToolResult { name, payload } => Content {
                role: "user".to_string(),
                parts: vec![Part {
                    function_response: Some(FunctionResponse {
                        name: name.clone(),
                        response: payload.clone(),
                    }),
                    ..Part::default()
                }],
            },
        }
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiModel {
    client: Client,
    api_key: String,
    base_url: Url,
}

impl fmt::Debug for GeminiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiModel")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl GeminiModel {
    pub fn new(config: &InferenceConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| Error::Inference("Gemini API key is required".to_string()))?;
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            Error::Validation(format!("invalid inference URL {}: {}", config.base_url, e))
        })?;
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            api_key,
            base_url,
        })
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl InferenceService for GeminiModel {
    fn name(&self) -> &str {
        "Gemini"
    }

    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        let body = GenerateContentRequest {
            contents: request.conversation.turns().iter().map(Content::from).collect(),
            tools: if request.tools.is_empty() {
                Vec::new()
            } else {
                vec![Tool {
                    function_declarations: &request.tools,
                }]
            },
            generation_config: request.response_format.json_only.then(|| GenerationConfig {
                response_mime_type: "application/json".to_string(),
            }),
        };

        debug!(
            "Calling {} with {} turns and {} tools",
            request.model,
            body.contents.len(),
            request.tools.len()
        );
        let response = self
            .client
            .post(self.endpoint(&request.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Inference(format!(
                "{} returned {}: {}",
                request.model, status, body
            )));
        }

        let parsed = response.json::<GenerateContentResponse>().await?;
        let Some(candidate) = parsed.candidates.into_iter().next() else {
            warn!("{} returned no candidates", request.model);
            return Ok(InferenceResponse::default());
        };

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.parts {
            if part.thought {
                continue;
            }
            if let Some(fragment) = part.text {
                text.push_str(&fragment);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall::new(call.name, call.args));
            }
        }

        Ok(InferenceResponse { text, tool_calls })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fl_core::{Conversation, ResponseFormat};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> InferenceConfig {
        InferenceConfig {
            api_key: Some("test-key".to_string()),
            base_url,
            ..InferenceConfig::default()
        }
    }

    #[test]
    fn test_model_requires_api_key() {
        let result = GeminiModel::new(&InferenceConfig::default());
        assert!(result.is_err());

        let result = GeminiModel::new(&config("https://example.com/v1beta".to_string()));
        assert!(result.is_ok());
    }

    #[test]
    fn test_turns_map_to_gemini_contents() {
        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::user(["do it", "{}"]));
        let mut args = Map::new();
        args.insert("query".to_string(), json!("q"));
        conversation.push_tool_exchange(ToolCall::new("web_search", args), json!({"results": []}));

        let contents: Vec<Content> = conversation.turns().iter().map(Content::from).collect();
        let value = serde_json::to_value(&contents).unwrap();
        assert_eq!(
            value,
            json!([
                {"role": "user", "parts": [{"text": "do it"}, {"text": "{}"}]},
                {"role": "model", "parts": [{"functionCall": {"name": "web_search", "args": {"query": "q"}}}]},
                {"role": "user", "parts": [{"functionResponse": {"name": "web_search", "response": {"results": []}}}]}
            ])
        );
    }

    #[tokio::test]
    async fn test_generate_reads_text_and_tool_calls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-test:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "generationConfig": {"responseMimeType": "application/json"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [
                            {"text": "thinking...", "thought": true},
                            {"text": "{\"a\":"},
                            {"text": "1}"},
                            {"functionCall": {"name": "web_search", "args": {"query": "x"}}}
                        ]
                    }
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let model = GeminiModel::new(&config(server.uri())).unwrap();
        let mut conversation = Conversation::new();
        conversation.push(ConversationTurn::user(["hello"]));
        let response = model
            .generate(&InferenceRequest {
                model: "gemini-test".to_string(),
                conversation,
                response_format: ResponseFormat { json_only: true },
                tools: Vec::new(),
            })
            .await
            .unwrap();

        assert_eq!(response.text, "{\"a\":1}");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].str_arg("query"), Some("x"));
    }

    #[tokio::test]
    async fn test_generate_surfaces_remote_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let model = GeminiModel::new(&config(server.uri())).unwrap();
        let err = model
            .generate(&InferenceRequest {
                model: "gemini-test".to_string(),
                conversation: Conversation::new(),
                response_format: ResponseFormat::default(),
                tools: Vec::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Inference(ref msg) if msg.contains("503")));
    }
}
