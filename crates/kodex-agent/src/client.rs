//! Gemini API client
//!
//! This module provides a [`Planner`] backed by Gemini's `generateContent`
//! endpoint, including the mapping between the conversation and Gemini's
//! `contents`/`parts` wire format.

use crate::conversation::{Conversation, MessageContent, Role};
use crate::planner::{Planner, PlannerError, PlannerRequest, PlannerResponse, TokenUsage};
use crate::tools::{Tool, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Default Gemini REST endpoint
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors that can occur during API client operations
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// API error response
    #[error("API error: {0}")]
    ApiError(String),

    /// Invalid API key
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,
}

impl From<ClientError> for PlannerError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::JsonParse(e) => PlannerError::InvalidResponse(e.to_string()),
            other => PlannerError::Transport(other.to_string()),
        }
    }
}

/// Request body for `generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation turns
    pub contents: Vec<Content>,
    /// Callable functions
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDeclarations>,
    /// System prompt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
}

/// One turn of the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// `user` or `model`; absent for system instructions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Parts of the turn
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// A piece of a turn: text, a function call, or a function response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Function call requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
    /// Result of a function call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_response: Option<FunctionResponse>,
}

/// Function call emitted by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Call ID, when the API provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function name
    pub name: String,
    /// Arguments object
    #[serde(default)]
    pub args: JsonValue,
}

/// Function result sent back to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionResponse {
    /// Call ID this answers, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Function name
    pub name: String,
    /// `{"result": ...}` or `{"error": ...}`
    pub response: JsonValue,
}

/// Group of function declarations
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDeclarations {
    /// Declared functions
    pub function_declarations: Vec<FunctionDeclaration>,
}

/// Declaration of one callable function
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDeclaration {
    /// Function name
    pub name: String,
    /// What the function does
    pub description: String,
    /// JSON schema of the arguments
    pub parameters: JsonValue,
}

impl From<&Tool> for FunctionDeclaration {
    fn from(tool: &Tool) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.input_schema.clone(),
        }
    }
}

/// Response from `generateContent`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    /// Generated candidates
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    /// Token accounting
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

/// A generated candidate
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Generated turn; missing when generation was stopped early
    #[serde(default)]
    pub content: Option<Content>,
    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token counts as reported by the API
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    /// Prompt tokens
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Response tokens
    #[serde(default)]
    pub candidates_token_count: u64,
}

impl GenerateContentRequest {
    /// Build a request from a planner request
    pub fn from_planner_request(request: &PlannerRequest<'_>) -> Self {
        let tools = if request.tools.is_empty() {
            Vec::new()
        } else {
            vec![ToolDeclarations {
                function_declarations: request.tools.iter().map(FunctionDeclaration::from).collect(),
            }]
        };

        let system_instruction = (!request.system_instructions.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part {
                text: Some(request.system_instructions.to_string()),
                ..Part::default()
            }],
        });

        Self {
            contents: contents_from_conversation(request.conversation),
            tools,
            system_instruction,
        }
    }
}

/// Map the conversation to Gemini turns.
///
/// Tool responses become `functionResponse` parts in a `user` turn; runs of
/// consecutive responses share one turn.
pub fn contents_from_conversation(conversation: &Conversation) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();

    for message in conversation.messages() {
        match &message.content {
            MessageContent::Text { text } => {
                let role = match message.role {
                    Role::Planner => "model",
                    Role::User | Role::Tool => "user",
                };
                contents.push(Content {
                    role: Some(role.to_string()),
                    parts: vec![Part {
                        text: Some(text.clone()),
                        ..Part::default()
                    }],
                });
            }
            MessageContent::PlannerTurn { text, tool_calls } => {
                let mut parts = Vec::new();
                if let Some(text) = text.as_ref().filter(|t| !t.is_empty()) {
                    parts.push(Part {
                        text: Some(text.clone()),
                        ..Part::default()
                    });
                }
                parts.extend(tool_calls.iter().map(|call| Part {
                    function_call: Some(FunctionCall {
                        id: None,
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    ..Part::default()
                }));
                contents.push(Content {
                    role: Some("model".to_string()),
                    parts,
                });
            }
            MessageContent::ToolResponse { response } => {
                let part = Part {
                    function_response: Some(FunctionResponse {
                        id: None,
                        name: response.name.clone(),
                        response: serde_json::to_value(&response.result)
                            .unwrap_or_else(|_| serde_json::json!({ "result": response.result.text() })),
                    }),
                    ..Part::default()
                };

                match contents.last_mut() {
                    Some(last)
                        if last.role.as_deref() == Some("user")
                            && last.parts.iter().all(|p| p.function_response.is_some()) =>
                    {
                        last.parts.push(part)
                    }
                    _ => contents.push(Content {
                        role: Some("user".to_string()),
                        parts: vec![part],
                    }),
                }
            }
        }
    }

    contents
}

/// Gemini API client
pub struct GeminiClient {
    /// API key for authentication
    api_key: String,
    /// Model name
    model: String,
    /// HTTP client
    client: reqwest::Client,
    /// API base URL
    base_url: String,
    /// Counter for generated call IDs
    next_call_id: AtomicU64,
}

impl GeminiClient {
    /// Create a new Gemini API client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            next_call_id: AtomicU64::new(1),
        }
    }

    /// Point the client at a different endpoint
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The model requests are sent to
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get the default model name
    pub fn default_model() -> &'static str {
        "gemini-2.5-flash-lite"
    }

    /// Send a request and get the raw response
    pub async fn generate_content(
        &self,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, ClientError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await?;

            return Err(match status.as_u16() {
                401 | 403 => ClientError::InvalidApiKey,
                429 => ClientError::RateLimitExceeded,
                _ => ClientError::ApiError(format!("{}: {}", status, error_text)),
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Convert a raw response into a planner decision
    fn to_planner_response(
        &self,
        response: GenerateContentResponse,
    ) -> Result<PlannerResponse, PlannerError> {
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| PlannerError::InvalidResponse("response has no candidates".to_string()))?;

        if candidate.content.is_none() {
            tracing::warn!(finish_reason = ?candidate.finish_reason, "candidate has no content");
        }

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                let id = call.id.unwrap_or_else(|| {
                    format!("call_{}", self.next_call_id.fetch_add(1, Ordering::Relaxed))
                });
                tool_calls.push(ToolCall::new(id, call.name, call.args));
            }
        }

        Ok(PlannerResponse {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
            usage: response.usage_metadata.map(|u| TokenUsage {
                prompt_tokens: u.prompt_token_count,
                response_tokens: u.candidates_token_count,
            }),
        })
    }
}

#[async_trait]
impl Planner for GeminiClient {
    async fn plan(&self, request: PlannerRequest<'_>) -> Result<PlannerResponse, PlannerError> {
        let body = GenerateContentRequest::from_planner_request(&request);
        tracing::debug!(
            model = %self.model,
            turns = body.contents.len(),
            "sending generateContent request"
        );

        let response = self.generate_content(&body).await?;
        self.to_planner_response(response)
    }
}
