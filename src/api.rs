use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::BackendConfig;
use crate::models::{
    AskResponse, ChatMessage, Citation, Conversation, CosmosDbHealth, ExecResult, FeedbackValue,
    FrontendSettings, Role,
};

pub const ENCRYPTED_USERNAME_HEADER: &str = "X-Encrypted-Username";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("Could not decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Backend reported an error: {0}")]
    Stream(String),

    #[error("No auth token configured")]
    Unauthenticated,
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Outcome of a history mutation. `ok` mirrors the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
struct MessageFeedbackRequest<'a> {
    message_id: &'a str,
    message_feedback: &'a FeedbackValue,
}

#[derive(Debug, Serialize)]
struct ReadRequest<'a> {
    conversation_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ReadResponse {
    #[serde(default)]
    conversation_id: String,
    #[serde(default)]
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ConversationRequest<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    id: String,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    messages: Vec<StreamMessage>,
}

#[derive(Debug, Deserialize)]
struct StreamMessage {
    #[serde(default)]
    id: Option<String>,
    role: Role,
    #[serde(default)]
    content: String,
    #[serde(default)]
    date: Option<String>,
}

/// Payload of a `tool` message: what retrieval produced for the next answer.
#[derive(Debug, Default, Deserialize)]
pub struct ToolContent {
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default)]
    pub all_exec_results: Vec<ExecResult>,
    #[serde(default)]
    pub generated_chart: Option<String>,
}

/// Client for the chat backend's conversation and history endpoints.
#[derive(Debug, Clone)]
pub struct HistoryClient {
    base_url: String,
    auth_token: Option<String>,
    encrypted_username: Option<String>,
    client: reqwest::Client,
}

impl HistoryClient {
    pub fn from_config(backend: &BackendConfig) -> Self {
        Self::with_config(
            backend.base_url.clone(),
            backend.auth_token.clone(),
            backend.encrypted_username.clone(),
        )
    }

    pub fn with_config(
        base_url: String,
        auth_token: Option<String>,
        encrypted_username: Option<String>,
    ) -> Self {
        HistoryClient {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.filter(|t| !t.is_empty()),
            encrypted_username: encrypted_username.filter(|u| !u.is_empty()),
            client: reqwest::Client::new(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth_token.is_some()
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let token = self.auth_token.as_deref().ok_or(ApiError::Unauthenticated)?;
        let mut builder = self
            .client
            .request(method, self.endpoint(path))
            .bearer_auth(token);
        if let Some(username) = &self.encrypted_username {
            builder = builder.header(ENCRYPTED_USERNAME_HEADER, username);
        }
        Ok(builder)
    }

    async fn send(&self, builder: RequestBuilder, endpoint: &str) -> Result<reqwest::Response> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(endpoint, status = status.as_u16(), "backend call failed");
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }

    pub async fn submit_feedback(
        &self,
        message_id: &str,
        value: &FeedbackValue,
    ) -> Result<ApiResponse> {
        let body = MessageFeedbackRequest {
            message_id,
            message_feedback: value,
        };
        let builder = self
            .request(Method::POST, "history/message_feedback")?
            .json(&body);
        let response = builder.send().await?;
        tracing::debug!(message_id, feedback = %value, status = response.status().as_u16(), "feedback submitted");
        Ok(ApiResponse {
            ok: response.status().is_success(),
        })
    }

    pub async fn delete_all_history(&self) -> Result<ApiResponse> {
        let response = self
            .request(Method::DELETE, "history/delete_all")?
            .send()
            .await?;
        Ok(ApiResponse {
            ok: response.status().is_success(),
        })
    }

    pub async fn list_history(&self, offset: usize) -> Result<Vec<Conversation>> {
        let builder = self
            .request(Method::GET, "history/list")?
            .query(&[("offset", offset)]);
        let response = self.send(builder, "history/list").await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn read_history(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let builder = self
            .request(Method::POST, "history/read")?
            .json(&ReadRequest { conversation_id });
        let response = self.send(builder, "history/read").await?;
        let text = response.text().await?;
        let read: ReadResponse = serde_json::from_str(&text)?;
        tracing::debug!(conversation_id = %read.conversation_id, messages = read.messages.len(), "history read");
        Ok(read.messages)
    }

    pub async fn ensure_history(&self) -> Result<CosmosDbHealth> {
        let builder = self.request(Method::GET, "history/ensure")?;
        let response = builder.send().await?;
        let ok = response.status().is_success();
        let text = response.text().await?;
        let mut health: CosmosDbHealth = serde_json::from_str(&text).unwrap_or_default();
        health.cosmos_db = ok && health.cosmos_db;
        Ok(health)
    }

    pub async fn frontend_settings(&self) -> Result<FrontendSettings> {
        let builder = self.request(Method::GET, "frontend_settings")?;
        let response = self.send(builder, "frontend_settings").await?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Ask the backend for the next answer. Returns the messages to append to the
    /// conversation: retrieval `tool` output first, then the assistant reply.
    pub async fn conversation(&self, messages: &[ChatMessage]) -> Result<Vec<ChatMessage>> {
        let builder = self
            .request(Method::POST, "conversation")?
            .json(&ConversationRequest { messages });
        let response = self.send(builder, "conversation").await?;
        let body = response.text().await?;
        assemble_stream(&body)
    }
}

/// Fold the newline-delimited JSON chunks of a conversation reply into messages.
///
/// Assistant chunks are deltas and are concatenated; tool chunks are kept whole.
pub fn assemble_stream(body: &str) -> Result<Vec<ChatMessage>> {
    let mut tools: Vec<ChatMessage> = Vec::new();
    let mut assistant: Option<ChatMessage> = None;

    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let chunk: StreamChunk = serde_json::from_str(line)?;
        if let Some(error) = chunk.error {
            let message = match error {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Err(ApiError::Stream(message));
        }

        for message in chunk.choices.into_iter().flat_map(|c| c.messages) {
            match message.role {
                Role::Tool => tools.push(ChatMessage {
                    id: message.id.unwrap_or_default(),
                    role: Role::Tool,
                    content: message.content,
                    date: message.date.unwrap_or_default(),
                    feedback: None,
                    context: None,
                }),
                Role::Assistant => {
                    let entry = assistant.get_or_insert_with(|| ChatMessage {
                        id: String::new(),
                        role: Role::Assistant,
                        content: String::new(),
                        date: String::new(),
                        feedback: None,
                        context: None,
                    });
                    entry.content.push_str(&message.content);
                    if let Some(id) = message.id.filter(|id| !id.is_empty()) {
                        entry.id = id;
                    } else if entry.id.is_empty() {
                        entry.id = chunk.id.clone();
                    }
                    if let Some(date) = message.date {
                        entry.date = date;
                    }
                }
                _ => {}
            }
        }
    }

    tools.extend(assistant);
    Ok(tools)
}

/// Build the answer record for the assistant message at `index`, taking citations from
/// the closest `tool` message before it.
pub fn answer_from_history(messages: &[ChatMessage], index: usize) -> Option<AskResponse> {
    let message = messages.get(index)?;
    if message.role != Role::Assistant {
        return None;
    }

    let tool = messages[..index]
        .iter()
        .rev()
        .take_while(|m| m.role != Role::Assistant && m.role != Role::User)
        .find(|m| m.role == Role::Tool)
        .map(|m| {
            serde_json::from_str::<ToolContent>(&m.content).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "tool message is not valid citation JSON");
                ToolContent::default()
            })
        })
        .unwrap_or_default();

    Some(AskResponse {
        answer: Some(message.content.clone()),
        citations: tool.citations,
        message_id: Some(message.id.clone()).filter(|id| !id.is_empty()),
        feedback: message.feedback.clone(),
        exec_results: tool.all_exec_results,
        generated_chart: tool.generated_chart,
    })
}
