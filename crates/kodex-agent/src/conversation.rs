//! Conversation state shared with the planner
//!
//! The conversation is append-only while a query runs. Only the agent loop
//! mutates it; the interactive front end may clear it between queries.

use crate::tools::{ToolCall, ToolResponse};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Planner (model) message
    Planner,
    /// Tool response
    Tool,
}

/// Content of a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text
    Text { text: String },
    /// A planner turn: optional text plus the tool calls it requested
    PlannerTurn {
        text: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// The response to one tool call
    ToolResponse { response: ToolResponse },
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the sender
    pub role: Role,
    /// Content of the message
    pub content: MessageContent,
}

impl Message {
    /// Create a new user message with text content
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text { text: text.into() },
        }
    }

    /// Create a planner message
    pub fn planner(text: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Planner,
            content: MessageContent::PlannerTurn { text, tool_calls },
        }
    }

    /// Create a tool response message
    pub fn tool(response: ToolResponse) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::ToolResponse { response },
        }
    }
}

/// Ordered message history for one session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create a new empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a user message
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.push(Message::user(text));
    }

    /// Get all messages
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Clear all messages
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Get the number of messages in the conversation
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}
