//! Planner contract
//!
//! A planner receives the whole conversation plus the tool schema and
//! decides what happens next: answer in text, or request tool calls.

use crate::conversation::Conversation;
use crate::tools::{Tool, ToolCall};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use thiserror::Error;

/// Errors a planner can report. Any of them ends the agent loop.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// The planner could not be reached or rejected the request
    #[error("Planner transport error: {0}")]
    Transport(String),

    /// The planner answered with something unusable
    #[error("Invalid planner response: {0}")]
    InvalidResponse(String),
}

/// Everything the planner sees for one decision
#[derive(Debug, Clone, Copy)]
pub struct PlannerRequest<'a> {
    /// Full conversation so far
    pub conversation: &'a Conversation,
    /// Tools the planner may call
    pub tools: &'a [Tool],
    /// System instructions
    pub system_instructions: &'a str,
}

/// Token counts reported by the planner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens in the prompt
    pub prompt_tokens: u64,
    /// Tokens in the response
    pub response_tokens: u64,
}

impl TokenUsage {
    /// Sum of prompt and response tokens
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.response_tokens
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens += other.prompt_tokens;
        self.response_tokens += other.response_tokens;
    }
}

/// One planner decision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlannerResponse {
    /// Text the planner produced, if any
    pub text: Option<String>,
    /// Tool calls to run, in order
    pub tool_calls: Vec<ToolCall>,
    /// Token usage for this call, if reported
    pub usage: Option<TokenUsage>,
}

impl PlannerResponse {
    /// A final text answer
    pub fn answer(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// A response requesting tool calls
    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::default()
        }
    }

    /// Text with surrounding whitespace removed, if non-empty
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// The external decision-maker driving the agent loop
#[async_trait]
pub trait Planner: Send + Sync {
    /// Decide the next step
    async fn plan(&self, request: PlannerRequest<'_>) -> Result<PlannerResponse, PlannerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_accumulates() {
        let mut usage = TokenUsage::default();
        usage += TokenUsage {
            prompt_tokens: 10,
            response_tokens: 3,
        };
        usage += TokenUsage {
            prompt_tokens: 5,
            response_tokens: 2,
        };
        assert_eq!(usage.prompt_tokens, 15);
        assert_eq!(usage.total(), 20);
    }

    #[test]
    fn test_trimmed_text() {
        assert_eq!(PlannerResponse::answer("  done \n").trimmed_text(), Some("done"));
        assert_eq!(PlannerResponse::answer("   ").trimmed_text(), None);
        assert_eq!(PlannerResponse::default().trimmed_text(), None);
    }
}
