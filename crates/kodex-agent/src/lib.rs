//! Kodex Agent - tool dispatch and the planner loop for Kodex
//!
//! This crate provides the agent functionality for Kodex, including:
//! - Sandboxed tools (list, find, read, write, run) and their dispatcher
//! - The planner contract and a Gemini-backed planner
//! - Conversation state
//! - The bounded planner/tool loop

pub mod agent;
pub mod client;
pub mod conversation;
pub mod directives;
pub mod planner;
pub mod tools;

pub use agent::{AgentError, AgentEvent, AgentLoop, AgentOutcome, AgentRun, EXHAUSTED_MESSAGE};
pub use client::{ClientError, GeminiClient};
pub use conversation::{Conversation, Message, Role};
pub use directives::DirectiveManager;
pub use planner::{Planner, PlannerError, PlannerRequest, PlannerResponse, TokenUsage};
pub use tools::{all_tools, Tool, ToolCall, ToolDispatcher, ToolError, ToolKind, ToolResponse, ToolResult};
