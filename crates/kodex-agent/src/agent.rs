//! The bounded planner/tool loop
//!
//! [`AgentLoop::run`] alternates between asking the planner for a decision
//! and dispatching the tool calls it requests, until the planner answers in
//! plain text or the iteration budget runs out. Tool failures are fed back
//! to the planner as results; only a planner failure stops the loop early.

use crate::conversation::{Conversation, Message};
use crate::directives::{DirectiveManager, DEFAULT_SYSTEM_PROMPT};
use crate::planner::{Planner, PlannerError, PlannerRequest, TokenUsage};
use crate::tools::{all_tools, Tool, ToolCall, ToolDispatcher, ToolResponse};
use kodex_core::Project;
use thiserror::Error;

/// Text returned when the iteration budget is exhausted
pub const EXHAUSTED_MESSAGE: &str = "Maximum iterations reached. The task may be incomplete.";

/// Default number of planner calls per query
pub const DEFAULT_MAX_ITERATIONS: u32 = 20;

/// Errors that end a run
#[derive(Error, Debug)]
pub enum AgentError {
    /// The planner failed
    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Something that happened during a run, in order
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The planner produced text
    PlannerText { iteration: u32, text: String },
    /// The planner requested a tool call
    ToolCall { iteration: u32, call: ToolCall },
    /// A tool call finished
    ToolResult { iteration: u32, response: ToolResponse },
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// The planner answered
    Answer(String),
    /// The iteration budget ran out
    Exhausted,
}

impl AgentOutcome {
    /// Text to show the user
    pub fn text(&self) -> &str {
        match self {
            AgentOutcome::Answer(text) => text,
            AgentOutcome::Exhausted => EXHAUSTED_MESSAGE,
        }
    }

    /// Whether the budget ran out
    pub fn is_exhausted(&self) -> bool {
        matches!(self, AgentOutcome::Exhausted)
    }
}

/// Result of one query
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Final outcome
    pub outcome: AgentOutcome,
    /// Number of planner calls made
    pub iterations: u32,
    /// Events in the order they happened
    pub events: Vec<AgentEvent>,
    /// Token usage summed over all planner calls
    pub usage: TokenUsage,
}

enum LoopState {
    AwaitingPlanner,
    HasToolCalls(Vec<ToolCall>),
    Done(String),
    Exhausted,
}

/// Drives a planner against a tool dispatcher
pub struct AgentLoop<P> {
    planner: P,
    dispatcher: ToolDispatcher,
    tools: Vec<Tool>,
    system_prompt: String,
    conversation: Conversation,
    max_iterations: u32,
}

impl<P: Planner> AgentLoop<P> {
    /// Create a loop with the built-in prompt and the default budget
    pub fn new(planner: P, dispatcher: ToolDispatcher) -> Self {
        Self {
            planner,
            dispatcher,
            tools: all_tools(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            conversation: Conversation::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Create a loop configured from a project
    pub fn for_project(planner: P, project: &Project) -> Self {
        Self::new(planner, ToolDispatcher::new(project))
            .with_max_iterations(project.config.agent.max_iterations)
            .with_system_prompt(DirectiveManager::new(project.root.path()).assemble_system_prompt())
    }

    /// Set the iteration budget (at least 1)
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Replace the system instructions
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    /// The conversation so far
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// The planner
    pub fn planner(&self) -> &P {
        &self.planner
    }

    /// The iteration budget
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Forget the conversation
    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    /// Run one query to completion or exhaustion.
    ///
    /// The prompt is appended to the existing conversation, so consecutive
    /// runs share context until [`AgentLoop::reset`] is called.
    pub async fn run(&mut self, prompt: impl Into<String>) -> Result<AgentRun> {
        self.conversation.push_user(prompt);

        let mut iterations = 0;
        let mut events = Vec::new();
        let mut usage = TokenUsage::default();
        let mut state = LoopState::AwaitingPlanner;

        let outcome = loop {
            state = match state {
                LoopState::AwaitingPlanner if iterations >= self.max_iterations => {
                    LoopState::Exhausted
                }
                LoopState::AwaitingPlanner => {
                    iterations += 1;
                    tracing::debug!(
                        iteration = iterations,
                        max = self.max_iterations,
                        messages = self.conversation.message_count(),
                        "requesting plan"
                    );

                    let request = PlannerRequest {
                        conversation: &self.conversation,
                        tools: &self.tools,
                        system_instructions: &self.system_prompt,
                    };
                    let response = match self.planner.plan(request).await {
                        Ok(response) => response,
                        Err(e) => {
                            tracing::warn!(iteration = iterations, error = %e, "planner failed");
                            return Err(e.into());
                        }
                    };

                    if let Some(turn_usage) = response.usage {
                        usage += turn_usage;
                    }

                    let text = response.trimmed_text().map(str::to_string);
                    if let Some(text) = &text {
                        events.push(AgentEvent::PlannerText {
                            iteration: iterations,
                            text: text.clone(),
                        });
                    }

                    if response.tool_calls.is_empty() && text.is_none() {
                        tracing::debug!(iteration = iterations, "planner returned nothing, re-prompting");
                        LoopState::AwaitingPlanner
                    } else {
                        self.conversation
                            .push(Message::planner(text.clone(), response.tool_calls.clone()));
                        match text {
                            Some(text) if response.tool_calls.is_empty() => LoopState::Done(text),
                            _ => LoopState::HasToolCalls(response.tool_calls),
                        }
                    }
                }
                LoopState::HasToolCalls(calls) => {
                    for call in calls {
                        events.push(AgentEvent::ToolCall {
                            iteration: iterations,
                            call: call.clone(),
                        });

                        let response = self.dispatcher.dispatch(&call).await;

                        events.push(AgentEvent::ToolResult {
                            iteration: iterations,
                            response: response.clone(),
                        });
                        self.conversation.push(Message::tool(response));
                    }
                    LoopState::AwaitingPlanner
                }
                LoopState::Done(text) => break AgentOutcome::Answer(text),
                LoopState::Exhausted => {
                    tracing::warn!(max = self.max_iterations, "iteration budget exhausted");
                    break AgentOutcome::Exhausted;
                }
            };
        };

        Ok(AgentRun {
            outcome,
            iterations,
            events,
            usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::PlannerResponse;
    use crate::tools::ToolResult;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned responses, then answers "done"
    struct ScriptedPlanner {
        responses: Mutex<VecDeque<PlannerResponse>>,
        calls: AtomicU32,
        seen_messages: Mutex<Vec<usize>>,
    }

    impl ScriptedPlanner {
        fn new(responses: Vec<PlannerResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicU32::new(0),
                seen_messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Planner for ScriptedPlanner {
        async fn plan(&self, request: PlannerRequest<'_>) -> std::result::Result<PlannerResponse, PlannerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_messages
                .lock()
                .unwrap()
                .push(request.conversation.message_count());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| PlannerResponse::answer("done")))
        }
    }

    /// Requests a tool call forever
    struct AlwaysCallsPlanner {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Planner for AlwaysCallsPlanner {
        async fn plan(&self, _request: PlannerRequest<'_>) -> std::result::Result<PlannerResponse, PlannerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PlannerResponse::calls(vec![ToolCall::new(
                format!("call_{}", n),
                "list_files",
                serde_json::json!({}),
            )]))
        }
    }

    struct FailingPlanner;

    #[async_trait]
    impl Planner for FailingPlanner {
        async fn plan(&self, _request: PlannerRequest<'_>) -> std::result::Result<PlannerResponse, PlannerError> {
            Err(PlannerError::Transport("connection refused".to_string()))
        }
    }

    fn dispatcher(temp_dir: &TempDir) -> ToolDispatcher {
        ToolDispatcher::new(&Project::open(temp_dir.path()).unwrap())
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let temp_dir = TempDir::new().unwrap();
        let planner = ScriptedPlanner::new(vec![PlannerResponse::answer("Hello!")]);
        let mut agent = AgentLoop::new(planner, dispatcher(&temp_dir));

        let run = agent.run("hi").await.unwrap();
        assert_eq!(run.outcome, AgentOutcome::Answer("Hello!".to_string()));
        assert_eq!(run.iterations, 1);
        assert_eq!(agent.conversation().message_count(), 2);
    }

    #[tokio::test]
    async fn test_tool_calls_are_dispatched_in_order() {
        let temp_dir = TempDir::new().unwrap();
        tokio::fs::write(temp_dir.path().join("a.txt"), "alpha").await.unwrap();

        let planner = ScriptedPlanner::new(vec![
            PlannerResponse::calls(vec![
                ToolCall::new("1", "read_file", serde_json::json!({"file_path": "a.txt"})),
                ToolCall::new("2", "read_file", serde_json::json!({"file_path": "../b.txt"})),
            ]),
            PlannerResponse::answer("a.txt says alpha"),
        ]);
        let mut agent = AgentLoop::new(planner, dispatcher(&temp_dir));

        let run = agent.run("read a.txt").await.unwrap();
        assert_eq!(run.outcome.text(), "a.txt says alpha");
        assert_eq!(run.iterations, 2);

        let results: Vec<&ToolResponse> = run
            .events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::ToolResult { response, .. } => Some(response),
                _ => None,
            })
            .collect();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].call_id, "1");
        assert_eq!(results[0].result, ToolResult::Ok("alpha".to_string()));
        assert!(results[1].result.is_error());

        // user, planner, tool, tool when the second plan was requested
        assert_eq!(*agent.planner().seen_messages.lock().unwrap(), vec![1, 4]);
    }

    #[tokio::test]
    async fn test_exhaustion_after_max_iterations() {
        let temp_dir = TempDir::new().unwrap();
        let planner = AlwaysCallsPlanner {
            calls: AtomicU32::new(0),
        };
        let mut agent = AgentLoop::new(planner, dispatcher(&temp_dir)).with_max_iterations(5);

        let run = agent.run("loop forever").await.unwrap();
        assert!(run.outcome.is_exhausted());
        assert_eq!(run.outcome.text(), EXHAUSTED_MESSAGE);
        assert_eq!(run.iterations, 5);
        assert_eq!(agent.planner().calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_empty_response_consumes_iteration() {
        let temp_dir = TempDir::new().unwrap();
        let planner = ScriptedPlanner::new(vec![
            PlannerResponse::default(),
            PlannerResponse::answer("   "),
            PlannerResponse::answer("finally"),
        ]);
        let mut agent = AgentLoop::new(planner, dispatcher(&temp_dir));

        let run = agent.run("hi").await.unwrap();
        assert_eq!(run.outcome.text(), "finally");
        assert_eq!(run.iterations, 3);
        assert_eq!(agent.conversation().message_count(), 2);
    }

    #[tokio::test]
    async fn test_planner_error_stops_loop() {
        let temp_dir = TempDir::new().unwrap();
        let mut agent = AgentLoop::new(FailingPlanner, dispatcher(&temp_dir));

        let err = agent.run("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Planner error: Planner transport error: connection refused");
    }

    #[tokio::test]
    async fn test_usage_and_reset() {
        let temp_dir = TempDir::new().unwrap();
        let mut first = PlannerResponse::calls(vec![ToolCall::new("1", "list_files", serde_json::json!({}))]);
        first.usage = Some(TokenUsage {
            prompt_tokens: 10,
            response_tokens: 2,
        });
        let mut second = PlannerResponse::answer("empty project");
        second.usage = Some(TokenUsage {
            prompt_tokens: 20,
            response_tokens: 3,
        });

        let mut agent = AgentLoop::new(ScriptedPlanner::new(vec![first, second]), dispatcher(&temp_dir));
        let run = agent.run("list").await.unwrap();
        assert_eq!(run.usage.total(), 35);

        agent.reset();
        assert_eq!(agent.conversation().message_count(), 0);
    }

    #[tokio::test]
    async fn test_for_project_uses_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut project = Project::open(temp_dir.path()).unwrap();
        project.config.agent.max_iterations = 3;

        let agent = AgentLoop::for_project(ScriptedPlanner::new(Vec::new()), &project);
        assert_eq!(agent.max_iterations(), 3);
    }
}
