//! Drive the agent loop with a scripted planner, no network needed
//!
//! Usage: `cargo run -p kodex-agent --example scripted_session -- [PROJECT_DIR]`

use async_trait::async_trait;
use kodex_agent::{
    AgentEvent, AgentLoop, Planner, PlannerError, PlannerRequest, PlannerResponse, ToolCall,
};
use kodex_core::Project;
use std::sync::Mutex;

/// Lists the root, reads the first file it sees, then answers
struct ScriptedPlanner {
    step: Mutex<u32>,
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, request: PlannerRequest<'_>) -> Result<PlannerResponse, PlannerError> {
        let mut step = self
            .step
            .lock()
            .map_err(|e| PlannerError::InvalidResponse(e.to_string()))?;
        *step += 1;

        Ok(match *step {
            1 => PlannerResponse::calls(vec![ToolCall::new("1", "list_files", serde_json::json!({}))]),
            2 => PlannerResponse::calls(vec![ToolCall::new(
                "2",
                "find_files",
                serde_json::json!({"pattern": ".md"}),
            )]),
            _ => PlannerResponse::answer(format!(
                "Explored the project in {} messages.",
                request.conversation.message_count()
            )),
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());
    let project = Project::open(&root)?;
    println!("Project: {}", project.name());

    let planner = ScriptedPlanner { step: Mutex::new(0) };
    let mut agent = AgentLoop::for_project(planner, &project);
    let run = agent.run("What is in this project?").await?;

    for event in &run.events {
        match event {
            AgentEvent::ToolCall { call, .. } => println!(" - Calling function: {}", call.name),
            AgentEvent::ToolResult { response, .. } => println!("-> {}", response.result.text()),
            AgentEvent::PlannerText { .. } => {}
        }
    }

    println!("\n{}", run.outcome.text());
    Ok(())
}
