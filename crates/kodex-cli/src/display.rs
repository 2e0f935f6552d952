//! Terminal rendering of agent runs

use console::style;
use kodex_agent::{AgentEvent, AgentRun};

/// Longest tool result shown in verbose mode before eliding
const MAX_RESULT_PREVIEW: usize = 2_000;

/// Print tool activity for a run.
///
/// Quiet mode shows one line per tool call; verbose mode adds the arguments
/// and each result.
pub fn print_events(run: &AgentRun, verbose: bool) {
    for line in event_lines(run, verbose) {
        println!("{}", line);
    }
}

/// Print token usage for a run
pub fn print_usage(run: &AgentRun) {
    println!(
        "{}",
        style(format!(
            "Prompt tokens: {}\nResponse tokens: {}\nIterations: {}",
            run.usage.prompt_tokens, run.usage.response_tokens, run.iterations
        ))
        .dim()
    );
}

fn event_lines(run: &AgentRun, verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();
    for event in &run.events {
        match event {
            AgentEvent::ToolCall { call, .. } if verbose => lines.push(
                style(format!("  -> Calling: {}({})", call.name, call.arguments))
                    .dim()
                    .to_string(),
            ),
            AgentEvent::ToolCall { call, .. } => {
                lines.push(style(format!("  - {}", call.name)).cyan().dim().to_string())
            }
            AgentEvent::ToolResult { response, .. } if verbose => {
                let text = preview(response.result.text());
                let styled = if response.result.is_error() {
                    style(format!("  <- {}", text)).red()
                } else {
                    style(format!("  <- {}", text)).dim()
                };
                lines.push(styled.to_string());
            }
            AgentEvent::ToolResult { .. } | AgentEvent::PlannerText { .. } => {}
        }
    }
    lines
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(MAX_RESULT_PREVIEW) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
