//! Interactive session
//!
//! Reads prompts line by line and runs each through the agent loop. The
//! conversation carries over between prompts until the user resets it.

use crate::display;
use chrono::Timelike;
use console::{style, Term};
use kodex_agent::{AgentError, AgentLoop, AgentRun, Planner};
use kodex_core::Project;
use std::future::Future;
use tokio::io::{AsyncBufReadExt, BufReader};

/// A line of user input, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Leave the session
    Exit,
    /// Clear the conversation
    Reset,
    /// Toggle verbose output
    ToggleVerbose,
    /// Clear the screen
    ClearScreen,
    /// Nothing to do
    Empty,
    /// A prompt for the agent
    Prompt(String),
}

impl Input {
    /// Classify a raw input line
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        match trimmed.to_lowercase().as_str() {
            "" => Input::Empty,
            "exit" | "quit" | "q" | "bye" => Input::Exit,
            "reset" => Input::Reset,
            "verbose" => Input::ToggleVerbose,
            "clear" => Input::ClearScreen,
            _ => Input::Prompt(trimmed.to_string()),
        }
    }
}

/// Greeting for the hour of day (0-23)
pub fn greeting(hour: u32) -> &'static str {
    match hour {
        5..=11 => "Good morning",
        12..=16 => "Good afternoon",
        _ => "Good evening",
    }
}

fn show_welcome(project: &Project) {
    let hour = chrono::Local::now().hour();
    println!();
    println!(
        "{} Welcome to {}",
        style(format!("{}!", greeting(hour))).cyan().bold(),
        style("Kodex").magenta().bold()
    );
    println!(
        "{}",
        style(format!(
            "Project {} at {}",
            project.name(),
            project.root.path().display()
        ))
        .dim()
    );
    println!();
    println!("{}", style("I can find, read, and write files and run Python scripts in this project.").dim());
    println!(
        "{} {} {}",
        style("Commands:").dim(),
        style("reset, verbose, clear,").yellow(),
        style("exit").yellow().bold()
    );
    println!();
}

/// Run one prompt unless `interrupt` completes first.
///
/// An interrupted run may leave tool calls without responses in the
/// conversation, so the conversation is cleared and `None` is returned.
pub async fn run_query<P, I>(
    agent: &mut AgentLoop<P>,
    prompt: String,
    interrupt: I,
) -> Option<Result<AgentRun, AgentError>>
where
    P: Planner,
    I: Future,
{
    let finished = tokio::select! {
        result = agent.run(prompt) => Some(result),
        _ = interrupt => None,
    };
    if finished.is_none() {
        tracing::debug!("query interrupted, clearing conversation");
        agent.reset();
    }
    finished
}

fn say_goodbye() {
    println!("\n{}\n", style("Goodbye! Happy coding!").cyan());
}

/// Run the read-eval-print loop until the user leaves or input ends
pub async fn run<P: Planner>(
    agent: &mut AgentLoop<P>,
    project: &Project,
    mut verbose: bool,
) -> anyhow::Result<()> {
    show_welcome(project);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", style("Enter prompt here:").cyan().bold());
        Term::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            say_goodbye();
            return Ok(());
        };

        match Input::parse(&line) {
            Input::Empty => continue,
            Input::Exit => {
                say_goodbye();
                return Ok(());
            }
            Input::Reset => {
                agent.reset();
                println!("{}", style("Context cleared. Starting fresh!").yellow());
            }
            Input::ToggleVerbose => {
                verbose = !verbose;
                let status = if verbose { "enabled" } else { "disabled" };
                println!("{}", style(format!("Verbose mode {}", status)).yellow());
            }
            Input::ClearScreen => {
                Term::stdout().clear_screen()?;
                show_welcome(project);
            }
            Input::Prompt(prompt) => {
                println!("{}", style("Thinking...").cyan().dim());
                match run_query(agent, prompt, tokio::signal::ctrl_c()).await {
                    None => {
                        println!("{}", style("Interrupted. Context cleared.").yellow());
                    }
                    Some(Ok(run)) => {
                        display::print_events(&run, verbose);
                        println!();
                        if run.outcome.is_exhausted() {
                            println!("{}", style(run.outcome.text()).yellow());
                        } else {
                            println!("{}", style(run.outcome.text()).green());
                        }
                        if verbose {
                            display::print_usage(&run);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::debug!(error = ?e, "query failed");
                        println!("{} {}", style("Error:").red().bold(), e);
                    }
                }
            }
        }
        println!();
    }
}
