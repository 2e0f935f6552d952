//! Kodex - command line front end
//!
//! Runs a single prompt when one is given, otherwise starts an interactive
//! session. The planner is Gemini; the project root is the sandbox.

mod display;
mod interactive;

use anyhow::Context;
use clap::Parser;
use kodex_agent::{AgentLoop, GeminiClient};
use kodex_core::Project;
use std::path::PathBuf;
use std::process::ExitCode;

/// Environment variable holding the Gemini API key
const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Environment variable that turns on verbose output in interactive mode
const VERBOSE_ENV: &str = "KODEX_VERBOSE";

#[derive(Parser, Debug)]
#[command(name = "kodex", version, about = "Sandboxed coding agent for a single project directory")]
struct Cli {
    /// Prompt to run; starts an interactive session when omitted
    prompt: Option<String>,

    /// Show tool calls, results, and token usage
    #[arg(long)]
    verbose: bool,

    /// Project root the agent is confined to
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Model to use (overrides `[agent] model`)
    #[arg(long)]
    model: Option<String>,

    /// Maximum planner calls per prompt (overrides `[agent] max_iterations`)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_iterations: Option<u32>,
}

/// Initialize tracing for logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let default_filter = if verbose { "kodex=debug" } else { "kodex=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Whether `value` switches a flag on
fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

fn verbose_from_env() -> bool {
    std::env::var(VERBOSE_ENV).map(|v| is_truthy(&v)).unwrap_or(false)
}

/// Open the project and apply command line overrides
fn open_project(cli: &Cli) -> anyhow::Result<Project> {
    let mut project = Project::open(&cli.root)
        .with_context(|| format!("failed to open project at {}", cli.root.display()))?;

    if let Some(model) = &cli.model {
        project.config.agent.model = model.clone();
    }
    if let Some(max_iterations) = cli.max_iterations {
        project.config.agent.max_iterations = max_iterations;
    }

    tracing::debug!(
        root = %project.root.path().display(),
        model = %project.config.agent.model,
        max_iterations = project.config.agent.max_iterations,
        "project ready"
    );
    Ok(project)
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let api_key = match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => key,
        _ => {
            eprintln!("Error: {} not set", API_KEY_ENV);
            return Ok(ExitCode::FAILURE);
        }
    };

    let project = open_project(&cli)?;
    let planner = GeminiClient::new(api_key, project.config.agent.model.clone());
    let mut agent = AgentLoop::for_project(planner, &project);

    let Some(prompt) = cli.prompt else {
        let verbose = cli.verbose || verbose_from_env();
        interactive::run(&mut agent, &project, verbose).await?;
        return Ok(ExitCode::SUCCESS);
    };

    if cli.verbose {
        println!("User prompt: {}", prompt);
    }

    match agent.run(prompt).await {
        Ok(run) => {
            display::print_events(&run, cli.verbose);
            println!("{}", run.outcome.text());
            if cli.verbose {
                display::print_usage(&run);
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
