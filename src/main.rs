//! Taskpilot - Budgeted Browser Automation Agent
//!
//! Main entry point for the CLI application.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use taskpilot::actions::{register_browser_actions, ActionRegistry};
use taskpilot::browser::BrowserExecutor;
use taskpilot::core::Task;
use taskpilot::llm::{LLMProvider, LlmReasoner, OllamaClient};
use taskpilot::observe::BrowserObserver;
use taskpilot::{Agent, Config};

/// Taskpilot - Budgeted Browser Automation Agent
#[derive(Parser, Debug)]
#[command(name = "taskpilot")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Task to perform
    #[arg(long, short = 't', conflicts_with = "task_file")]
    task: Option<String>,

    /// Read the task from a file
    #[arg(long)]
    task_file: Option<PathBuf>,

    /// JSON file describing the expected result shape
    #[arg(long)]
    output_schema: Option<PathBuf>,

    /// Maximum number of steps
    #[arg(long)]
    max_steps: Option<usize>,

    /// Maximum number of actions per step
    #[arg(long)]
    max_actions: Option<usize>,

    /// Reasoner model
    #[arg(long, short = 'm')]
    model: Option<String>,

    /// Do not send screenshots to the reasoner
    #[arg(long)]
    no_vision: bool,

    /// Run in headed browser mode (visible window)
    #[arg(long)]
    headed: bool,

    /// Write the run history as JSON
    #[arg(long)]
    save_history: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'd')]
    debug: bool,
}

fn load_task(args: &Args) -> anyhow::Result<Task> {
    let goal = match (&args.task, &args.task_file) {
        (Some(task), _) => task.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading task from {}", path.display()))?,
        (None, None) => anyhow::bail!("no task given; use --task or --task-file"),
    };

    let mut task = Task::new(goal);
    if let Some(path) = &args.output_schema {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading output schema from {}", path.display()))?;
        let schema = serde_json::from_str(&content)
            .with_context(|| format!("parsing output schema {}", path.display()))?;
        task = task.with_output_schema(schema);
    }
    Ok(task)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Build configuration
    let mut config = Config::load();

    // Apply CLI overrides
    if let Some(ref model) = args.model {
        config.models.reasoner = model.clone();
    }
    if let Some(steps) = args.max_steps {
        config.agent.max_steps = steps;
    }
    if let Some(actions) = args.max_actions {
        config.agent.max_actions_per_step = actions;
    }
    if args.no_vision {
        config.agent.use_vision = false;
    }
    if args.headed {
        config.browser.headed = true;
    }
    if args.debug {
        config.agent.debug = true;
    }

    let default_level = if config.agent.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    config.validate()?;
    let task = load_task(&args)?;

    let provider = Arc::new(OllamaClient::from_config(&config)?);
    if !provider.is_model_available(&config.models.reasoner).await? {
        anyhow::bail!(taskpilot::PilotError::ModelNotFound(
            config.models.reasoner.clone()
        ));
    }

    if !BrowserExecutor::is_available().await {
        anyhow::bail!(taskpilot::PilotError::AgentBrowserNotFound);
    }
    let browser = Arc::new(BrowserExecutor::from_config(&config.browser));

    let mut registry = ActionRegistry::new();
    if config.browser.enabled {
        register_browser_actions(&mut registry, Arc::clone(&browser))?;
    }

    let agent = Agent::builder(task)
        .registry(Arc::new(registry))
        .reasoner(Arc::new(LlmReasoner::from_config(provider, &config)))
        .observer(Arc::new(BrowserObserver::new(browser)))
        .config(&config.agent)
        .build()?;

    // Ctrl-C stops the run before its next step
    let token = agent.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    let history = agent
        .run(config.agent.max_steps, config.agent.max_actions_per_step)
        .await?;

    if let Some(path) = &args.save_history {
        history.save_to_file(path)?;
        println!("History saved to {}", path.display());
    }

    println!(
        "[Agent] {} after {} step(s)",
        history.status(),
        history.len()
    );
    if let Some(reason) = history.failure() {
        println!("[Agent] {}", reason);
    }

    match history.final_result() {
        Some(result) => {
            println!("Extracted result:");
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        None => println!("No result"),
    }

    Ok(())
}
