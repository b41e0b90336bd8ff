use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

mod cli;
mod config;

use cli::Cli;
use cli::commands::{Commands, RunArgs};
use config::Config;
use critiquer::llm::{FailureKind, OpenRouterClient};
use critiquer::storage::{JsonRunStore, RunStore, summarize_runs};
use critiquer::transcript::TurnRole;
use critiquer::{CritiqueController, EventReceiver, RunConfig, RunEvent, RunReport, event_channel};

fn setup_logging(log_level: Option<&str>) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("critiquer")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("critiquer.log");

    // Setup env_logger with file output; RUST_LOG wins over the config level
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level.unwrap_or("info")))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Merge CLI overrides onto the config file
fn build_run_config(args: &RunArgs, config: &Config) -> Result<RunConfig> {
    let prompt = args
        .prompt
        .clone()
        .or_else(|| config.critique.prompt.clone())
        .ok_or_else(|| eyre!("No prompt given: pass one to `critiquer run` or set critique.prompt in the config"))?;

    let models = &config.models;
    Ok(RunConfig::new(prompt)
        .with_models(
            args.primary.clone().unwrap_or_else(|| models.primary.clone()),
            args.critic_a.clone().unwrap_or_else(|| models.critic_a.clone()),
            args.critic_b.clone().unwrap_or_else(|| models.critic_b.clone()),
        )
        .with_iterations(args.iterations.unwrap_or(config.critique.iterations))
        .with_critique_type(
            args.critique_type
                .clone()
                .unwrap_or_else(|| config.critique.critique_type.clone()),
        )
        .with_reasoning(config.critique.include_reasoning && !args.no_reasoning)
        .with_retry(config.retry.to_policy()))
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => handle_run_command(&RunArgs::default(), config, cli.is_verbose()).await,
        Some(Commands::Run(args)) => handle_run_command(args, config, cli.is_verbose()).await,
        Some(Commands::History { output, run, last }) => {
            handle_history_command(output.as_ref(), run.as_deref(), *last, config)
        }
    }
}

async fn handle_run_command(args: &RunArgs, config: &Config, verbose: bool) -> Result<()> {
    let run_config = build_run_config(args, config)?;
    let output = args.output.clone().unwrap_or_else(|| config.storage.output_file.clone());
    info!("Running {} iterations, storing to {}", run_config.iterations, output.display());

    let transport = OpenRouterClient::new(config.api.to_openrouter()).context("Failed to create OpenRouter client")?;
    let cancel = CancellationToken::new();
    let (tx, rx) = event_channel();

    let controller = CritiqueController::new(run_config, transport, JsonRunStore::new(&output))
        .context("Invalid run configuration")?
        .with_cancellation(cancel.clone())
        .with_events(tx);

    println!("{} {}", "Prompt:".green().bold(), controller.config().user_prompt);
    println!("{} {}", "Run:".green(), controller.run_id());

    let printer = tokio::spawn(print_events(rx, verbose));
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let result = controller.run().await;
    drop(controller);
    interrupt.abort();
    printer.await.context("Event printer failed")?;

    let report = result.context("Run failed")?;
    print_summary(&report, &output);
    Ok(())
}

async fn print_events(mut rx: EventReceiver, verbose: bool) {
    while let Some(event) = rx.recv().await {
        match event {
            RunEvent::IterationStarted { iteration, model } => {
                println!("\n{} {} ({})", "Iteration".cyan().bold(), iteration, model.dimmed());
            }
            RunEvent::AttemptFailed {
                model,
                attempt,
                max_attempts,
                kind,
                detail,
                retry_in,
            } => {
                let retry = match retry_in {
                    Some(delay) => format!("retrying in {}s", delay.as_secs()),
                    None => "giving up".to_string(),
                };
                println!(
                    "  {} {} attempt {}/{}: {} ({})",
                    "Warning:".yellow(),
                    model,
                    attempt,
                    max_attempts,
                    kind,
                    retry
                );
                if verbose {
                    println!("    {}", detail.dimmed());
                }
            }
            RunEvent::TurnAppended { turn, .. } => {
                let heading = match turn.role {
                    TurnRole::Assistant => "Response:".green().bold(),
                    _ => "Critique:".magenta().bold(),
                };
                if verbose {
                    if let Some(reasoning) = turn.reasoning() {
                        println!("{}\n{}", "Reasoning:".dimmed(), reasoning.dimmed());
                    }
                }
                println!("{}\n{}", heading, turn.content);
            }
            RunEvent::IterationSkipped {
                iteration,
                model,
                kind,
                detail,
            } => {
                println!("{}", skipped_line(iteration, &model, kind));
                if verbose {
                    println!("    {}", detail.dimmed());
                }
            }
            RunEvent::RecordPersisted { iteration, records } => {
                if verbose {
                    println!("  {} iteration {} ({} records)", "Saved".dimmed(), iteration, records);
                }
            }
            RunEvent::PersistFailed { iteration, error } => {
                println!("  {} could not save iteration {}: {}", "Error:".red(), iteration, error);
            }
        }
    }
}

fn skipped_line(iteration: u32, model: &str, kind: FailureKind) -> String {
    format!("  {} iteration {} skipped ({}): {}", "Error:".red(), iteration, model, kind)
}

fn print_summary(report: &RunReport, output: &std::path::Path) {
    println!();
    if report.cancelled {
        println!("{}", "Run cancelled".yellow().bold());
    }
    println!(
        "{} {} completed, {} skipped, {} critiques",
        "Summary:".green().bold(),
        report.completed.len(),
        report.skipped.len(),
        report.critique_count()
    );
    println!(
        "  {} records written to {}",
        report.records_persisted,
        output.display()
    );
    if report.persist_failures > 0 {
        println!("  {} {} snapshots not saved", "Warning:".yellow(), report.persist_failures);
    }
}

fn handle_history_command(
    output: Option<&PathBuf>,
    run: Option<&str>,
    last: Option<usize>,
    config: &Config,
) -> Result<()> {
    let path = output.cloned().unwrap_or_else(|| config.storage.output_file.clone());
    info!("Reading history from {}", path.display());

    let records = JsonRunStore::new(&path)
        .load()
        .context(format!("Failed to read {}", path.display()))?;

    if records.is_empty() {
        println!("No runs recorded in {}", path.display());
        return Ok(());
    }

    match run {
        Some(run_id) => {
            let snapshots: Vec<_> = records.iter().filter(|r| r.run_id == run_id).collect();
            if snapshots.is_empty() {
                return Err(eyre!("No run with id {} in {}", run_id, path.display()));
            }

            println!("{} {}", "Prompt:".green().bold(), snapshots[0].user_prompt);
            for record in snapshots {
                println!(
                    "\n{} {} at {}",
                    "Iteration".cyan().bold(),
                    record.iteration,
                    record.timestamp.to_rfc3339()
                );
                if let Some(turn) = record.latest_turn() {
                    let model = turn.model.as_deref().unwrap_or("-");
                    println!("{} {}\n{}", turn.role.label().bold(), model.dimmed(), turn.content);
                }
            }
        }
        None => {
            let summaries = summarize_runs(&records);
            let skip = last.map(|n| summaries.len().saturating_sub(n)).unwrap_or(0);
            for summary in &summaries[skip..] {
                let run_id = if summary.run_id.is_empty() {
                    "(unlabelled)"
                } else {
                    summary.run_id.as_str()
                };
                println!(
                    "{} {} {} records, {} critiques, last iteration {}",
                    run_id.cyan(),
                    summary.started.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    summary.records,
                    summary.critiques,
                    summary.last_iteration
                );
                println!("  {}", summary.user_prompt);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging at the configured level
    setup_logging(config.log_level.as_deref()).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_run_config_from_defaults() {
        let args = RunArgs {
            prompt: Some("what is 2+2?".to_string()),
            ..RunArgs::default()
        };
        let run = build_run_config(&args, &Config::default()).unwrap();
        assert_eq!(run.user_prompt, "what is 2+2?");
        assert_eq!(run.iterations, 3);
        assert!(run.include_reasoning);
        assert!(run.validate().is_ok());
    }

    #[test]
    fn test_cli_overrides_config() {
        let mut config = Config::default();
        config.critique.prompt = Some("from config".to_string());
        config.models.critic_b = "config-b".to_string();

        let args = RunArgs {
            iterations: Some(6),
            critic_a: Some("cli-a".to_string()),
            no_reasoning: true,
            ..RunArgs::default()
        };
        let run = build_run_config(&args, &config).unwrap();
        assert_eq!(run.user_prompt, "from config");
        assert_eq!(run.iterations, 6);
        assert_eq!(run.critic_a_model, "cli-a");
        assert_eq!(run.critic_b_model, "config-b");
        assert!(!run.include_reasoning);
    }

    #[test]
    fn test_skipped_line_names_iteration_model_and_kind() {
        colored::control::set_override(false);
        let line = skipped_line(2, "critic-a", FailureKind::RateLimited);
        assert_eq!(line, "  Error: iteration 2 skipped (critic-a): rate limited");
    }

    #[test]
    fn test_missing_prompt_is_an_error() {
        assert!(build_run_config(&RunArgs::default(), &Config::default()).is_err());
    }
}
