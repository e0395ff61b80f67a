//! Main CLI application structure

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::output::{write_step_outputs, Output, OutputFormat};
use crate::batch::{BatchReport, BatchRunner};
use crate::config::{ActionInputs, Config};
use crate::domain::{BatchSpec, MilestoneMap};
use crate::github::{GitHubClient, InMemoryTracker, RepoRef, StoredIssue};
use crate::render::TemplateContext;

#[derive(Parser)]
#[command(name = "issue-batch")]
#[command(author, version, about = "Bulk-create GitHub issues in dependency order")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the issues in the repository (action entry point)
    Run(ActionInputs),

    /// Preview the batch against an empty in-memory repository
    Plan(ActionInputs),
}

/// Logs go to stderr so stdout only carries results
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn running_in_actions() -> bool {
    std::env::var("GITHUB_ACTIONS").is_ok_and(|value| value == "true")
}

/// Main entry point for the CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = Output::new(cli.format, cli.verbose).with_annotations(running_in_actions());

    output.verbose("issue-batch starting");

    let result = match &cli.command {
        Commands::Run(inputs) => run_batch(inputs, &output).await,
        Commands::Plan(inputs) => plan_batch(inputs, &output).await,
    };

    if let Err(e) = &result {
        output.annotate_error(&format!("{e:#}"));
    }
    result
}

async fn run_batch(inputs: &ActionInputs, output: &Output) -> Result<()> {
    let config = Config::from_inputs(inputs).context("Failed to load configuration")?;
    let repo = config.require_repo()?.clone();
    output.verbose_ctx("run", &format!("Target repository: {repo} via {}", config.api_url));

    let client = GitHubClient::new(config.api_url.as_str(), config.token.clone(), repo.clone());
    let context = TemplateContext::capture(repo).await;
    let runner = BatchRunner::new(&client, context, config.batch.clone());

    let report = match runner.run_file(config.document.as_deref()).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(phase = %e.phase(), error = %e, "Batch failed");
            return Err(e.into());
        }
    };

    if let Some(path) = &config.output_file {
        write_step_outputs(path, &report)
            .with_context(|| format!("Failed to write step outputs: {}", path.display()))?;
    }

    print_report(output, &report);
    Ok(())
}

fn print_report(output: &Output, report: &BatchReport) {
    if output.is_json() {
        output.data(report);
        return;
    }

    for issue in &report.issues {
        let outcome = issue.outcome.to_string();
        let number = format!("#{}", issue.number);
        output.row(&[outcome.as_str(), number.as_str(), issue.title.as_str(), issue.html_url.as_str()]);
    }
    output.success(&format!("{} issue(s) processed", report.issues.len()));
}

/// Dry-run result: what `run` would create in an empty repository
#[derive(Debug, Serialize)]
struct Plan {
    order: Vec<String>,
    milestones: MilestoneMap,
    issues: Vec<StoredIssue>,
}

async fn plan_batch(inputs: &ActionInputs, output: &Output) -> Result<()> {
    let config = Config::from_inputs(inputs).context("Failed to load configuration")?;
    let repo = config
        .repo
        .clone()
        .unwrap_or_else(|| RepoRef::new("owner", "repo"));

    let spec = BatchSpec::load(config.document.as_deref()).await?;
    output.verbose_ctx(
        "plan",
        &format!("Loaded {} issue(s), {} milestone(s)", spec.issues.len(), spec.milestones.len()),
    );

    let tracker = InMemoryTracker::new(repo.clone());
    let context = TemplateContext::capture(repo).await;
    let runner = BatchRunner::new(&tracker, context, config.batch.clone());

    let report = runner.run(&spec).await?;

    let plan = Plan {
        order: report.issues.iter().map(|issue| issue.title.clone()).collect(),
        milestones: report.milestones,
        issues: tracker.issues(),
    };

    if output.is_json() {
        output.data(&plan);
        return Ok(());
    }

    output.success("Creation order:");
    for (position, title) in plan.order.iter().enumerate() {
        let position = format!("  {}.", position + 1);
        output.row(&[position.as_str(), title.as_str()]);
    }

    for issue in &plan.issues {
        output.blank();
        let number = format!("#{}", issue.number);
        output.row(&[number.as_str(), issue.title.as_str()]);
        if !issue.labels.is_empty() {
            output.row(&["labels:", issue.labels.join(", ").as_str()]);
        }
        if !issue.assignees.is_empty() {
            output.row(&["assignees:", issue.assignees.join(", ").as_str()]);
        }
        if let Some(milestone) = issue.milestone {
            output.row(&["milestone:", milestone.to_string().as_str()]);
        }
        if !issue.body.is_empty() {
            output.blank();
            output.row(&[issue.body.as_str()]);
        }
    }

    Ok(())
}
