//! Brew Tuner (brew-tuner) - Command-line entry point
//!
//! Terminal front end for the recommendation engine and the run coordinator:
//! - `recommend` / `insights`: compute locally from a dataset on disk
//! - `remote-recommend`: ask the optimizer service instead
//! - `runs`, `start`, `watch`, `submit`: drive optimizer runs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use brew_common::api::{RecommendationRequest, StartRunRequest};
use brew_common::config::{ClientConfig, ConfigResolver};
use brew_common::{Run, ScoringMethod};
use brew_tuner::coordinator::{ActivityEntry, ConnectionStatus, CoordinatorConfig, RunCoordinator};
use brew_tuner::insights;
use brew_tuner::recommend::{OptimizerPreferences, RecommendationReport, RecommendationService};
use brew_tuner::{HttpBackend, RunBackend};
use clap::{Args, Parser, Subcommand};
use tokio::signal;
use tracing::{debug, info};
use uuid::Uuid;

/// Command-line arguments for brew-tuner
#[derive(Parser, Debug)]
#[command(name = "brew-tuner")]
#[command(about = "Coffee brew recommendations and live optimizer runs")]
#[command(version)]
struct Cli {
    /// Optimizer API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Session token for the optimizer API
    #[arg(long, global = true)]
    token: Option<String>,

    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding `<prefix>data.csv` / `<prefix>meta.csv`
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Suggest the next brew from a local dataset
    Recommend {
        #[command(flatten)]
        selection: Selection,

        /// Share of the elite mean in numeric suggestions (0-1)
        #[arg(long, default_value_t = 0.5)]
        weight: f64,

        /// Repeat the best brew instead of blending
        #[arg(long)]
        best: bool,

        /// Print the backend-shaped JSON response
        #[arg(long)]
        json: bool,
    },
    /// Show optimization history and parameter importance for a local dataset
    Insights {
        #[command(flatten)]
        selection: Selection,
    },
    /// Ask the optimizer service for a recommendation
    RemoteRecommend {
        #[command(flatten)]
        selection: Selection,

        #[arg(long, default_value_t = 0.5)]
        weight: f64,

        #[arg(long)]
        best: bool,
    },
    /// List optimizer runs
    Runs,
    /// Start an optimizer run
    Start {
        #[arg(long, default_value_t = ScoringMethod::Median)]
        method: ScoringMethod,

        /// Number of trials (1-200)
        #[arg(long, default_value_t = 10)]
        trials: u32,

        /// Score columns to optimise for (comma separated)
        #[arg(long, value_delimiter = ',')]
        persons: Vec<String>,

        /// Keep following the run after it starts
        #[arg(long)]
        watch: bool,
    },
    /// Follow a run live until it finishes
    Watch { run_id: Uuid },
    /// Score the trial a run is waiting on
    Submit { run_id: Uuid, score: f64 },
}

/// Dataset and scoring selection shared by recommendation commands
#[derive(Args, Debug)]
struct Selection {
    /// Dataset file prefix, e.g. `v60.`
    #[arg(long)]
    dataset: String,

    #[arg(long, default_value_t = ScoringMethod::Median)]
    method: ScoringMethod,

    /// Persons whose scores count (comma separated, default all)
    #[arg(long, value_delimiter = ',')]
    persons: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigResolver::new()
        .with_api_url(cli.api_url.clone())
        .with_token(cli.token.clone())
        .with_config_path(cli.config.clone())
        .with_dataset_dir(cli.data_dir.clone())
        .resolve();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting brew-tuner v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    debug!(api = %config.api_base_url, data_dir = %config.dataset_dir.display(), "Configuration resolved");

    match cli.command {
        Command::Recommend {
            selection,
            weight,
            best,
            json,
        } => {
            let service = RecommendationService::new(&config.dataset_dir);
            let prefs = preferences(&selection, weight, best);
            let report = service
                .generate_for_prefix(&selection.dataset, &prefs)
                .context("Failed to compute recommendation")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report.to_response())?);
            } else {
                print_report(&report);
            }
        }
        Command::Insights { selection } => {
            let service = RecommendationService::new(&config.dataset_dir);
            let prefs = OptimizerPreferences {
                method: selection.method,
                selected_persons: selection.persons.clone(),
                ..Default::default()
            };
            let (dataset, state) = service
                .load_history(&selection.dataset, &prefs)
                .context("Failed to load brew history")?;
            println!("Brew   Objective   Best so far");
            for point in insights::optimization_history(&state) {
                println!("{:>4}   {:>9.2}   {:>11.2}", point.index, point.objective, point.best_so_far);
            }
            let kinds: Vec<_> = dataset.parameters.iter().map(|p| (p.name.clone(), p.kind)).collect();
            println!();
            println!("Parameter importance:");
            for item in insights::parameter_importance(&state, &kinds) {
                println!("  {:<16} {:.2}", item.name, item.importance);
            }
        }
        Command::RemoteRecommend { selection, weight, best } => {
            let backend = backend(&config)?;
            let request = RecommendationRequest {
                dataset_prefix: selection.dataset.clone(),
                method: selection.method,
                persons: selection.persons.clone(),
                best_only: best,
                prior_weight: weight,
            };
            let response = backend
                .fetch_recommendation(&request)
                .await
                .context("Recommendation request failed")?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Command::Runs => {
            let coordinator = coordinator(&config, false)?;
            let runs = coordinator.list_runs().await.context("Failed to list runs")?;
            if runs.is_empty() {
                println!("No optimizer runs.");
            }
            for run in &runs {
                print_run(run);
            }
        }
        Command::Start {
            method,
            trials,
            persons,
            watch,
        } => {
            let coordinator = coordinator(&config, watch)?;
            let request = StartRunRequest::new(method, trials, persons)?;
            let run = coordinator.start_run(&request).await.context("Run start failed")?;
            print_run(&run);
            if watch {
                follow(&coordinator).await;
            }
        }
        Command::Watch { run_id } => {
            if config.token.is_none() {
                bail!("Live updates need a session token (--token or BREW_TUNER_TOKEN)");
            }
            let coordinator = coordinator(&config, true)?;
            let run = coordinator.open_run(run_id).await.context("Failed to load run")?;
            print_run(&run);
            follow(&coordinator).await;
        }
        Command::Submit { run_id, score } => {
            let coordinator = coordinator(&config, false)?;
            coordinator.open_run(run_id).await.context("Failed to load run")?;
            let run = coordinator.submit_score(score).await.context("Score submission failed")?;
            print_run(&run);
        }
    }

    Ok(())
}

fn preferences(selection: &Selection, weight: f64, best_only: bool) -> OptimizerPreferences {
    OptimizerPreferences {
        method: selection.method,
        selected_persons: selection.persons.clone(),
        weight,
        best_only,
    }
}

fn backend(config: &ClientConfig) -> Result<HttpBackend> {
    HttpBackend::new(&config.api_base_url, config.token.clone()).context("Failed to create HTTP client")
}

/// Coordinator over HTTP; `live` keeps the session token for the push channel
fn coordinator(config: &ClientConfig, live: bool) -> Result<RunCoordinator> {
    let backend: Arc<dyn RunBackend> = Arc::new(backend(config)?);
    let mut coordinator_config = CoordinatorConfig::from(config);
    if !live {
        coordinator_config.token = None;
    }
    Ok(RunCoordinator::new(backend, coordinator_config))
}

/// Print activity as it arrives until the session ends or Ctrl+C
async fn follow(coordinator: &RunCoordinator) {
    let mut updates = coordinator.subscribe();
    let mut last_seen: Option<ActivityEntry> = None;
    let mut last_progress: Option<String> = None;
    let mut was_live = false;

    loop {
        let (new_entries, done) = {
            let snapshot = updates.borrow_and_update();
            // Activity is newest first
            let mut lines: Vec<String> = snapshot
                .activity
                .entries()
                .take_while(|e| Some(*e) != last_seen.as_ref())
                .map(|e| format!("[{}] {}", e.at.format("%H:%M:%S"), e.message))
                .collect();
            lines.reverse();
            last_seen = snapshot.activity.latest().cloned();

            let progress = snapshot
                .progress_label()
                .map(|p| format!("  {} ({})", p, snapshot.phase()));
            if progress.is_some() && progress != last_progress {
                lines.extend(progress.clone());
                last_progress = progress;
            }

            was_live |= snapshot.connection != ConnectionStatus::Disconnected;
            let done = was_live && snapshot.connection == ConnectionStatus::Disconnected;
            (lines, done)
        };

        for line in new_entries {
            println!("{}", line);
        }
        if done {
            break;
        }

        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, detaching");
                break;
            }
        }
    }

    coordinator.detach().await;
}

fn print_report(report: &RecommendationReport) {
    if report.is_empty() {
        println!("Not enough scored brews to recommend anything yet.");
        return;
    }
    if let Some(score) = report.top_score() {
        println!("Best logged brew scored {:.2}. Try next:", score);
    }
    for line in &report.suggested_parameters {
        let unit = line.unit.as_deref().unwrap_or("");
        let marker = if line.fixed { " (fixed)" } else { "" };
        println!("  {:<16} {} {}{}", line.name, line.value, unit, marker);
    }
}

fn print_run(run: &Run) {
    let best = run
        .best_score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}  {:<8}  {}/{} trials  best {}  method {}",
        run.id, run.status.to_string(), run.trial_count, run.n_trials, best, run.method
    );
    if let Some(trial) = run.awaiting_score() {
        println!("  Trial {} waiting for a score:", trial.trial_number);
        for (name, value) in &trial.parameters {
            println!("    {:<16} {}", name, value);
        }
    }
}
