mod config;
mod database;
mod notifications;
mod pool;
mod retention;
mod validation;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use uuid::Uuid;
use vigil::{CycleExecutor, HttpProbe, Scheduler};

use config::Config;
use database::LibsqlRepository;
use notifications::MailRelayGateway;
use retention::{RetentionCleanup, RetentionPolicy};

#[derive(Parser, Debug)]
#[command(name = "vigil")]
#[command(about = "Periodic uptime checks with email alerts on up/down transitions", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to the config file (defaults to ~/.config/vigil/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check every active target periodically until interrupted
    Run,

    /// Run a single check cycle and print its summary
    Once,

    /// Register a user who owns targets and receives alerts
    AddUser {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,
    },

    /// Register a URL to monitor
    AddTarget {
        /// Id of the owning user
        #[arg(long)]
        owner: Uuid,

        #[arg(long)]
        name: String,

        #[arg(long)]
        url: String,
    },

    /// Stop or resume monitoring a target
    SetActive {
        #[arg(long)]
        target: Uuid,

        #[arg(long, action = clap::ArgAction::Set)]
        active: bool,
    },

    /// Stop monitoring a target and delete its check history
    RemoveTarget {
        #[arg(long)]
        target: Uuid,
    },

    /// List targets with their status and latest check
    List,

    /// Show the most recent checks of a target, newest first
    History {
        #[arg(long)]
        target: Uuid,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    logger::init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load config")?;

    let pool = pool::open_local(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path.display()))?;
    database::initialize_database(&pool).await?;
    let repository = Arc::new(LibsqlRepository::new(pool));

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config, repository).await,
        Commands::Once => once(&config, repository).await,
        Commands::AddUser { name, email } => {
            validation::validate_email(&email)?;
            let user = repository.create_user(&name, &email).await?;
            println!("Created user {} ({})", user.id, user.email);
            Ok(())
        }
        Commands::AddTarget { owner, name, url } => {
            let target = repository.create_target(owner, &name, &url).await?;
            println!("Created target {} ({})", target.id, target.url);
            Ok(())
        }
        Commands::SetActive { target, active } => {
            repository.set_active(target, active).await?;
            if let Some(target) = repository.get_target(target).await? {
                println!("Target '{}' is now {}", target.name, if target.active { "active" } else { "inactive" });
            }
            Ok(())
        }
        Commands::RemoveTarget { target } => {
            let checks = repository.delete_target(target).await?;
            println!("Removed target {} and {} checks", target, checks);
            Ok(())
        }
        Commands::List => list(&repository).await,
        Commands::History { target, limit } => history(&repository, target, limit).await,
    }
}

fn build_executor(config: &Config, repository: Arc<LibsqlRepository>) -> Result<CycleExecutor> {
    let gateway = Arc::new(MailRelayGateway::new(config.notifications.credentials())?);
    if !gateway.is_configured() {
        info!("Running without email notifications, transitions are only logged");
    }
    let probe = Arc::new(HttpProbe::new(config.monitor.probe_timeout())?);

    Ok(CycleExecutor::new(repository.clone(), repository.clone(), repository, gateway, probe)
        .with_probe_timeout(config.monitor.probe_timeout())
        .with_max_concurrent_probes(config.monitor.max_concurrent_probes))
}

async fn run(config: Config, repository: Arc<LibsqlRepository>) -> Result<()> {
    info!("Starting vigil with config:\n{}", config);

    let cleanup = RetentionCleanup::new(repository.clone(), RetentionPolicy::from(&config.retention))
        .start_periodic_cleanup();

    let executor = build_executor(&config, repository)?;
    let scheduler = Scheduler::new(executor, config.monitor.check_interval()).start();

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down, waiting for the running check cycle to finish");
    scheduler.stop().await;
    cleanup.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn once(config: &Config, repository: Arc<LibsqlRepository>) -> Result<()> {
    let executor = build_executor(config, repository)?;
    let report = executor.run_cycle().await?;

    println!(
        "{} targets checked in {:?}: {} up, {} down, {} transitions, {} store failures",
        report.targets, report.elapsed, report.up, report.down, report.transitions, report.store_failures
    );
    Ok(())
}

async fn list(repository: &LibsqlRepository) -> Result<()> {
    let summaries = repository.list_summaries().await?;
    if summaries.is_empty() {
        println!("No targets registered");
        return Ok(());
    }

    for summary in summaries {
        let target = &summary.target;
        let last = match &summary.last_check {
            Some(check) => format!(
                "last check {} (code {}, {} ms)",
                check.checked_at.format("%Y-%m-%d %H:%M:%S"),
                check.status_code,
                check.latency_ms
            ),
            None => "never checked".to_string(),
        };
        println!(
            "{} {:<4} {}{} {} <{}>: {}",
            target.id,
            target.status.to_string(),
            target.name,
            if target.active { "" } else { " (inactive)" },
            target.url,
            target.owner_id,
            last
        );
    }
    Ok(())
}

async fn history(repository: &LibsqlRepository, target_id: Uuid, limit: usize) -> Result<()> {
    let target = repository
        .get_target(target_id)
        .await?
        .with_context(|| format!("No target with id {}", target_id))?;

    let checks = repository.recent_checks(target_id, limit).await?;
    println!("{} ({}), currently {}", target.name, target.url, target.status);
    if checks.is_empty() {
        println!("  never checked");
        return Ok(());
    }

    for check in checks {
        println!(
            "  {} {:<4} code {:>3} {:>6} ms",
            check.checked_at.format("%Y-%m-%d %H:%M:%S"),
            check.status().to_string(),
            check.status_code,
            check.latency_ms
        );
    }
    Ok(())
}
