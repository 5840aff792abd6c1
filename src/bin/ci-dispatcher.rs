//! # CI Dispatcher CLI
//!
//! Runs the dispatcher against a single event envelope, and offers a few
//! operator commands for checking configuration before deploying it.

use anyhow::{bail, Context};
use ci_dispatcher::config::ConfigLoader;
use ci_dispatcher::logging::init_structured_logging;
use ci_dispatcher::{Cancellation, Dispatcher, EventEnvelope};
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "ci-dispatcher")]
#[command(about = "Turn infrastructure change events into ECS deployments")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Handle one event envelope and print the resulting status
    Handle {
        /// Path to the envelope JSON, or `-` for stdin
        #[arg(short, long, default_value = "-")]
        event: String,

        /// Abort the invocation after this many seconds
        #[arg(long, env = "INVOCATION_DEADLINE_SECONDS")]
        deadline_seconds: Option<u64>,
    },

    /// Load and validate configuration, then print it with secrets masked
    Validate,

    /// List configured services
    Services,

    /// Check that every configured service exists in the cluster
    Verify,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::from_env().context("Failed to load configuration")?;
    init_structured_logging(config.log_level);

    match cli.command {
        Commands::Handle {
            event,
            deadline_seconds,
        } => handle(event, deadline_seconds).await,
        Commands::Validate => {
            println!("{}", serde_json::to_string_pretty(&config.sanitized())?);
            println!("✅ Configuration is valid");
            Ok(())
        }
        Commands::Services => {
            let dispatcher = Dispatcher::from_env().await?;
            let registry = dispatcher.registry();
            for service in registry.all_identifiers() {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&registry.service_info(&service))?
                );
            }
            Ok(())
        }
        Commands::Verify => verify().await,
    }
}

async fn handle(event: String, deadline_seconds: Option<u64>) -> anyhow::Result<()> {
    let envelope = read_envelope(&event)?;
    let dispatcher = Dispatcher::from_env().await?;

    let (handle, cancellation) = Cancellation::pair();
    if let Some(seconds) = deadline_seconds {
        handle.cancel_after(Duration::from_secs(seconds));
    }

    let invocation_id = uuid::Uuid::new_v4();
    info!(invocation_id = %invocation_id, event_id = %envelope.id, "Handling event");

    let work = dispatcher.handle(&envelope, &cancellation);
    tokio::pin!(work);
    let outcome = tokio::select! {
        outcome = &mut work => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!(invocation_id = %invocation_id, "Interrupted, cancelling invocation");
            handle.cancel();
            work.await
        }
    };

    match outcome {
        Ok(status) => {
            println!("{status}");
            Ok(())
        }
        Err(e) => {
            error!(invocation_id = %invocation_id, error = %e, "Event handling failed");
            Err(e.into())
        }
    }
}

async fn verify() -> anyhow::Result<()> {
    let dispatcher = Dispatcher::from_env().await?;
    let checks = dispatcher.verify_services().await;

    let mut missing = 0;
    for check in &checks {
        if check.exists {
            println!(
                "✅ {} -> {} ({})",
                check.service,
                check.service_name,
                check.status.as_deref().unwrap_or("unknown")
            );
        } else {
            missing += 1;
            println!(
                "❌ {} -> {} {}",
                check.service,
                check.service_name,
                check.error.as_deref().unwrap_or("not found")
            );
        }
    }

    if missing > 0 {
        bail!("{missing} of {} configured services not found", checks.len());
    }
    Ok(())
}

fn read_envelope(path: &str) -> anyhow::Result<EventEnvelope> {
    let raw = if path == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read event from stdin")?;
        buffer
    } else {
        let path = PathBuf::from(path);
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read event file {}", path.display()))?
    };
    serde_json::from_str(&raw).context("Failed to parse event envelope")
}
