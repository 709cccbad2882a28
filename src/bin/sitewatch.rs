use clap::Parser;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use sitewatch::bot::{CommandRouter, run_update_loop};
use sitewatch::config::{DEFAULT_CONFIG_PATH, load_config};
use sitewatch::monitoring::{CheckerSettings, HealthChecker, HttpProber};
use sitewatch::notifications::senders::telegram::TelegramSender;
use sitewatch::notifications::{ActionTable, NotificationService};
use sitewatch::registry::TargetRegistry;
use sitewatch::remediation::{RemediationController, default_services};
use sitewatch::remote::SshExecutor;
use sitewatch::version::VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "sitewatch",
    version = VERSION,
    about = "Website monitor with Telegram alerts and SSH auto-restart"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Directory for the rolling JSON log file.
    #[arg(long, default_value = "logs")]
    log_dir: String,
}

fn init_logging(log_dir: &str) {
    // Log to a file: JSON format, daily rotation
    let file_appender = rolling::daily(log_dir, "sitewatch.log");
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    // Log to stdout: human-readable format
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    // Default to `info` level if RUST_LOG is not set.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_dir);
    info!(version = VERSION, "Starting sitewatch...");

    // Nothing starts until configuration and the registry are known-good.
    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Critical error loading configuration. Exiting.");
            return Err(e.into());
        }
    };
    let registry = match TargetRegistry::from_config(&config) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, "Configuration does not describe a valid set of targets. Exiting.");
            return Err(e.into());
        }
    };

    let services = default_services();
    let telegram = Arc::new(TelegramSender::new(
        &config.telegram.bot_token,
        &config.telegram.chat_id,
    )?);
    let actions = Arc::new(ActionTable::new(registry.servers(), &services));
    let notifications = Arc::new(NotificationService::new(telegram.clone(), actions));

    let executor = Arc::new(SshExecutor::new(Duration::from_secs(
        config.command_timeout_seconds,
    ))?);
    let controller = Arc::new(RemediationController::new(
        executor,
        notifications.clone(),
        services,
    ));

    let prober = Arc::new(HttpProber::new(Duration::from_secs(
        config.probe_timeout_seconds,
    ))?);
    let checker = Arc::new(HealthChecker::new(
        registry.clone(),
        prober,
        controller.clone(),
        notifications.clone(),
        CheckerSettings::from_config(&config),
    ));

    let router = Arc::new(CommandRouter::new(
        registry.clone(),
        checker.clone(),
        controller,
        notifications,
        telegram.default_chat_id(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let checker_handle = tokio::spawn(checker.start(shutdown_rx.clone()));
    let updates_handle = tokio::spawn(run_update_loop(telegram, router, shutdown_rx));

    info!(
        targets = registry.targets().len(),
        servers = registry.servers().len(),
        "Monitoring is running."
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal.");
    }
    info!("Shutting down...");
    if shutdown_tx.send(true).is_err() {
        warn!("All tasks already stopped before shutdown signal.");
    }

    for (name, handle) in [("health checker", checker_handle), ("update loop", updates_handle)] {
        if let Err(join_error) = handle.await {
            error!(task = name, error = ?join_error, "Task panicked during shutdown.");
        }
    }
    info!("Shutdown complete.");
    Ok(())
}
