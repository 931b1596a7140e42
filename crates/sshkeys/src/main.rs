use anyhow::{Context, Result};
use clap::Parser;
use sshkeys_cli::{Cli, Command};
use sshkeys_config::{AppConfig, AppConfigLayer, AppPaths, ConfigManager};
use sshkeys_core::Reconciler;
use sshkeys_keychain::{AgentManager, IdentityAgent};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut paths = AppPaths::new()?;
    if let Some(config) = cli.config.clone() {
        paths = paths.with_config_file(config);
    }
    let config_manager = ConfigManager::new(paths.clone());
    let overrides = AppConfigLayer::from_overrides(cli.root.clone(), cli.socket.clone());
    let config = config_manager.load(std::env::current_dir().ok().as_deref(), Some(overrides))?;
    let interactive = cli.command.is_none();
    let _log_guard = init_logging(&config, &paths, config.logging.stdout && !interactive)?;

    match cli.command {
        Some(Command::Config { init }) => {
            if init {
                config_manager.save_default()?;
                println!("config initialized at {}", paths.config_file.display());
            } else {
                println!("{}", paths.config_file.display());
            }
        }
        Some(Command::List) => {
            list_keys(&config).await?;
        }
        None => {
            sshkeys_tui::run(config).await?;
        }
    }

    Ok(())
}

fn init_logging(
    config: &AppConfig,
    paths: &AppPaths,
    enable_stdout: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    std::fs::create_dir_all(&paths.log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&paths.log_dir, "sshkeys.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    let file_layer = if config.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed()
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer);

    if enable_stdout {
        let stdout_layer = if config.logging.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };
        tracing::subscriber::set_global_default(subscriber.with(stdout_layer))?;
    } else {
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(guard)
}

/// Non-interactive listing: scan and list run side by side, then one
/// line per key is printed with `*` marking keys the agent holds.
async fn list_keys(config: &AppConfig) -> Result<()> {
    let root = config.keys_root();
    let socket = config.agent.socket.clone();
    let scan = tokio::task::spawn_blocking(move || sshkeys_keychain::scan(&root));
    let agent = async {
        let mut agent = AgentManager::connect(socket.as_deref()).await?;
        agent.list().await
    };
    let (keys, identities) = tokio::join!(scan, agent);
    let keys = keys?.context("failed to load private keys")?;
    let identities = identities.context("failed to get list of ssh keys from agent")?;

    let reconciler = Reconciler::new(keys, identities);
    for key in reconciler.keys() {
        let marker = if key.loaded { "*" } else { " " };
        println!("{marker} {:<20} {}", key.format, key);
    }
    Ok(())
}
