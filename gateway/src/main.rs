//! GlobalBank gateway binary
//!
//! `serve` runs the HTTP API; `provision` creates a web account out of band.

use anyhow::Context;
use clap::{Parser, Subcommand};
use globalbank_auth::{provision_account, spawn_session_sweeper, SessionAuthenticator};
use globalbank_gateway::{
    create_router,
    logging::{init_logging, LogFormat},
    plugin_auth::ServerKeys,
    AppState, GatewayConfig,
};
use globalbank_ledger::{open_store, Ledger, PlayerId, Role, ServerId};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;

/// GlobalBank currency gateway
#[derive(Parser, Debug)]
#[command(name = "globalbank-gateway", version, propagate_version = true)]
struct Cli {
    /// Path to the gateway configuration file (TOML)
    #[arg(long, short = 'c', env = "GLOBALBANK_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP API
    Serve,
    /// Create a web account
    Provision(ProvisionArgs),
}

#[derive(Parser, Debug)]
struct ProvisionArgs {
    /// Login name
    #[arg(long)]
    username: String,

    /// Password
    #[arg(long, env = "GLOBALBANK_PROVISION_PASSWORD")]
    password: String,

    /// admin, owner or player
    #[arg(long)]
    role: String,

    /// Bound server (owners only)
    #[arg(long)]
    server_id: Option<String>,

    /// Linked in-game player (players)
    #[arg(long)]
    player_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = GatewayConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve => {
            init_logging(&config.logging.level, config.logging.format);
            serve(config).await
        }
        Commands::Provision(args) => {
            init_logging("warn", LogFormat::Pretty);
            provision(config, args)
        }
    }
}

async fn serve(config: GatewayConfig) -> anyhow::Result<()> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %config.ledger.data_dir.display(),
        "Starting GlobalBank gateway"
    );

    let store = open_store(&config.ledger).context("opening ledger store")?;
    let ledger = Ledger::open(store.ledger_store(), &config.ledger).await?;

    let authenticator = Arc::new(SessionAuthenticator::new(
        store.account_store(),
        chrono::Duration::seconds(config.auth.session_ttl_secs),
    ));
    authenticator.restore_sessions()?;

    let sweeper = (config.auth.sweep_interval_secs > 0).then(|| {
        spawn_session_sweeper(
            authenticator.clone(),
            std::time::Duration::from_secs(config.auth.sweep_interval_secs),
        )
    });

    let server_keys = ServerKeys::from_config(&config.plugins.server_keys);
    if server_keys.is_empty() {
        tracing::warn!("No plugin server keys configured; every plugin call will be rejected");
    }

    let app = create_router(AppState {
        ledger: ledger.clone(),
        auth: authenticator,
        server_keys: Arc::new(server_keys),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    ledger.shutdown().await?;
    tracing::info!("Gateway stopped");
    Ok(())
}

fn provision(config: GatewayConfig, args: ProvisionArgs) -> anyhow::Result<()> {
    let role = Role::from(args.role.to_lowercase());
    let server_id = args.server_id.map(ServerId::parse).transpose()?;
    let player_id = args.player_id.map(PlayerId::parse).transpose()?;

    let store = open_store(&config.ledger).context("opening ledger store")?;
    let account = provision_account(
        store.account_store().as_ref(),
        &args.username,
        &args.password,
        role,
        server_id,
        player_id,
    )?;

    println!("provisioned {} ({})", account.username, account.role);
    Ok(())
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
