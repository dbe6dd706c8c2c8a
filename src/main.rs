//! HackSpark API server
//!
//! `hackspark serve` runs the HTTP API; the other subcommands are the operational
//! collaborators the server relies on (expired-session purge, account suspension).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hackspark_backend::{
    auth::{models::AccountStatus, SessionStore, UserStore},
    config::{Config, Environment},
    create_router, AppState, Database,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "hackspark")]
#[command(version, about = "Project sharing API with session auth and consistent counters")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Overrides PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Delete session rows whose expiry has passed
    PurgeSessions,
    /// Activate or suspend an account
    SetStatus {
        email: String,
        #[arg(value_parser = parse_status)]
        status: AccountStatus,
    },
}

fn parse_status(raw: &str) -> Result<AccountStatus, String> {
    AccountStatus::parse(raw).ok_or_else(|| format!("expected active or suspended, got {raw}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env().context("Invalid configuration")?;
    init_tracing(&config);

    let db = Database::open(&config.database_path)?;

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, db, port).await,
        Command::PurgeSessions => {
            let purged = SessionStore::new(db, config.session_policy).purge_expired()?;
            println!("Purged {purged} expired sessions");
            Ok(())
        }
        Command::SetStatus { email, status } => {
            let users = UserStore::new(db);
            let identity = users
                .get_by_email(&email)?
                .with_context(|| format!("No account for {email}"))?;
            users.set_status(&identity.id, status)?;
            println!("{} is now {}", identity.username, status.as_str());
            Ok(())
        }
    }
}

async fn serve(config: Config, db: Database, port: Option<u16>) -> Result<()> {
    let port = port.unwrap_or(config.port);
    let state = AppState::new(db, &config);
    let app = create_router(state, &config);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(
        %addr,
        environment = ?config.environment,
        counter_pairing = config.counter_pairing.as_str(),
        "API server listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}

/// Initialize tracing; JSON lines in production, human-readable otherwise.
fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "hackspark_backend={level},hackspark={level},tower_http=info",
            level = config.log_level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if config.environment == Environment::Production {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
