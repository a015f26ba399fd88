//! Chatter CLI entry point

mod cli;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result};
use chatter::auth::{generate_secret, AccessPolicy, Action, AdminKey, RoleSet, SessionToken};
use chatter::resources::ResourcePath;
use chatter::server::{ChatterServer, ChatterServerConfig};
use chatter::storage::{MemoryStore, MessageStore, PostgresConfig, PostgresStore};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let policy = load_policy(cli.policy.as_deref())?;

    match cli.command {
        Commands::Serve { bind, secret } => {
            serve(cli.database_url, bind, secret, cli.admin_key, policy).await
        }
        Commands::Token { user, role, secret } => token(user, role, secret),
        Commands::Check { role, path, verb } => check(&policy, role, &path, verb),
        Commands::Rules => rules(&policy),
        Commands::Init => init(cli.database_url).await,
        Commands::Secret => {
            println!("{}", generate_secret());
            Ok(())
        }
    }
}

fn load_policy(path: Option<&Path>) -> Result<AccessPolicy> {
    match path {
        Some(path) => AccessPolicy::load(path)
            .with_context(|| format!("Failed to load policy: {}", path.display())),
        None => Ok(AccessPolicy::chats()),
    }
}

/// Explicit URL first, then the DATABASE_URL / PG* environment
fn db_config(database_url: Option<&str>) -> Result<Option<PostgresConfig>> {
    resolve_db_config(database_url, PostgresConfig::from_env)
}

fn resolve_db_config(
    database_url: Option<&str>,
    from_env: impl FnOnce() -> Option<PostgresConfig>,
) -> Result<Option<PostgresConfig>> {
    match database_url {
        Some(url) => PostgresConfig::from_url(url)
            .context("Invalid DATABASE_URL")
            .map(Some),
        None => Ok(from_env()),
    }
}

async fn serve(
    database_url: Option<String>,
    bind: String,
    secret: String,
    admin_key: Option<String>,
    policy: AccessPolicy,
) -> Result<()> {
    let store: Arc<dyn MessageStore> = match db_config(database_url.as_deref())? {
        Some(config) => Arc::new(PostgresStore::new(config).await?),
        None => {
            warn!("No database configured, messages are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let bind_addr = bind.parse().context("Invalid bind address")?;

    let config = ChatterServerConfig {
        bind_addr,
        token_secret: secret.into_bytes(),
        admin_key: admin_key.map(AdminKey::new),
    };

    info!(rules = policy.rules().len(), "Access policy loaded");
    let server = ChatterServer::new(config, store, Arc::new(policy))?;

    info!(addr = %bind, "Starting Chatter server...");
    server.run(shutdown_signal()).await
}

fn token(user: String, roles: Vec<String>, secret: String) -> Result<()> {
    let token = SessionToken::create(user, roles, secret.as_bytes())?;

    println!("{}", token);
    println!();
    println!("User: {}", token.user_id());
    println!("Roles:");
    if token.roles().is_empty() {
        println!("  (guest)");
    } else {
        for role in token.roles() {
            println!("  {}", role);
        }
    }

    Ok(())
}

fn check(policy: &AccessPolicy, roles: Vec<String>, path: &str, action: Action) -> Result<()> {
    let resource = ResourcePath::parse(path).with_context(|| format!("Invalid path: {}", path))?;
    let roles = RoleSet::new(roles).or_guest();

    let allowed = policy.check(&roles, &resource, action);
    println!(
        "{} {} {} for [{}]",
        if allowed { "ALLOW" } else { "DENY" },
        action,
        resource,
        roles
    );

    Ok(())
}

fn rules(policy: &AccessPolicy) -> Result<()> {
    println!("Rules:");
    if policy.is_empty() {
        println!("  (none)");
    } else {
        for rule in policy.rules() {
            println!("  {}", rule);
        }
    }
    Ok(())
}

async fn init(database_url: Option<String>) -> Result<()> {
    let config = db_config(database_url.as_deref())?
        .context("No database configured: set DATABASE_URL or PGUSER and PGDATABASE")?;

    let _store = PostgresStore::new(config).await?;
    println!("Database schema initialized successfully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
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

    info!("Shutdown signal received, stopping server");
}
