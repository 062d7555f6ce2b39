use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use linkmetur_api::app::{self, Components};
use linkmetur_api::auth::TokenIssuer;
use linkmetur_api::config;
use linkmetur_api::types::{RoleLevel, TenantId};

#[derive(Parser)]
#[command(name = "linkmetur-api")]
#[command(about = "LinkMeTur marketplace API server")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP server (default)")]
    Serve {
        #[arg(long, help = "Listen port (overrides PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Mint a bearer token with the configured secret")]
    Token {
        #[arg(long, help = "Tenant (corporation) id")]
        tenant: Uuid,
        #[arg(long, help = "User id (random when omitted)")]
        user: Option<Uuid>,
        #[arg(long, default_value_t = 1, help = "Role level: 1 viewer, 2 member, 3 manager, 4 admin")]
        role: u8,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, PORT, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("linkmetur_api=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve { port: None }) {
        Commands::Serve { port } => serve(port).await,
        Commands::Token { tenant, user, role } => {
            let issuer = TokenIssuer::from_config(&config::config().security)
                .context("cannot mint tokens without JWT_SECRET")?;
            let token = issuer.issue(
                user.unwrap_or_else(Uuid::new_v4),
                TenantId(tenant),
                RoleLevel(role),
            )?;
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let config = config::config().clone();
    tracing::info!("Starting {} in {:?} mode", config.server.service_name, config.environment);

    let components = Components::in_memory();
    let sweeper = app::spawn_sweeper(&config, &components);
    let port = port.unwrap_or(config.server.port);
    let router = app::build(config, components).context("invalid security configuration")?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
