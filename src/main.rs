use anyhow::Context;
use clap::Parser;
use colored::*;
use github_gateway::cli::Cli;
use github_gateway::pool::{create_pool, PoolConfig, SurrealConnectionConfig};
use github_gateway::{app, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut cli = Cli::parse();

    // Override db_url if --local flag is set
    if cli.local {
        cli.db_url = "ws://localhost:8000".to_string();
        println!("{}", "Running in local mode (DB URL: ws://localhost:8000)".yellow());
    }

    println!("{}", "GitHub Gateway".bold().green());
    println!("{}\n", "=".repeat(50).dimmed());

    let connection_config = SurrealConnectionConfig {
        url: cli.db_url.clone(),
        username: cli.db_user.clone(),
        password: cli.db_pass.clone(),
        namespace: cli.db_namespace.clone(),
        database: cli.db_database.clone(),
    };
    let pool_config = PoolConfig {
        max_size: cli.db_pool_max_size,
        ..Default::default()
    };

    let db_pool = Arc::new(
        create_pool(connection_config, pool_config).context("Failed to create connection pool")?,
    );
    println!(
        "✅ Created SurrealDB connection pool with {} connections",
        db_pool.status().max_size
    );

    {
        let conn = db_pool
            .get()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to get connection from pool: {}", e))?;
        conn.init_schema().await.context("Failed to initialise schema")?;
    }

    let port = cli.port;
    let config = cli.into_config();
    if config.github_api_key.is_empty() {
        println!("{}", "⚠️  GITHUB_API_KEY is not set, upstream calls are unauthenticated".yellow());
    }

    let state = AppState::new(config, db_pool).context("Failed to build application state")?;
    let router = app(state).context("Failed to build router")?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Gateway listening on http://{}", addr);
    println!("\nPress Ctrl+C to stop the server\n");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        println!("\n🛑 Shutting down server...");
    })
    .await
    .context("Server error")?;

    println!("✅ Server stopped");
    Ok(())
}
