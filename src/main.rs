use anyhow::Context;
use clap::Parser;
use org_chart::utils::{logger, validation::Validate};
use org_chart::{
    AppConfig, DepartmentEngine, DepartmentRepository, InMemoryRepository, ServerCli, StorageKind,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = ServerCli::parse();

    let config = match AppConfig::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {}", e);
            eprintln!("💡 建議: {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("🚀 Starting org-chart server");
    tracing::debug!(
        storage = ?config.storage,
        bind = %config.bind_address(),
        request_timeout_secs = config.request_timeout_secs,
        "effective configuration"
    );

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    match config.storage {
        StorageKind::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on shutdown");
            serve(InMemoryRepository::new(), &config).await
        }
        StorageKind::Postgres => serve_postgres(&config).await,
    }
}

#[cfg(feature = "postgres")]
async fn serve_postgres(config: &AppConfig) -> anyhow::Result<()> {
    let url = config
        .database_url
        .as_deref()
        .context("database url is required for postgres storage")?;

    let repository = org_chart::PgRepository::connect(
        url,
        config.max_connections,
        config.acquire_timeout(),
    )
    .await
    .context("failed to connect to the database")?;
    tracing::info!("✅ Connected to database");

    if config.run_migrations {
        repository
            .migrate()
            .await
            .context("failed to apply database schema")?;
    }

    serve(repository, config).await
}

#[cfg(not(feature = "postgres"))]
async fn serve_postgres(_config: &AppConfig) -> anyhow::Result<()> {
    anyhow::bail!("postgres storage requires the `postgres` feature; use --storage memory")
}

async fn serve<R: DepartmentRepository + 'static>(
    repository: R,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let engine = Arc::new(DepartmentEngine::new(repository));
    let app = org_chart::app(engine, config.request_timeout());

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {}", address))?;
    tracing::info!("📡 Listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    tracing::info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
