mod api;
mod config;
mod dout1;
mod error;
mod listener;
mod repository;
mod repository_memory;
mod repository_sqlite;
mod session;

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use config::Config;
use repository::Repository;
use repository_sqlite::SqliteRepository;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Arc::new(Config::from_env());

    // `_log_guard` flushes the non-blocking file appender on drop; kept alive
    // for the whole process when `LOG_PATH` is set. Stdout logging is always
    // on regardless, matching the teacher's Rust backend, which never gates
    // its own stdout logs behind a config flag.
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "telematics_gateway=info".into())
    };
    let _log_guard = if let Some(log_path) = &config.log_path {
        let directory = std::path::Path::new(log_path)
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| std::path::Path::new("."));
        let file_name = std::path::Path::new(log_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "gateway.log".to_string());
        let file_appender = tracing_appender::rolling::never(directory, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        tracing_subscriber::fmt()
            .with_env_filter(env_filter())
            .with_writer(std::io::stdout.and(non_blocking))
            .init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter()).init();
        None
    };

    info!("telematics-gateway v{} starting", env!("CARGO_PKG_VERSION"));

    let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::connect(&config.db_path).await?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let http_addr = config.http_addr();
    let http_app = api::router(repo.clone());
    let http_listener = tokio::net::TcpListener::bind(&http_addr).await?;
    info!("operator http api listening on {http_addr}");
    let http_server = tokio::spawn(async move {
        axum::serve(http_listener, http_app).await.unwrap();
    });

    let tcp_task = tokio::spawn(listener::run(config.clone(), repo.clone(), shutdown_rx));

    signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = tcp_task.await;
    http_server.abort();

    Ok(())
}
