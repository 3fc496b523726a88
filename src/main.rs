use group_registry::collection::{CollectionStore, LockPolicy};
use group_registry::config::ServerConfig;
use group_registry::dispatcher::Dispatcher;
use group_registry::listener::Listener;
use group_registry::persistence::{InMemoryRepository, JsonFileRepository, RecordRepository};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: group-registry-server [--bind <addr:port>] [--workers <n>] [--data-file <path>]");
        eprintln!("Environment: GROUPS_BIND, GROUPS_WORKERS, GROUPS_DATA_FILE");
        return Ok(());
    }
    let config = ServerConfig::from_env()?.apply_args(&args)?;

    // 1. Persistent store:
    let repository: Arc<dyn RecordRepository> = match &config.data_file {
        Some(path) => Arc::new(JsonFileRepository::open(path)?),
        None => {
            tracing::warn!("No data file configured, records will not survive a restart");
            Arc::new(InMemoryRepository::new())
        }
    };

    // 2. In-memory collection, loaded from the repository:
    let records = repository.query_all()?;
    tracing::info!("Loaded {} groups", records.len());
    let store = Arc::new(CollectionStore::with_records(
        records,
        LockPolicy::per_class(),
    )?);

    // 3. Dispatcher and listener:
    let dispatcher = Arc::new(Dispatcher::new(store, repository));
    let listener = Listener::bind(&config, dispatcher).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Ctrl+C received");
        let _ = shutdown_tx.send(true);
    });

    tracing::info!(
        "Serving on {} with {} workers. Press Ctrl+C to shutdown",
        listener.local_addr()?,
        config.workers
    );
    listener.run(shutdown_rx).await
}
