use clap::Parser;
use multivec_core::config;
use multivec_core::resolver::ResolverDefaults;
use multivec_core::storage::{CollectionOptions, Database};
use multivec_server::api::create_router;
use multivec_server::api::handlers::AppState;
use multivec_server::api::metrics;
use multivec_server::executor::TokioBuildExecutor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "multivec", about = "Vector collections with named vector spaces")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "MULTIVEC_PORT", default_value_t = config::DEFAULT_PORT)]
    port: u16,

    /// Concurrent graph builds
    #[arg(long, env = "MULTIVEC_BUILD_WORKERS", default_value_t = config::DEFAULT_BUILD_WORKERS)]
    build_workers: usize,

    /// Segments per collection
    #[arg(long, env = "MULTIVEC_SEGMENTS", default_value_t = config::DEFAULT_SEGMENT_NUMBER)]
    segments: usize,

    /// Directory for full-precision vectors moved out of RAM (system temp dir if unset)
    #[arg(long, env = "MULTIVEC_SPILL_DIR")]
    spill_dir: Option<PathBuf>,

    /// Indexing threshold for collections that do not set one (0 disables graph indexing)
    #[arg(long, env = "MULTIVEC_INDEXING_THRESHOLD")]
    indexing_threshold: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("multivec_server=info".parse()?)
                .add_directive("multivec_core=info".parse()?),
        )
        .init();

    let args = Args::parse();

    if args.port == 0 {
        eprintln!("Error: port must be > 0");
        std::process::exit(1);
    }
    if args.segments == 0 || args.segments > config::MAX_SEGMENT_NUMBER {
        eprintln!(
            "Error: segments must be between 1 and {}",
            config::MAX_SEGMENT_NUMBER
        );
        std::process::exit(1);
    }
    if let Some(dir) = &args.spill_dir {
        std::fs::create_dir_all(dir)?;
    }

    let prometheus_handle =
        metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    let executor = Arc::new(TokioBuildExecutor::new(args.build_workers));
    let db = Database::with_options(
        executor.clone(),
        ResolverDefaults {
            indexing_threshold: args.indexing_threshold,
            ..ResolverDefaults::default()
        },
        CollectionOptions {
            segment_number: args.segments,
            spill_dir: args.spill_dir.clone(),
        },
    );

    let app = create_router(AppState::new(db.clone(), prometheus_handle));
    let addr = format!("0.0.0.0:{}", args.port);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = args.port,
        build_workers = args.build_workers,
        segments = args.segments,
        spill_dir = ?args.spill_dir,
        "multivec ready"
    );

    let metrics_db = db.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15));
        loop {
            interval.tick().await;
            metrics::update_collection_metrics(&metrics_db);
        }
    });

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    shutdown(&db, &executor);
    Ok(())
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }

    tracing::info!("Shutting down gracefully, draining in-flight requests...");
}

/// Stop accepting builds and cancel the running ones. The runtime waits for
/// blocking build tasks on drop, and cancelled builds stop at their next check.
fn shutdown(db: &Database, executor: &TokioBuildExecutor) {
    executor.close();
    for name in db.list_collections() {
        if let Some(collection) = db.get_collection(&name) {
            collection.cancel_builds();
        }
    }
    tracing::info!("Index builds cancelled, shutting down");
}
