// src/main.rs
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use dns_checker::{
    checks::build_checks,
    config::{self, Config, LoggingConfig},
    context::RootContext,
    metrics::{MetricSink, MetricsRegistry, VERSION},
    pipeline,
    pool::Dispatcher,
    scheduler::Scheduler,
    server::{MetricsHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args().nth(1);
    let raw = config::load_settings(config_path.as_deref())?;

    init_tracing(&LoggingConfig::from_raw(&raw)?)?;
    if let Some(path) = &config_path {
        info!("Loaded configuration from: {}", path);
    }

    let config = Config::from_raw(raw, config::extra_targets())?;
    info!(
        interval = ?config.schedule.interval,
        workers = config.workers,
        version = VERSION,
        "Starting dns-checker"
    );

    let registry = Arc::new(MetricsRegistry::new(&config.metrics)?);
    let sink: Arc<dyn MetricSink> = registry.collector();
    let checks = build_checks(&config.checks, sink)?;

    let root = RootContext::new();

    let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
    let metrics_server = ServerBuilder::new(metrics_addr)
        .with_handler(MetricsHandler::new(registry, &config.metrics.path))
        .bind()
        .await?;
    info!(
        "Metrics server listening on http://{}{}",
        metrics_addr, config.metrics.path
    );
    let server_ctx = root.context();
    tokio::spawn(async move {
        if let Err(e) = metrics_server.serve(server_ctx).await {
            error!("Metrics server error: {}", e);
        }
    });

    let (results_tx, results) = pipeline::channel(config.result_queue_size);
    tokio::spawn(results.run(root.context()));

    let dispatcher = Dispatcher::start(config.workers, results_tx, config.checks.debug_duration);
    let scheduler = Scheduler::new(config.targets, checks, config.schedule);
    scheduler.run(&root, &dispatcher, shutdown_signal()).await;

    dispatcher.stop();
    info!("Shutting down");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(logging.level).into())
        .from_env()?
        .add_directive("hyper=info".parse()?);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
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
                warn!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
