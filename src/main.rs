use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use analytics_consumer::aggregator::MetricsAggregator;
use analytics_consumer::config::Config;
use analytics_consumer::consumer::StreamWorker;
use analytics_consumer::reporter;
use analytics_consumer::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration")?;
    let metrics = Arc::new(MetricsAggregator::new(config.window_sec));
    let cancel = CancellationToken::new();

    let worker = StreamWorker::new(&config, Arc::clone(&metrics), cancel.clone())
        .context("building kafka consumer")?;
    let mut worker_handle = tokio::spawn(worker.run());

    let server_handle = tokio::spawn(server::serve(
        AppState {
            metrics: Arc::clone(&metrics),
        },
        config.http_host.clone(),
        config.http_port,
        cancel.clone(),
    ));

    let reporter_handle = (config.report_interval_sec > 0).then(|| {
        tokio::spawn(reporter::run(
            Arc::clone(&metrics),
            config.report_interval_sec,
            cancel.clone(),
        ))
    });

    tracing::info!(
        order_topic = %config.order_topic,
        inventory_topic = %config.inventory_topic,
        bind = %format!("{}:{}", config.http_host, config.http_port),
        window_seconds = config.window_sec,
        static_member = config.group_instance_id.as_deref().unwrap_or("disabled"),
        "analytics consumer online"
    );

    let worker_result = tokio::select! {
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
            cancel.cancel();
            worker_handle.await?
        }
        result = &mut worker_handle => {
            // Worker exited on its own (fatal bus error); take the rest of
            // the stack down with it.
            cancel.cancel();
            result?
        }
    };

    server_handle.await??;
    if let Some(handle) = reporter_handle {
        handle.await?;
    }
    worker_result.context("stream worker failed")?;

    tracing::info!("analytics consumer stopped");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
