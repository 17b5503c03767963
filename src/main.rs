//! dxfeed Streamer - trade bar aggregator
//!
//! Subscribes trades for the configured symbols, folds them into OHLCV bars
//! and logs every finalized bar until the run duration elapses.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dxfeed_streamer::{
    BarManager, EventType, StaticTokenProvider, StreamMetrics, Streamer, StreamerConfig,
    StreamerError,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    info!("Starting dxfeed streamer");

    let config = StreamerConfig::load()?;
    info!(
        symbols = ?config.symbols,
        timeframes = ?config.timeframes,
        "Configuration loaded"
    );

    let metrics = Arc::new(StreamMetrics::new()?);

    let health_metrics = Arc::clone(&metrics);
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = start_health_server(health_metrics, health_port).await {
            warn!(error = %e, "Health server error");
        }
    });

    let mut bars = BarManager::with_metrics(Arc::clone(&metrics));
    for symbol in &config.symbols {
        for timeframe in &config.timeframes {
            bars.register(symbol, timeframe)?;
        }
    }

    let tokens = StaticTokenProvider::new(&config.token, &config.url);
    let mut streamer = Streamer::open(&config, &tokens).await?;
    streamer.attach_metrics(Arc::clone(&metrics));
    streamer.subscribe(EventType::Trade, &config.symbols).await?;

    // Stop listening once the run duration is over
    let cancel = streamer.cancellation_token();
    let run_duration = config.run_duration;
    tokio::spawn(async move {
        tokio::time::sleep(run_duration).await;
        info!(?run_duration, "Run duration elapsed, stopping");
        cancel.cancel();
    });

    while let Some(event) = streamer.listen().next_event().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "Event stream failed");
                break;
            }
        };

        match bars.apply(&event) {
            Ok(finalized) => {
                for bar in finalized {
                    info!(
                        symbol = %bar.symbol,
                        open = %bar.open,
                        high = %bar.high,
                        low = %bar.low,
                        close = %bar.close,
                        volume = ?bar.volume,
                        ticks = bar.tick_count,
                        timestamp = bar.timestamp,
                        "Bar"
                    );
                }
            }
            Err(StreamerError::MissingPrice { symbol }) => {
                warn!(symbol = %symbol, "Trade without price");
            }
            Err(StreamerError::ParseError(reason)) => {
                warn!(reason = %reason, "Trade skipped");
            }
            Err(e) => return Err(e.into()),
        }
    }

    streamer.close().await?;
    info!("Streamer stopped");
    Ok(())
}

/// Start HTTP server for health checks and metrics
async fn start_health_server(metrics: Arc<StreamMetrics>, port: u16) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(render_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(addr = %addr, "Starting health check server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "component": "dxfeed-streamer",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn render_metrics(
    State(metrics): State<Arc<StreamMetrics>>,
) -> Result<String, (StatusCode, String)> {
    metrics
        .render()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
