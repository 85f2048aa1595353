// Sentinel Server - HTTP front end for the Hydro Sentinel engine
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Sentinel Server
//!
//! Runs the alert engine over a snapshot feed and serves the dashboard view
//! model, alert history and Prometheus metrics.
//!
//! ## Usage
//!
//! ```bash
//! # Replay a recorded feed at 10x speed
//! sentinel-server --feed bathroom.jsonl --speed 10.0
//!
//! # Replay a generated scenario in a loop
//! sentinel-server --scenario slow_leak --loop-replay
//!
//! # No replay: snapshots arrive through POST /ingest
//! sentinel-server --config sentinel.json --port 9200
//! ```

mod metrics;
mod replay;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use clap::Parser;
use hydro_sentinel::{
    AlertEvent, AlertLog, AlertState, ConfigError, DashboardView, FeedError, FeedHealth,
    FeedPublisher, MemorySource, RawFields, SentinelConfig, SentinelEngine, SubscribeError,
    ViewProjector,
};
use metrics::{encode_metrics, update_feed_health, update_from_view};
use replay::{FeedInfo, ReplayConfig, ReplayEngine, ReplayError, ReplayState};
use sentinel_testdata::{FeedConfig as GeneratorConfig, FeedScenario};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Hydro Sentinel server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "9200")]
    port: u16,

    /// Engine configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-lines feed to replay
    #[arg(short, long, conflicts_with = "scenario")]
    feed: Option<PathBuf>,

    /// Synthetic scenario to replay (steady_use, slow_leak, tds_spike, noisy_feed)
    #[arg(long)]
    scenario: Option<FeedScenario>,

    /// Number of samples for a generated scenario
    #[arg(long, default_value = "120")]
    samples: usize,

    /// Seed for a generated scenario
    #[arg(long)]
    seed: Option<u64>,

    /// Interval between replayed samples in milliseconds at 1x speed
    #[arg(long, default_value = "5000")]
    interval_ms: u64,

    /// Replay speed multiplier (1.0 = real-time)
    #[arg(short, long, default_value = "1.0")]
    speed: f64,

    /// Loop the replay when it reaches the end
    #[arg(short, long)]
    loop_replay: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Server errors.
#[derive(Debug, thiserror::Error)]
enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("Subscription error: {0}")]
    Subscribe(#[from] SubscribeError),

    #[error("Snapshot feed closed before the engine started")]
    FeedClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state shared across handlers.
struct AppState {
    /// View produced by the most recent snapshot.
    view: RwLock<DashboardView>,
    /// Alert transitions seen by the server.
    history: RwLock<AlertLog>,
    projector: ViewProjector,
    publisher: FeedPublisher,
    engine_running: AtomicBool,
    replay_state: Option<Arc<ReplayState>>,
    feed_info: Option<FeedInfo>,
    start_time: std::time::Instant,
}

impl AppState {
    /// Latest view with feed health evaluated now.
    async fn current_view(&self) -> DashboardView {
        self.view
            .read()
            .await
            .refreshed(Utc::now(), self.projector.stale_after())
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        };
        EnvFilter::from_default_env().add_directive(level.into())
    });

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Sentinel Server v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = serve(args).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn serve(args: Args) -> Result<(), ServerError> {
    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            SentinelConfig::from_json_file(path)?
        }
        None => SentinelConfig::default(),
    };

    let mut engine = SentinelEngine::new(config.clone())?;
    let projector = ViewProjector::new(config.location.clone(), config.feed.stale_after());

    let mut source = MemorySource::new();
    let subscription = SentinelEngine::attach(&mut source)?;
    let publisher = source.publisher().ok_or(ServerError::FeedClosed)?;
    let cancel = publisher.cancel_handle();

    // Initialize replay if a feed or scenario was given
    let replay_config = ReplayConfig {
        speed: args.speed,
        loop_replay: args.loop_replay,
        interval_ms: args.interval_ms,
    };
    let replay = if let Some(path) = &args.feed {
        Some(ReplayEngine::from_jsonl(path, replay_config)?)
    } else if let Some(scenario) = args.scenario {
        let mut generator = GeneratorConfig::new()
            .with_num_samples(args.samples)
            .with_sample_interval_ms(args.interval_ms);
        if let Some(seed) = args.seed {
            generator = generator.with_seed(seed);
        }
        Some(ReplayEngine::from_scenario(scenario, &generator, replay_config)?)
    } else {
        info!("No feed specified, waiting for snapshots on POST /ingest");
        None
    };

    let state = Arc::new(AppState {
        view: RwLock::new(engine.view()),
        history: RwLock::new(AlertLog::new(config.history.capacity)),
        projector,
        publisher: publisher.clone(),
        engine_running: AtomicBool::new(true),
        replay_state: replay.as_ref().map(ReplayEngine::state),
        feed_info: replay.as_ref().map(ReplayEngine::info),
        start_time: std::time::Instant::now(),
    });

    // Engine consumer: owns the engine and the subscription on a blocking thread
    let engine_state = Arc::clone(&state);
    let engine_task = tokio::task::spawn_blocking(move || {
        let summary = engine.run(&subscription, |view| {
            update_from_view(view);
            if !view.events.is_empty() {
                let mut history = engine_state.history.blocking_write();
                for event in &view.events {
                    history.push(event.clone());
                }
            }
            *engine_state.view.blocking_write() = view.clone();
        });
        engine_state.engine_running.store(false, Ordering::SeqCst);
        summary
    });

    let replay = replay.map(Arc::new);
    if let Some(replay) = &replay {
        let replay = Arc::clone(replay);
        let replay_publisher = publisher.clone();
        tokio::spawn(async move {
            replay.run(&replay_publisher).await;
        });
    }
    drop(publisher);

    // Build router
    let app = Router::new()
        .route("/", get(root_handler))
        .route("/view", get(view_handler))
        .route("/alerts", get(alerts_handler))
        .route("/history", get(history_handler))
        .route("/ingest", post(ingest_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting server on http://{}", addr);
    info!("View endpoint: http://{}/view", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(replay) = &replay {
        replay.stop();
    }
    info!("Shutting down engine");
    cancel.cancel();
    match engine_task.await {
        Ok(summary) => info!(
            "Engine processed {} snapshots ({} raised, {} resolved)",
            summary.processed, summary.raised, summary.resolved
        ),
        Err(e) => warn!("Engine task failed: {}", e),
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Root handler - shows a simple HTML page.
async fn root_handler() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Hydro Sentinel</title>
    <style>
        body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; max-width: 800px; margin: 50px auto; padding: 20px; }
        h1 { color: #2c3e50; }
        a { color: #3498db; text-decoration: none; }
        a:hover { text-decoration: underline; }
        .endpoints { background: #f8f9fa; padding: 20px; border-radius: 8px; margin: 20px 0; }
        .endpoint { margin: 10px 0; }
        code { background: #e9ecef; padding: 2px 6px; border-radius: 4px; }
    </style>
</head>
<body>
    <h1>Hydro Sentinel</h1>
    <p>Water quality and leak alerting for a single monitored fixture.</p>

    <div class="endpoints">
        <h2>Endpoints</h2>
        <div class="endpoint"><a href="/view">/view</a> - Dashboard view model (JSON)</div>
        <div class="endpoint"><a href="/alerts">/alerts</a> - Current alert states (JSON)</div>
        <div class="endpoint"><a href="/history">/history</a> - Recent alert transitions (JSON)</div>
        <div class="endpoint"><code>POST /ingest</code> - Push one raw snapshot</div>
        <div class="endpoint"><a href="/metrics">/metrics</a> - Prometheus metrics</div>
        <div class="endpoint"><a href="/health">/health</a> - Feed and replay health (JSON)</div>
        <div class="endpoint"><a href="/ready">/ready</a> - Readiness check</div>
    </div>

    <h2>Metrics</h2>
    <ul>
        <li><code>sentinel_flow_rate_lpm</code> - Flow rate</li>
        <li><code>sentinel_tds_ppm</code> - Total dissolved solids</li>
        <li><code>sentinel_conductivity_us_cm</code> - Conductivity estimated from TDS</li>
        <li><code>sentinel_alert_active</code> - Alert activity per alert type</li>
        <li><code>sentinel_active_alerts</code> - Number of active alerts</li>
        <li><code>sentinel_alert_transitions_total</code> - Raised and resolved counter</li>
        <li><code>sentinel_feed_health</code> - Feed health (0=awaiting, 1=live, 2=stale)</li>
    </ul>
</body>
</html>"#,
    )
}

/// View handler - latest view with feed health as of now.
async fn view_handler(State(state): State<Arc<AppState>>) -> Json<DashboardView> {
    let view = state.current_view().await;
    update_feed_health(view.feed);
    Json(view)
}

/// Alerts handler - current alert states.
async fn alerts_handler(State(state): State<Arc<AppState>>) -> Json<Vec<AlertState>> {
    Json(state.view.read().await.alerts.clone())
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

/// History handler - most recent transitions, newest last.
async fn history_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Json<Vec<AlertEvent>> {
    let history = state.history.read().await;
    let events = match query.limit {
        Some(n) => history.recent(n).into_iter().cloned().collect(),
        None => history.to_vec(),
    };
    Json(events)
}

/// Ingest handler - publishes one raw snapshot into the engine's feed.
///
/// The body is parsed with `RawFields::from_json` so a single unusable
/// field value does not reject the whole snapshot.
async fn ingest_handler(State(state): State<Arc<AppState>>, body: String) -> impl IntoResponse {
    let raw = match RawFields::from_json(&body) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Rejected ingest body: {}", e);
            return (StatusCode::BAD_REQUEST, "Expected a JSON object");
        }
    };
    match state.publisher.publish(raw) {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted"),
        Err(FeedError::Closed) => (StatusCode::SERVICE_UNAVAILABLE, "Engine stopped"),
    }
}

/// Metrics handler - returns Prometheus text format.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    update_feed_health(state.current_view().await.feed);
    let metrics = encode_metrics();
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        metrics,
    )
}

/// Health response.
#[derive(Serialize)]
struct HealthResponse {
    version: String,
    uptime_secs: u64,
    engine_running: bool,
    feed: FeedHealth,
    active_alerts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    replay: Option<ReplayStatus>,
}

/// Replay status information.
#[derive(Serialize)]
struct ReplayStatus {
    running: bool,
    position: usize,
    total_samples: usize,
    progress_percent: f64,
    #[serde(flatten)]
    info: FeedInfo,
}

/// Health handler - returns JSON status information.
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let view = state.current_view().await;

    let replay = match (&state.replay_state, &state.feed_info) {
        (Some(replay_state), Some(info)) => {
            let position = replay_state.position();
            let total = replay_state.total_samples.load(Ordering::SeqCst);
            let progress = if total > 0 {
                (position as f64 / total as f64) * 100.0
            } else {
                0.0
            };
            Some(ReplayStatus {
                running: replay_state.is_running(),
                position,
                total_samples: total,
                progress_percent: progress,
                info: info.clone(),
            })
        }
        _ => None,
    };

    Json(HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        engine_running: state.engine_running.load(Ordering::SeqCst),
        feed: view.feed,
        active_alerts: view.active_alerts,
        replay,
    })
}

/// Readiness check handler.
async fn ready_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.engine_running.load(Ordering::SeqCst) {
        (StatusCode::OK, "Ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "Engine stopped")
    }
}
