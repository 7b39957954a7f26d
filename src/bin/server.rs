use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use rebar_optimizer::{Demands, Optimizer, OptimizerConfig, Plan, Stocks};
use serde::{Deserialize, Serialize};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Deserialize, Serialize)]
struct OptimizeRequest {
    demands: Demands,
    #[serde(default)]
    stocks: Stocks,
    #[serde(default)]
    kerf: Option<f64>,
}

struct AppState {
    config: OptimizerConfig,
}

async fn optimize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<OptimizeRequest>,
) -> Result<Json<Plan>, (StatusCode, String)> {
    tracing::info!(
        body = serde_json::to_string(&req).unwrap_or_default(),
        "POST /optimize"
    );

    if req.demands.values().all(|rows| rows.is_empty()) {
        return Err((StatusCode::BAD_REQUEST, "no demands given".to_string()));
    }

    let config = OptimizerConfig {
        kerf_m: req.kerf.unwrap_or(state.config.kerf_m),
        ..state.config.clone()
    };

    // Solving is CPU-bound and can take a while for large schedules.
    let plan = tokio::task::spawn_blocking(move || {
        Optimizer::new(config)?.optimize(&req.demands, &req.stocks)
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
    .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    for err in plan.errors() {
        tracing::warn!(diameter = %err.diameter, error = %err.error, "diameter not planned");
        sentry::capture_message(
            &format!("diameter {} not planned: {}", err.diameter, err.error),
            sentry::Level::Warning,
        );
    }

    Ok(Json(plan))
}

fn app(config: OptimizerConfig) -> Router {
    Router::new()
        .route("/up", get(|| async { "ok" }))
        .route("/optimize", post(optimize))
        .with_state(Arc::new(AppState { config }))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    tracing::error!("{}", message);
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("development.log")
        .expect("failed to open development.log");

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_target(false)
        .with_ansi(false)
        .with_max_level(Level::INFO)
        .init();

    let _sentry = std::env::var("SENTRY_DSN").ok().map(|dsn| {
        sentry::init((
            dsn,
            sentry::ClientOptions {
                release: sentry::release_name!(),
                ..Default::default()
            },
        ))
    });

    let config = OptimizerConfig::from_env().unwrap_or_else(|e| exit_with(e));
    // The solver must be usable before the first request comes in.
    if let Err(e) = Optimizer::new(config.clone()) {
        exit_with(e);
    }

    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("0.0.0.0:{port}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => exit_with(format!("cannot listen on {addr}: {e}")),
    };
    eprintln!("Listening on {addr} (solver: {})", config.solver);
    if let Err(e) = axum::serve(listener, app(config)).await {
        exit_with(format!("server error: {e}"));
    }
}
