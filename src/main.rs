// Tempo Forecast v0.1
use axum::{routing::get, Router};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod config;
mod errors;
mod helpers;
mod routes;
mod services;
mod stages;
mod store;

use config::AppConfig;
use errors::AppError;
use routes::AppState;
use store::DataFiles;

/// Tempo Forecast API — OpenAPI document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Tempo Forecast API",
        version = "0.1.0",
        description = "Day-ahead EDF Tempo tariff color predictions. \
            A class-weighted classifier scores each upcoming day and a fixed rule \
            pipeline enforces the tariff's calendar and quota constraints before \
            the probabilities are published.",
        license(name = "MIT"),
    ),
    tags(
        (name = "Health", description = "Service health check"),
        (name = "Predictions", description = "Rule-corrected predictions and their track record"),
        (name = "Quota", description = "Season quota usage"),
    ),
    paths(
        routes::health::health_check,
        routes::predictions::list_predictions,
        routes::predictions::get_prediction,
        routes::predictions::get_history,
        routes::quota::get_quota,
    ),
    components(
        schemas(
            routes::health::HealthResponse,
            routes::health::FileStatus,
            store::models::PredictionRecord,
            store::models::HistoryEntry,
            store::models::HistoryStats,
            store::models::Outcome,
            services::rules::Percentages,
            services::rules::Rule,
            services::tariff::Color,
            routes::predictions::HistoryResponse,
            routes::quota::QuotaResponse,
            routes::quota::UsedDays,
            services::quota::Quotas,
            services::quota::Remaining,
            errors::ErrorResponse,
        )
    )
)]
struct ApiDoc;

#[derive(Parser)]
#[command(name = "tempo-forecast", version)]
#[command(about = "EDF Tempo dataset builder and rule-corrected predictor", long_about = None)]
struct Cli {
    /// Reference day for date-dependent stages (defaults to the local date)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Refresh tariff, weather and grid histories from their public APIs
    Fetch,
    /// Join the histories into the feature table
    BuildDataset,
    /// Fit the classifier on the feature table
    Train,
    /// Predict every upcoming day
    Predict,
    /// Validate past predictions against confirmed colors
    UpdateHistory,
    /// Serve the produced files over HTTP
    Serve,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tempo_forecast=info,tower_http=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let files = DataFiles::new(&config.data_dir);
    let policy = &config.policy;
    let today = cli
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match cli.command {
        Command::Fetch => {
            let summary = stages::run_fetch(&config, today).await?;
            tracing::info!("Fetch done: {:?}", summary);
        }
        Command::BuildDataset => {
            stages::run_build_dataset(&files, policy)?;
        }
        Command::Train => {
            let bundle = stages::run_train(&files, policy)?;
            tracing::info!(
                "Trained {} on {} samples",
                bundle.model_type,
                bundle.training_samples
            );
        }
        Command::Predict => {
            stages::run_predict(&files, policy)?;
        }
        Command::UpdateHistory => {
            stages::run_update_history(&files, policy, today)?;
        }
        Command::Serve => serve(&config, files).await?,
    }
    Ok(())
}

async fn serve(config: &AppConfig, files: DataFiles) -> Result<(), AppError> {
    let state = AppState {
        files,
        policy: config.policy.clone(),
    };

    // Read-only API, restrict methods to GET
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([axum::http::Method::GET])
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route(
            "/api/v1/predictions",
            get(routes::predictions::list_predictions),
        )
        .route(
            "/api/v1/predictions/:date",
            get(routes::predictions::get_prediction),
        )
        .route("/api/v1/history", get(routes::predictions::get_history))
        .route("/api/v1/quota", get(routes::quota::get_quota))
        .with_state(state);

    let app = Router::new()
        .merge(api_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("API server listening on {}", addr);
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        config.port
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to bind {}: {}", addr, e)))?;
    axum::serve(listener, app)
        .await
        .map_err(|e| AppError::InternalError(format!("Server terminated unexpectedly: {}", e)))
}
