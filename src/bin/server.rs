use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use resampler::{
    source::http::HttpTelemetrySource, EngineConfig, RawSample, ResampleEngine, ResampleError,
    ResultSet, SeriesQuery,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

type AppState = Arc<ResampleEngine>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedParams {
    series_ids: Option<String>,
    attribute_key: Option<String>,
    start_ts: Option<i64>,
    end_ts: Option<i64>,
    interval_ms: Option<i64>,
    max_points: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedResponse {
    success: bool,
    data: Vec<SeriesPayload>,
    time_range: TimeRangePayload,
    limits: LimitsPayload,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SeriesPayload {
    series_id: String,
    key: String,
    data: Vec<RawSample>,
    data_points: usize,
    original_data_points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_current_value: Option<bool>,
}

#[derive(Debug, Serialize)]
struct TimeRangePayload {
    start: i64,
    end: i64,
    interval: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LimitsPayload {
    max_data_points: usize,
    actual_data_points: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting telemetry resampler server");

    let config = EngineConfig::from_env();
    let source = Arc::new(HttpTelemetrySource::from_env()?);
    let engine = Arc::new(ResampleEngine::new(config, source));

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3500".to_string());

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/telemetry/aggregated", get(aggregated_telemetry))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .into_inner(),
        )
        .with_state(engine);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!("Server listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

async fn aggregated_telemetry(
    State(engine): State<AppState>,
    Query(params): Query<AggregatedParams>,
) -> Result<Json<AggregatedResponse>, (StatusCode, Json<ErrorResponse>)> {
    let series_ids_raw = params
        .series_ids
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| bad_request("seriesIds parameter is required"))?;
    let attribute_key = params
        .attribute_key
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| bad_request("attributeKey parameter is required"))?;

    let series_ids: Vec<String> = series_ids_raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if series_ids.is_empty() {
        return Err(bad_request("at least one series id is required"));
    }

    let max_points = params
        .max_points
        .unwrap_or(engine.config().default_max_points);
    if max_points == 0 {
        return Err(bad_request("maxPoints must be greater than zero"));
    }

    let end_ts = params
        .end_ts
        .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());
    let start_ts = params
        .start_ts
        .unwrap_or(end_ts - engine.config().default_window_ms);
    let interval_ms = params
        .interval_ms
        .unwrap_or(engine.config().default_interval_ms);

    let query = SeriesQuery {
        series_ids,
        attribute_key,
        start_ts,
        end_ts,
        interval_ms,
        max_points,
    };

    match engine.execute(query).await {
        Ok(result) => Ok(Json(into_response(result))),
        Err(ResampleError::InvalidQuery { message }) => Err(bad_request(&message)),
        Err(ResampleError::Unauthorized) => Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Not authenticated".to_string(),
            }),
        )),
        Err(err) => {
            error!("telemetry query failed: {}", err);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error".to_string(),
                }),
            ))
        }
    }
}

fn into_response(result: ResultSet) -> AggregatedResponse {
    let data = result
        .series
        .into_iter()
        .map(|series| SeriesPayload {
            series_id: series.series_id,
            key: series.key,
            data: series.samples,
            data_points: series.sample_count,
            original_data_points: series.original_sample_count,
            is_current_value: series.is_current_value_only.then_some(true),
        })
        .collect();

    AggregatedResponse {
        success: true,
        data,
        time_range: TimeRangePayload {
            start: result.time_range.start,
            end: result.time_range.end,
            interval: result.time_range.interval,
        },
        limits: LimitsPayload {
            max_data_points: result.limits.max_data_points,
            actual_data_points: result.limits.actual_data_points,
        },
    }
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}
