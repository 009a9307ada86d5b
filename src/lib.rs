pub mod config;
pub mod error;
pub mod orchestrator;
pub mod pipeline;
pub mod source;

use std::sync::Arc;

pub use config::EngineConfig;
pub use error::{ResampleError, ResampleResult, SourceError};
use source::TelemetrySource;

/// A telemetry value as delivered by the source: either an averageable
/// quantity or a label (e.g. a signal-quality state). Serialized untagged so
/// the wire form is a bare JSON number or string.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(v) => Some(*v),
            SampleValue::Text(_) => None,
        }
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        SampleValue::Number(v)
    }
}

impl From<&str> for SampleValue {
    fn from(s: &str) -> Self {
        SampleValue::Text(s.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(s: String) -> Self {
        SampleValue::Text(s)
    }
}

/// A single (timestamp, value) observation. Timestamps are epoch
/// milliseconds. Sequences coming from the source are not guaranteed sorted
/// or deduplicated.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RawSample {
    pub ts: i64,
    pub value: SampleValue,
}

impl RawSample {
    pub fn new(ts: i64, value: impl Into<SampleValue>) -> Self {
        Self {
            ts,
            value: value.into(),
        }
    }

    pub fn numeric(ts: i64, value: f64) -> Self {
        Self {
            ts,
            value: SampleValue::Number(value),
        }
    }
}

/// One charting request: which series, which attribute, which window and
/// how many points the caller can render.
#[derive(Debug, Clone)]
pub struct SeriesQuery {
    pub series_ids: Vec<String>,
    pub attribute_key: String,
    pub start_ts: i64,
    pub end_ts: i64,
    pub interval_ms: i64,
    pub max_points: usize,
}

impl SeriesQuery {
    pub fn validate(&self) -> ResampleResult<()> {
        if self.series_ids.is_empty() {
            return Err(ResampleError::InvalidQuery {
                message: "at least one series id is required".to_string(),
            });
        }
        if self.series_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ResampleError::InvalidQuery {
                message: "series ids must not be empty".to_string(),
            });
        }
        if self.attribute_key.trim().is_empty() {
            return Err(ResampleError::InvalidQuery {
                message: "attribute key is required".to_string(),
            });
        }
        if self.start_ts > self.end_ts {
            return Err(ResampleError::InvalidQuery {
                message: "start_ts must not be after end_ts".to_string(),
            });
        }
        if self.max_points == 0 {
            return Err(ResampleError::InvalidQuery {
                message: "max_points must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// A fully shaped series ready for charting: ascending unique timestamps,
/// at most `max_points` samples unless it carries a single current value.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessedSeries {
    pub series_id: String,
    pub key: String,
    pub samples: Vec<RawSample>,
    pub sample_count: usize,
    pub original_sample_count: usize,
    pub is_current_value_only: bool,
}

impl ProcessedSeries {
    pub fn empty(series_id: String, key: String) -> Self {
        Self {
            series_id,
            key,
            samples: Vec::new(),
            sample_count: 0,
            original_sample_count: 0,
            is_current_value_only: false,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
    pub interval: i64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Limits {
    pub max_data_points: usize,
    pub actual_data_points: usize,
}

/// The assembled answer for one [`SeriesQuery`]. Series appear in request
/// order regardless of retrieval completion order.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResultSet {
    pub series: Vec<ProcessedSeries>,
    pub time_range: TimeRange,
    pub limits: Limits,
}

/// Facade over the per-series pipeline: retrieval strategy chain, window
/// filter, downsampler and bucket aggregator, fanned out across series with
/// bounded concurrency.
pub struct ResampleEngine {
    config: EngineConfig,
    source: Arc<dyn TelemetrySource>,
}

impl ResampleEngine {
    pub fn new(config: EngineConfig, source: Arc<dyn TelemetrySource>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn execute(&self, query: SeriesQuery) -> ResampleResult<ResultSet> {
        orchestrator::run(&self.config, self.source.clone(), query).await
    }
}
