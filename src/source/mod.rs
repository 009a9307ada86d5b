pub mod http;

use crate::error::SourceError;
use crate::RawSample;
use async_trait::async_trait;

pub type SourceResult<T> = Result<T, SourceError>;

/// Contract consumed from the external telemetry store. Timestamps are
/// epoch milliseconds; values are 64-bit floats or strings. None of the
/// query shapes guarantee sorted or deduplicated output.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Samples within `[start_ts, end_ts]`, pre-aggregated server-side into
    /// `interval_ms` buckets by arithmetic mean, capped at `limit` points.
    async fn query_aggregated(
        &self,
        series_id: &str,
        key: &str,
        start_ts: i64,
        end_ts: i64,
        interval_ms: i64,
        limit: usize,
    ) -> SourceResult<Vec<RawSample>>;

    /// Unaggregated samples within `[start_ts, end_ts]`, capped at `limit`.
    async fn query_raw(
        &self,
        series_id: &str,
        key: &str,
        start_ts: i64,
        end_ts: i64,
        limit: usize,
    ) -> SourceResult<Vec<RawSample>>;

    /// The most recent `limit` samples for the key, no time filter.
    async fn query_raw_unbounded(
        &self,
        series_id: &str,
        key: &str,
        limit: usize,
    ) -> SourceResult<Vec<RawSample>>;

    /// Only the single latest value, if the key has ever been written.
    async fn query_latest(&self, series_id: &str, key: &str) -> SourceResult<Option<RawSample>>;
}
