use crate::error::SourceError;
use crate::source::TelemetrySource;
use crate::RawSample;
use std::time::Duration;
use tracing::{debug, warn};

/// The ordered retrieval shapes tried against the telemetry source. Each
/// strategy is only attempted after the previous one is confirmed empty or
/// failed; they are preference-ordered, not speculative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Server-side mean aggregation into interval buckets. Numeric keys only.
    AggregatedRange,
    /// Unaggregated samples within the window.
    RawRange,
    /// Most recent samples for the key, no time filter.
    RawUnbounded,
    /// Single latest value, used as the categorical fallback. The result
    /// bypasses window filtering and bucketing.
    LatestValue,
    /// Single most-recent sample, last resort for any key. Marks the
    /// processed series as current-value-only.
    CurrentValue,
}

/// What a successful walk of the strategy chain produced.
#[derive(Debug)]
pub struct FetchOutcome {
    pub samples: Vec<RawSample>,
    pub resolved_by: Strategy,
}

impl FetchOutcome {
    /// Raw-range and raw-unbounded results still need window filtering;
    /// aggregated results are already windowed by the source and single
    /// latest/current values have no window semantics.
    pub fn needs_window_filter(&self) -> bool {
        matches!(self.resolved_by, Strategy::RawRange | Strategy::RawUnbounded)
    }

    pub fn is_single_value(&self) -> bool {
        matches!(self.resolved_by, Strategy::LatestValue | Strategy::CurrentValue)
    }

    pub fn is_current_value_only(&self) -> bool {
        self.resolved_by == Strategy::CurrentValue
    }
}

/// How the chain ended when no strategy yielded data. Distinguishes "the
/// source answered but had nothing" from "every attempt failed at the
/// transport level", so the orchestrator can tell no-data from outage.
#[derive(Debug)]
pub struct ChainExhausted {
    pub attempts: usize,
    pub transport_errors: usize,
    pub unauthorized: bool,
}

impl ChainExhausted {
    pub fn all_transport_errors(&self) -> bool {
        self.attempts > 0 && self.transport_errors == self.attempts
    }
}

#[derive(Debug)]
pub enum ChainOutcome {
    Resolved(FetchOutcome),
    Exhausted(ChainExhausted),
}

/// One series' retrieval parameters, borrowed from the query.
#[derive(Debug, Clone, Copy)]
pub struct FetchRequest<'a> {
    pub series_id: &'a str,
    pub attribute_key: &'a str,
    pub start_ts: i64,
    pub end_ts: i64,
    pub interval_ms: i64,
    pub max_points: usize,
    pub categorical: bool,
}

/// The preference order for one key class. Aggregated-range is meaningless
/// for categorical keys (labels cannot be averaged) and latest-value is the
/// categorical-specific fallback.
pub fn strategy_order(categorical: bool) -> &'static [Strategy] {
    if categorical {
        &[
            Strategy::RawRange,
            Strategy::RawUnbounded,
            Strategy::LatestValue,
            Strategy::CurrentValue,
        ]
    } else {
        &[
            Strategy::AggregatedRange,
            Strategy::RawRange,
            Strategy::RawUnbounded,
            Strategy::CurrentValue,
        ]
    }
}

/// Walk the strategy chain until one strategy yields a non-empty result.
/// Errors and empty results both fall through to the next strategy; a
/// failed strategy is never retried.
pub async fn fetch_with_fallback(
    source: &dyn TelemetrySource,
    request: &FetchRequest<'_>,
    call_timeout: Duration,
) -> ChainOutcome {
    let order = strategy_order(request.categorical);
    let mut transport_errors = 0;
    let mut unauthorized = false;

    for &strategy in order {
        match attempt(source, strategy, request, call_timeout).await {
            Ok(samples) if !samples.is_empty() => {
                debug!(
                    series_id = request.series_id,
                    ?strategy,
                    count = samples.len(),
                    "strategy resolved"
                );
                return ChainOutcome::Resolved(FetchOutcome {
                    samples,
                    resolved_by: strategy,
                });
            }
            Ok(_) => {
                debug!(series_id = request.series_id, ?strategy, "strategy returned no samples");
            }
            Err(err) => {
                if matches!(err, SourceError::Unauthorized) {
                    unauthorized = true;
                }
                transport_errors += 1;
                warn!(
                    series_id = request.series_id,
                    ?strategy,
                    error = %err,
                    "strategy failed, falling through"
                );
            }
        }
    }

    ChainOutcome::Exhausted(ChainExhausted {
        attempts: order.len(),
        transport_errors,
        unauthorized,
    })
}

async fn attempt(
    source: &dyn TelemetrySource,
    strategy: Strategy,
    request: &FetchRequest<'_>,
    call_timeout: Duration,
) -> Result<Vec<RawSample>, SourceError> {
    let call = async {
        match strategy {
            Strategy::AggregatedRange => {
                source
                    .query_aggregated(
                        request.series_id,
                        request.attribute_key,
                        request.start_ts,
                        request.end_ts,
                        request.interval_ms,
                        request.max_points,
                    )
                    .await
            }
            Strategy::RawRange => {
                source
                    .query_raw(
                        request.series_id,
                        request.attribute_key,
                        request.start_ts,
                        request.end_ts,
                        request.max_points,
                    )
                    .await
            }
            Strategy::RawUnbounded => {
                source
                    .query_raw_unbounded(request.series_id, request.attribute_key, request.max_points)
                    .await
            }
            Strategy::LatestValue | Strategy::CurrentValue => {
                let latest = source
                    .query_latest(request.series_id, request.attribute_key)
                    .await?;
                Ok(latest.into_iter().collect())
            }
        }
    };

    match tokio::time::timeout(call_timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(SourceError::Timeout),
    }
}
