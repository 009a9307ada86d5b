use crate::config::EngineConfig;
use crate::error::{ResampleError, ResampleResult};
use crate::pipeline::bucket::{bucket_hourly, HOUR_MS};
use crate::pipeline::downsample::{downsample, sort_and_dedup};
use crate::pipeline::strategy::{fetch_with_fallback, ChainOutcome, FetchRequest};
use crate::pipeline::window::filter_window;
use crate::source::TelemetrySource;
use crate::{Limits, ProcessedSeries, ResultSet, SeriesQuery, TimeRange};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One series' result plus what the retrieval chain saw, so assembly can
/// distinguish "no data" from "source unreachable".
struct SeriesOutcome {
    series: ProcessedSeries,
    failed: bool,
    unauthorized: bool,
}

/// Run the full query: validate, fan one task per series onto a bounded
/// pool, collect results back into request order, assemble the result set.
/// A failure in one series never aborts the others.
pub async fn run(
    config: &EngineConfig,
    source: Arc<dyn TelemetrySource>,
    query: SeriesQuery,
) -> ResampleResult<ResultSet> {
    query.validate()?;

    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        series_count = query.series_ids.len(),
        key = %query.attribute_key,
        start_ts = query.start_ts,
        end_ts = query.end_ts,
        "executing resample query"
    );

    let semaphore = Arc::new(Semaphore::new(config.max_concurrency));
    let mut join_set: JoinSet<(usize, SeriesOutcome)> = JoinSet::new();

    for (index, series_id) in query.series_ids.iter().cloned().enumerate() {
        let source = source.clone();
        let semaphore = semaphore.clone();
        let config = config.clone();
        let attribute_key = query.attribute_key.clone();
        let (start_ts, end_ts) = (query.start_ts, query.end_ts);
        let (interval_ms, max_points) = (query.interval_ms, query.max_points);

        join_set.spawn(async move {
            let permit = semaphore.acquire_owned().await;
            if permit.is_err() {
                // Pool closed mid-flight, only possible during shutdown.
                let series = ProcessedSeries::empty(series_id, attribute_key);
                return (
                    index,
                    SeriesOutcome {
                        series,
                        failed: true,
                        unauthorized: false,
                    },
                );
            }
            let outcome = process_series(
                source.as_ref(),
                &config,
                &series_id,
                &attribute_key,
                start_ts,
                end_ts,
                interval_ms,
                max_points,
            )
            .await;
            (index, outcome)
        });
    }

    let total = query.series_ids.len();
    let slots = match config.overall_timeout {
        Some(limit) => {
            match tokio::time::timeout(limit, collect_outcomes(&mut join_set, total, request_id))
                .await
            {
                Ok(slots) => slots,
                Err(_) => {
                    join_set.abort_all();
                    warn!(%request_id, "overall deadline elapsed, dropping in-flight series work");
                    return Err(ResampleError::DeadlineElapsed);
                }
            }
        }
        None => collect_outcomes(&mut join_set, total, request_id).await,
    };

    let mut series_out = Vec::with_capacity(total);
    let mut all_failed = true;
    let mut unauthorized = false;
    for (slot, series_id) in slots.into_iter().zip(&query.series_ids) {
        match slot {
            Some(outcome) => {
                unauthorized |= outcome.unauthorized;
                if !outcome.failed {
                    all_failed = false;
                }
                series_out.push(outcome.series);
            }
            None => {
                // Task panicked or was never joined; represent the series as
                // empty so the rest of the batch still answers.
                series_out.push(ProcessedSeries::empty(
                    series_id.clone(),
                    query.attribute_key.clone(),
                ));
            }
        }
    }

    if all_failed {
        return Err(if unauthorized {
            ResampleError::Unauthorized
        } else {
            ResampleError::SourceUnavailable {
                message: "every series failed at the transport level".to_string(),
            }
        });
    }

    let actual_data_points = series_out.iter().map(|s| s.sample_count).sum();
    info!(%request_id, actual_data_points, "resample query complete");

    Ok(ResultSet {
        series: series_out,
        time_range: TimeRange {
            start: query.start_ts,
            end: query.end_ts,
            interval: query.interval_ms,
        },
        limits: Limits {
            max_data_points: query.max_points,
            actual_data_points,
        },
    })
}

async fn collect_outcomes(
    join_set: &mut JoinSet<(usize, SeriesOutcome)>,
    total: usize,
    request_id: Uuid,
) -> Vec<Option<SeriesOutcome>> {
    let mut slots: Vec<Option<SeriesOutcome>> = std::iter::repeat_with(|| None).take(total).collect();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((index, outcome)) => {
                if let Some(slot) = slots.get_mut(index) {
                    *slot = Some(outcome);
                }
            }
            Err(err) => {
                warn!(%request_id, error = %err, "series task did not complete");
            }
        }
    }
    slots
}

/// The forward-only per-series pipeline: strategy chain, then window
/// filter, sort/dedup, downsample and bucket as applicable.
#[allow(clippy::too_many_arguments)]
async fn process_series(
    source: &dyn TelemetrySource,
    config: &EngineConfig,
    series_id: &str,
    attribute_key: &str,
    start_ts: i64,
    end_ts: i64,
    interval_ms: i64,
    max_points: usize,
) -> SeriesOutcome {
    let categorical = config.is_categorical(attribute_key);
    let request = FetchRequest {
        series_id,
        attribute_key,
        start_ts,
        end_ts,
        interval_ms,
        max_points,
        categorical,
    };

    match fetch_with_fallback(source, &request, config.fetch_timeout).await {
        ChainOutcome::Resolved(outcome) => {
            let original_sample_count = outcome.samples.len();
            let is_current_value_only = outcome.is_current_value_only();
            let single_value = outcome.is_single_value();
            let needs_filter = !categorical && outcome.needs_window_filter();

            let mut samples = outcome.samples;
            if needs_filter {
                samples = filter_window(samples, start_ts, end_ts);
            }
            samples = sort_and_dedup(samples);
            if samples.len() > max_points {
                samples = downsample(samples, max_points);
            }
            if interval_ms >= HOUR_MS && !categorical && !single_value {
                samples = bucket_hourly(samples);
            }

            debug!(
                series_id,
                fetched = original_sample_count,
                shaped = samples.len(),
                "series processed"
            );

            SeriesOutcome {
                series: ProcessedSeries {
                    series_id: series_id.to_string(),
                    key: attribute_key.to_string(),
                    sample_count: samples.len(),
                    original_sample_count,
                    is_current_value_only,
                    samples,
                },
                failed: false,
                unauthorized: false,
            }
        }
        ChainOutcome::Exhausted(exhausted) => {
            debug!(
                series_id,
                attempts = exhausted.attempts,
                transport_errors = exhausted.transport_errors,
                "all retrieval strategies exhausted"
            );
            SeriesOutcome {
                series: ProcessedSeries::empty(series_id.to_string(), attribute_key.to_string()),
                failed: exhausted.all_transport_errors(),
                unauthorized: exhausted.unauthorized,
            }
        }
    }
}
