use crate::{RawSample, SampleValue};
use chrono::{Datelike, TimeZone, Timelike, Utc};
use std::collections::BTreeMap;
use tracing::{trace, warn};

pub const HOUR_MS: i64 = 3_600_000;

/// Floor an epoch-ms timestamp to the start of its UTC calendar hour
/// (minutes, seconds and millis zeroed).
fn floor_to_hour(ts: i64) -> Option<i64> {
    let dt = Utc.timestamp_millis_opt(ts).single()?;
    let floored = Utc
        .with_ymd_and_hms(dt.year(), dt.month(), dt.day(), dt.hour(), 0, 0)
        .single()?;
    Some(floored.timestamp_millis())
}

/// Group samples into calendar-hour buckets and emit one sample per bucket
/// at the bucket start, valued at the arithmetic mean of the bucket's
/// numeric values. Output is ascending by timestamp. Non-numeric values are
/// skipped; a bucket with none emits nothing.
///
/// The caller decides applicability: buckets are only built when the
/// requested interval is at least one hour and the series is numeric and
/// not a single latest/current value.
pub fn bucket_hourly(samples: Vec<RawSample>) -> Vec<RawSample> {
    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();

    for sample in samples {
        let value = match sample.value {
            SampleValue::Number(v) => v,
            SampleValue::Text(_) => {
                trace!(ts = sample.ts, "skipping non-numeric value during bucketing");
                continue;
            }
        };
        let Some(bucket_key) = floor_to_hour(sample.ts) else {
            warn!(ts = sample.ts, "timestamp outside representable range, dropping sample");
            continue;
        };
        let entry = buckets.entry(bucket_key).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(ts, (sum, count))| RawSample::numeric(ts, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(hour: u32, minute: u32) -> i64 {
        Utc.with_ymd_and_hms(2024, 3, 15, hour, minute, 0)
            .single()
            .unwrap()
            .timestamp_millis()
    }

    #[test]
    fn same_hour_samples_average_at_hour_start() {
        let samples = vec![
            RawSample::numeric(ms(9, 0), 10.0),
            RawSample::numeric(ms(9, 5), 20.0),
        ];
        let result = bucket_hourly(samples);

        assert_eq!(result, vec![RawSample::numeric(ms(9, 0), 15.0)]);
    }

    #[test]
    fn samples_split_across_hours() {
        let samples = vec![
            RawSample::numeric(ms(9, 10), 20.0),
            RawSample::numeric(ms(9, 50), 22.0),
            RawSample::numeric(ms(10, 5), 24.0),
        ];
        let result = bucket_hourly(samples);

        assert_eq!(
            result,
            vec![
                RawSample::numeric(ms(9, 0), 21.0),
                RawSample::numeric(ms(10, 0), 24.0),
            ]
        );
    }

    #[test]
    fn output_sorted_even_for_unsorted_input() {
        let samples = vec![
            RawSample::numeric(ms(12, 30), 1.0),
            RawSample::numeric(ms(8, 15), 2.0),
            RawSample::numeric(ms(10, 45), 3.0),
        ];
        let result = bucket_hourly(samples);

        let timestamps: Vec<i64> = result.iter().map(|s| s.ts).collect();
        assert_eq!(timestamps, vec![ms(8, 0), ms(10, 0), ms(12, 0)]);
    }

    #[test]
    fn text_values_are_skipped() {
        let samples = vec![
            RawSample::numeric(ms(9, 10), 10.0),
            RawSample::new(ms(9, 20), "GOOD"),
            RawSample::numeric(ms(9, 30), 20.0),
        ];
        let result = bucket_hourly(samples);

        assert_eq!(result, vec![RawSample::numeric(ms(9, 0), 15.0)]);
    }

    #[test]
    fn all_text_bucket_emits_nothing() {
        let samples = vec![RawSample::new(ms(9, 10), "LOW"), RawSample::new(ms(9, 20), "HIGH")];
        assert!(bucket_hourly(samples).is_empty());
    }
}
