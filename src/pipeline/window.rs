use crate::RawSample;

/// Restrict raw samples to the requested window, bounds inclusive. Applied
/// to numeric series fetched via the raw strategies; categorical and
/// latest/current single-sample series bypass this because their only
/// source guarantee is "latest value".
pub fn filter_window(samples: Vec<RawSample>, start_ts: i64, end_ts: i64) -> Vec<RawSample> {
    samples
        .into_iter()
        .filter(|sample| sample.ts >= start_ts && sample.ts <= end_ts)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_are_inclusive() {
        let samples = vec![
            RawSample::numeric(999, 1.0),
            RawSample::numeric(1000, 2.0),
            RawSample::numeric(1500, 3.0),
            RawSample::numeric(2000, 4.0),
            RawSample::numeric(2001, 5.0),
        ];

        let filtered = filter_window(samples, 1000, 2000);

        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered[0].ts, 1000);
        assert_eq!(filtered[2].ts, 2000);
    }

    #[test]
    fn empty_window_yields_empty() {
        let samples = vec![RawSample::numeric(100, 1.0)];
        assert!(filter_window(samples, 200, 300).is_empty());
    }
}
