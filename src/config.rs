use std::collections::HashSet;
use std::time::Duration;

const SEVEN_DAYS_MS: i64 = 7 * 24 * 60 * 60 * 1000;
const ONE_HOUR_MS: i64 = 3_600_000;

/// Immutable engine configuration. The engine is a pure function of
/// (query, config, adapter); nothing is read from ambient global state
/// after construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Trailing window applied when a query omits `start_ts`/`end_ts`.
    pub default_window_ms: i64,
    /// Bucket interval applied when a query omits `interval_ms`.
    pub default_interval_ms: i64,
    /// Point cap applied when a query omits `max_points`.
    pub default_max_points: usize,
    /// Maximum number of series fetched concurrently.
    pub max_concurrency: usize,
    /// Timeout applied to every individual adapter call. A timeout is
    /// treated as "strategy failed, try the next one".
    pub fetch_timeout: Duration,
    /// Optional deadline for a whole query. When it elapses, in-flight
    /// series work is aborted and the query fails.
    pub overall_timeout: Option<Duration>,
    /// Attribute keys whose values are labels rather than averageable
    /// quantities. Classification is a static lookup, never type inference.
    pub categorical_keys: HashSet<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_window_ms: SEVEN_DAYS_MS,
            default_interval_ms: ONE_HOUR_MS,
            default_max_points: 100,
            max_concurrency: 8,
            fetch_timeout: Duration::from_secs(10),
            overall_timeout: None,
            categorical_keys: HashSet::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(keys) = std::env::var("CATEGORICAL_KEYS") {
            config.categorical_keys = keys
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(concurrency) = std::env::var("MAX_CONCURRENCY") {
            if let Ok(value) = concurrency.parse::<usize>() {
                config.max_concurrency = value.max(1);
            }
        }

        if let Ok(timeout) = std::env::var("FETCH_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                config.fetch_timeout = Duration::from_secs(secs);
            }
        }

        if let Ok(timeout) = std::env::var("OVERALL_TIMEOUT_SECONDS") {
            config.overall_timeout = timeout.parse::<u64>().ok().map(Duration::from_secs);
        }

        if let Ok(max_points) = std::env::var("DEFAULT_MAX_POINTS") {
            if let Ok(value) = max_points.parse::<usize>() {
                config.default_max_points = value.max(1);
            }
        }

        if let Ok(interval) = std::env::var("DEFAULT_INTERVAL_MS") {
            if let Ok(value) = interval.parse::<i64>() {
                config.default_interval_ms = value;
            }
        }

        config
    }

    pub fn is_categorical(&self, attribute_key: &str) -> bool {
        self.categorical_keys.contains(attribute_key)
    }
}
