use super::{SourceResult, TelemetrySource};
use crate::error::SourceError;
use crate::{RawSample, SampleValue};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Telemetry source speaking the ThingsBoard-style REST timeseries API:
/// `GET {base}/api/plugins/telemetry/DEVICE/{id}/values/timeseries` with
/// `keys`, `startTs`, `endTs`, `interval`, `agg` and `limit` parameters.
/// The store reports numeric values as JSON strings, so numeric-looking
/// strings are coerced to numbers on the way in.
pub struct HttpTelemetrySource {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
    request_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct WirePoint {
    ts: i64,
    value: serde_json::Value,
}

impl HttpTelemetrySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_token: None,
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn from_env() -> Result<Self, SourceError> {
        let base_url = std::env::var("SOURCE_URL")
            .map_err(|_| SourceError::Network("SOURCE_URL is not set".to_string()))?;
        let mut source = Self::new(base_url);
        if let Ok(token) = std::env::var("SOURCE_AUTH_TOKEN") {
            source = source.with_auth_token(token);
        }
        if let Ok(secs) = std::env::var("SOURCE_TIMEOUT_SECONDS") {
            if let Ok(value) = secs.parse::<u64>() {
                source = source.with_request_timeout(Duration::from_secs(value));
            }
        }
        Ok(source)
    }

    async fn get_timeseries(
        &self,
        series_id: &str,
        key: &str,
        params: &[(&str, String)],
    ) -> SourceResult<Vec<RawSample>> {
        let url = format!(
            "{}/api/plugins/telemetry/DEVICE/{}/values/timeseries",
            self.base_url.trim_end_matches('/'),
            series_id
        );

        let mut request = self
            .client
            .get(&url)
            .query(&[("keys", key)])
            .query(params)
            .timeout(self.request_timeout);
        if let Some(token) = &self.auth_token {
            request = request.header("X-Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                SourceError::Timeout
            } else {
                SourceError::Network(err.to_string())
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(SourceError::Unauthorized);
        }
        if !status.is_success() {
            return Err(SourceError::Network(format!("HTTP error: {}", status)));
        }

        let body: HashMap<String, Vec<WirePoint>> = response
            .json()
            .await
            .map_err(|err| SourceError::Format(err.to_string()))?;

        let samples = parse_key_samples(body, key)?;
        debug!(series_id, key, count = samples.len(), "timeseries fetched");
        Ok(samples)
    }
}

/// Pull the requested key's points out of the per-key response map and
/// coerce values: JSON numbers and numeric-looking strings become
/// [`SampleValue::Number`], everything else stays text.
fn parse_key_samples(
    mut body: HashMap<String, Vec<WirePoint>>,
    key: &str,
) -> SourceResult<Vec<RawSample>> {
    let points = body.remove(key).unwrap_or_default();
    points
        .into_iter()
        .map(|point| {
            let value = match point.value {
                serde_json::Value::Number(n) => match n.as_f64() {
                    Some(v) => SampleValue::Number(v),
                    None => return Err(SourceError::Format(format!("unrepresentable number: {}", n))),
                },
                serde_json::Value::String(s) => match s.parse::<f64>() {
                    Ok(v) => SampleValue::Number(v),
                    Err(_) => SampleValue::Text(s),
                },
                serde_json::Value::Bool(b) => SampleValue::Text(b.to_string()),
                other => {
                    return Err(SourceError::Format(format!(
                        "unsupported value type: {}",
                        other
                    )))
                }
            };
            Ok(RawSample {
                ts: point.ts,
                value,
            })
        })
        .collect()
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    async fn query_aggregated(
        &self,
        series_id: &str,
        key: &str,
        start_ts: i64,
        end_ts: i64,
        interval_ms: i64,
        limit: usize,
    ) -> SourceResult<Vec<RawSample>> {
        self.get_timeseries(
            series_id,
            key,
            &[
                ("startTs", start_ts.to_string()),
                ("endTs", end_ts.to_string()),
                ("interval", interval_ms.to_string()),
                ("agg", "AVG".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn query_raw(
        &self,
        series_id: &str,
        key: &str,
        start_ts: i64,
        end_ts: i64,
        limit: usize,
    ) -> SourceResult<Vec<RawSample>> {
        self.get_timeseries(
            series_id,
            key,
            &[
                ("startTs", start_ts.to_string()),
                ("endTs", end_ts.to_string()),
                ("agg", "NONE".to_string()),
                ("limit", limit.to_string()),
            ],
        )
        .await
    }

    async fn query_raw_unbounded(
        &self,
        series_id: &str,
        key: &str,
        limit: usize,
    ) -> SourceResult<Vec<RawSample>> {
        self.get_timeseries(series_id, key, &[("limit", limit.to_string())])
            .await
    }

    async fn query_latest(&self, series_id: &str, key: &str) -> SourceResult<Option<RawSample>> {
        let mut samples = self.get_timeseries(series_id, key, &[]).await?;
        samples.sort_by_key(|sample| sample.ts);
        Ok(samples.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body_from(value: serde_json::Value) -> HashMap<String, Vec<WirePoint>> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let body = body_from(json!({
            "sensorTemperature": [
                { "ts": 1000, "value": "21.5" },
                { "ts": 2000, "value": 22.0 },
            ]
        }));
        let samples = parse_key_samples(body, "sensorTemperature").unwrap();

        assert_eq!(samples[0].value, SampleValue::Number(21.5));
        assert_eq!(samples[1].value, SampleValue::Number(22.0));
    }

    #[test]
    fn labels_stay_text() {
        let body = body_from(json!({
            "signalQuality": [ { "ts": 1000, "value": "GOOD" } ]
        }));
        let samples = parse_key_samples(body, "signalQuality").unwrap();

        assert_eq!(samples[0].value, SampleValue::Text("GOOD".to_string()));
    }

    #[test]
    fn missing_key_yields_empty() {
        let body = body_from(json!({ "otherKey": [] }));
        assert!(parse_key_samples(body, "sensorTemperature").unwrap().is_empty());
    }
}
