//! Query result wire model and codec.
//!
//! Every query result crosses the wire as a JSON object whose first field is
//! the `type` discriminator:
//!
//! ```text
//! {"type":"timeSeriesResult","rows":[{"result":{..},"timestamp":".."}, ..]}
//! {"type":"groupByResult","result":{..},"timestamp":".."}
//! ```
//!
//! Downstream consumers compare these documents byte for byte, so field order
//! and the timestamp format are fixed here and nowhere else.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::metrics;
use crate::Result;

pub const TIME_SERIES_TAG: &str = "timeSeriesResult";
pub const GROUP_BY_TAG: &str = "groupByResult";

#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// Rows in server order, which is chronological.
    TimeSeries(Vec<TimeSeriesRow>),
    GroupBy(GroupByRow),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesRow {
    pub result: BTreeMap<String, Number>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupByRow {
    pub result: BTreeMap<String, GroupByValue>,
    #[serde(serialize_with = "timestamp::serialize")]
    pub timestamp: DateTime<Utc>,
}

/// A group-by cell. The query layer mixes dimension labels and counts in the
/// same map, so each value keeps the JSON type it arrived with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GroupByValue {
    Number(Number),
    Text(String),
}

impl GroupByValue {
    pub fn as_text(&self) -> String {
        match self {
            GroupByValue::Number(number) => number.to_string(),
            GroupByValue::Text(text) => text.clone(),
        }
    }
}

impl From<&str> for GroupByValue {
    fn from(text: &str) -> Self {
        GroupByValue::Text(text.to_string())
    }
}

impl From<i64> for GroupByValue {
    fn from(value: i64) -> Self {
        GroupByValue::Number(value.into())
    }
}

impl TimeSeriesRow {
    pub fn new(timestamp: DateTime<Utc>, result: BTreeMap<String, Number>) -> Self {
        Self { result, timestamp }
    }

    pub fn value(&self, key: &str) -> Option<f64> {
        self.result.get(key).and_then(Number::as_f64)
    }
}

impl GroupByRow {
    pub fn new(timestamp: DateTime<Utc>, result: BTreeMap<String, GroupByValue>) -> Self {
        Self { result, timestamp }
    }
}

impl QueryResult {
    pub fn variant_tag(&self) -> &'static str {
        match self {
            QueryResult::TimeSeries(_) => TIME_SERIES_TAG,
            QueryResult::GroupBy(_) => GROUP_BY_TAG,
        }
    }
}

impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            QueryResult::TimeSeries(rows) => {
                let mut state = serializer.serialize_struct("QueryResult", 2)?;
                state.serialize_field("type", TIME_SERIES_TAG)?;
                state.serialize_field("rows", rows)?;
                state.end()
            }
            QueryResult::GroupBy(row) => {
                let mut state = serializer.serialize_struct("QueryResult", 3)?;
                state.serialize_field("type", GROUP_BY_TAG)?;
                state.serialize_field("result", &row.result)?;
                state.serialize_field("timestamp", &timestamp::format(&row.timestamp))?;
                state.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for QueryResult {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        query_result(&value).map_err(de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for TimeSeriesRow {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        time_series_row(&value).map_err(de::Error::custom)
    }
}

pub fn encode(result: &QueryResult) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(result)?)
}

pub fn encode_to_string(result: &QueryResult) -> Result<String> {
    Ok(serde_json::to_string(result)?)
}

pub fn decode(bytes: &[u8]) -> std::result::Result<QueryResult, DecodeError> {
    let decoded = serde_json::from_slice::<Value>(bytes)
        .map_err(DecodeError::from)
        .and_then(|value| query_result(&value));

    match &decoded {
        Ok(result) => {
            metrics::QUERY_RESULTS_DECODED
                .with_label_values(&[result.variant_tag()])
                .inc();
            debug!(variant = result.variant_tag(), "decoded query result");
        }
        Err(err) => {
            metrics::QUERY_RESULT_DECODE_FAILURES.inc();
            warn!(error = %err, "failed to decode query result");
        }
    }
    decoded
}

fn query_result(value: &Value) -> std::result::Result<QueryResult, DecodeError> {
    let object = object(value, "query result")?;
    let tag = required(object, "type")?
        .as_str()
        .ok_or_else(|| malformed("`type` must be a string"))?;

    match tag {
        TIME_SERIES_TAG => {
            let rows = required(object, "rows")?
                .as_array()
                .ok_or_else(|| malformed("`rows` must be an array"))?;
            rows.iter()
                .map(time_series_row)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(QueryResult::TimeSeries)
        }
        GROUP_BY_TAG => group_by_row(object).map(QueryResult::GroupBy),
        other => Err(DecodeError::UnknownVariant(other.to_string())),
    }
}

fn time_series_row(value: &Value) -> std::result::Result<TimeSeriesRow, DecodeError> {
    let object = object(value, "time series row")?;
    let timestamp = row_timestamp(object)?;

    let mut result = BTreeMap::new();
    for (key, value) in result_map(object)? {
        match value {
            Value::Number(number) => result.insert(key.clone(), number.clone()),
            _ => return Err(malformed(&format!("result value `{key}` must be a number"))),
        };
    }

    Ok(TimeSeriesRow { result, timestamp })
}

fn group_by_row(object: &Map<String, Value>) -> std::result::Result<GroupByRow, DecodeError> {
    let timestamp = row_timestamp(object)?;

    let mut result = BTreeMap::new();
    for (key, value) in result_map(object)? {
        let cell = match value {
            Value::Number(number) => GroupByValue::Number(number.clone()),
            Value::String(text) => GroupByValue::Text(text.clone()),
            _ => {
                return Err(malformed(&format!(
                    "result value `{key}` must be a string or a number"
                )))
            }
        };
        result.insert(key.clone(), cell);
    }

    Ok(GroupByRow { result, timestamp })
}

fn row_timestamp(object: &Map<String, Value>) -> std::result::Result<DateTime<Utc>, DecodeError> {
    let text = required(object, "timestamp")?
        .as_str()
        .ok_or_else(|| malformed("`timestamp` must be a string"))?;
    timestamp::parse(text)
}

fn result_map(object: &Map<String, Value>) -> std::result::Result<&Map<String, Value>, DecodeError> {
    required(object, "result")?
        .as_object()
        .ok_or_else(|| malformed("`result` must be an object"))
}

fn object<'a>(
    value: &'a Value,
    what: &str,
) -> std::result::Result<&'a Map<String, Value>, DecodeError> {
    value
        .as_object()
        .ok_or_else(|| malformed(&format!("{what} must be an object")))
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &str,
) -> std::result::Result<&'a Value, DecodeError> {
    object
        .get(field)
        .ok_or_else(|| DecodeError::MissingField(field.to_string()))
}

fn malformed(detail: &str) -> DecodeError {
    DecodeError::MalformedJson(detail.to_string())
}

/// The single timestamp format of the query wire protocol.
pub mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    use crate::error::DecodeError;

    /// Always UTC, always `+0000`, never fractional seconds.
    pub const WIRE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+0000";

    const FIXED_OFFSET_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

    pub fn format(timestamp: &DateTime<Utc>) -> String {
        timestamp.format(WIRE_FORMAT).to_string()
    }

    /// Parses ISO-8601 with or without fractional seconds. RFC 3339 is tried
    /// first (`Z`, `+00:00`, fractions), then the colon-less `+0000` offset
    /// that [`format`] produces.
    pub fn parse(text: &str) -> Result<DateTime<Utc>, DecodeError> {
        DateTime::parse_from_rfc3339(text)
            .or_else(|_| DateTime::parse_from_str(text, FIXED_OFFSET_FORMAT))
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|_| DecodeError::BadTimestamp(text.to_string()))
    }

    pub fn serialize<S: Serializer>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(timestamp))
    }
}
