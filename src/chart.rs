//! Chart data derived from query rows.
//!
//! A dataset is either complete or not produced at all: one unreadable value
//! fails the whole derivation with [`DerivationError::InsufficientData`].
//! Rows without a value are skipped and do not fail it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::DerivationError;
use crate::metrics::{self, DerivationTimer};
use crate::number_format::NumberFormat;
use crate::query_result::{timestamp, QueryResult};

/// One raw row as sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightData {
    pub x_axis_value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_axis_value: Option<String>,
}

impl InsightData {
    pub fn new(x_axis_value: impl Into<String>, y_axis_value: Option<String>) -> Self {
        Self {
            x_axis_value: x_axis_value.into(),
            y_axis_value,
        }
    }

    /// Flattens a query result into rows. Time series rows yield one row per
    /// timestamp carrying the `metric` value; a group-by result yields one
    /// row per key.
    pub fn from_query_result(result: &QueryResult, metric: &str) -> Vec<InsightData> {
        match result {
            QueryResult::TimeSeries(rows) => rows
                .iter()
                .map(|row| {
                    InsightData::new(
                        timestamp::format(&row.timestamp),
                        row.result.get(metric).map(ToString::to_string),
                    )
                })
                .collect(),
            QueryResult::GroupBy(row) => row
                .result
                .iter()
                .map(|(key, value)| InsightData::new(key.clone(), Some(value.as_text())))
                .collect(),
        }
    }

    /// The value as a number: `0` when absent, `None` when unreadable.
    pub fn y_axis_number(&self, format: &NumberFormat) -> Option<f64> {
        match self.y_axis_value.as_deref() {
            None => Some(0.0),
            Some(raw) => format.parse(raw),
        }
    }

    /// Display text: `"0"` when absent, the raw text when unreadable,
    /// otherwise the reformatted number.
    pub fn y_axis_string(&self, format: &NumberFormat) -> String {
        match self.y_axis_value.as_deref() {
            None => "0".to_string(),
            Some(raw) => format
                .parse(raw)
                .map(|number| format.format(number))
                .unwrap_or_else(|| raw.to_string()),
        }
    }

    pub fn x_axis_date(&self) -> Option<DateTime<Utc>> {
        timestamp::parse(&self.x_axis_value).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub x_axis_label: String,
    pub y_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDataSet {
    pub points: Vec<ChartPoint>,
    /// Always zero; charts have no negative axis.
    pub lowest_value: f64,
    pub highest_value: f64,
}

impl ChartDataSet {
    pub fn derive(rows: &[InsightData], format: &NumberFormat) -> Result<Self, DerivationError> {
        let _timer = DerivationTimer::new();

        let mut points = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(raw) = row.y_axis_value.as_deref() else {
                continue;
            };
            let Some(y_value) = format.parse(raw) else {
                metrics::CHART_DERIVATION_FAILURES.inc();
                warn!(x_axis_value = %row.x_axis_value, raw_value = raw, "unreadable chart value");
                return Err(DerivationError::InsufficientData);
            };
            points.push(ChartPoint {
                x_axis_label: row.x_axis_value.clone(),
                y_value,
            });
        }

        let highest_value = points.iter().fold(0.0_f64, |max, point| max.max(point.y_value));
        debug!(rows = rows.len(), points = points.len(), highest_value, "derived chart data");

        Ok(Self {
            points,
            lowest_value: 0.0,
            highest_value,
        })
    }

    /// True when no row carried a value.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query_result::{GroupByRow, GroupByValue, TimeSeriesRow};
    use chrono::TimeZone;
    use serde_json::Number;
    use std::collections::BTreeMap;

    fn row(x: &str, y: Option<&str>) -> InsightData {
        InsightData::new(x, y.map(str::to_string))
    }

    #[test_log::test]
    fn unreadable_value_fails_everything() {
        let rows = vec![row("2021-01-01", Some("10")), row("2021-01-02", Some("bad"))];
        assert_eq!(
            ChartDataSet::derive(&rows, NumberFormat::shared()),
            Err(DerivationError::InsufficientData)
        );
    }

    #[test]
    fn absent_values_are_skipped() {
        let rows = vec![row("2021-01-01", Some("10")), row("2021-01-02", None)];
        let chart = ChartDataSet::derive(&rows, NumberFormat::shared()).unwrap();

        assert_eq!(
            chart.points,
            vec![ChartPoint {
                x_axis_label: "2021-01-01".to_string(),
                y_value: 10.0
            }]
        );
        assert_eq!(chart.highest_value, 10.0);
        assert_eq!(chart.lowest_value, 0.0);
        assert!(!chart.is_empty());
    }

    #[test]
    fn all_absent_is_empty() {
        let rows = vec![row("a", None), row("b", None)];
        let chart = ChartDataSet::derive(&rows, NumberFormat::shared()).unwrap();
        assert!(chart.is_empty());
        assert_eq!(chart.highest_value, 0.0);

        assert!(ChartDataSet::derive(&[], NumberFormat::shared()).unwrap().is_empty());
    }

    #[test]
    fn highest_value_never_drops_below_zero() {
        let rows = vec![row("a", Some("-5")), row("b", Some("-1,200"))];
        let chart = ChartDataSet::derive(&rows, NumberFormat::shared()).unwrap();
        assert_eq!(chart.points.len(), 2);
        assert_eq!(chart.highest_value, 0.0);
    }

    #[test]
    fn grouped_values_parse() {
        let rows = vec![row("iOS 15", Some("1,234.5")), row("iOS 14", Some("1234.5"))];
        let chart = ChartDataSet::derive(&rows, NumberFormat::shared()).unwrap();
        assert_eq!(chart.points[0].y_value, chart.points[1].y_value);
        assert_eq!(chart.highest_value, 1234.5);
    }

    #[test]
    fn derivation_is_idempotent() {
        let rows = vec![row("a", Some("3")), row("b", None), row("c", Some("7.25"))];
        let first = ChartDataSet::derive(&rows, NumberFormat::shared()).unwrap();
        let second = ChartDataSet::derive(&rows, NumberFormat::shared()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn y_axis_text() {
        let format = NumberFormat::shared();
        assert_eq!(row("a", None).y_axis_string(format), "0");
        assert_eq!(row("a", Some("n/a")).y_axis_string(format), "n/a");
        assert_eq!(row("a", Some("1234567")).y_axis_string(format), "1,234,567");
        assert_eq!(row("a", None).y_axis_number(format), Some(0.0));
        assert_eq!(row("a", Some("n/a")).y_axis_number(format), None);
        assert_eq!(row("a", Some("2.5")).y_axis_number(format), Some(2.5));
    }

    #[test]
    fn x_axis_dates() {
        let expected = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(row("2021-01-01T00:00:00Z", None).x_axis_date(), Some(expected));
        assert_eq!(row("2021-01-01T00:00:00.000Z", None).x_axis_date(), Some(expected));
        assert_eq!(row("iOS 15", None).x_axis_date(), None);
    }

    #[test]
    fn rows_from_time_series() {
        let day = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let result = QueryResult::TimeSeries(vec![
            TimeSeriesRow::new(day, BTreeMap::from([("count".to_string(), Number::from(4))])),
            TimeSeriesRow::new(day, BTreeMap::new()),
        ]);

        assert_eq!(
            InsightData::from_query_result(&result, "count"),
            vec![
                row("2021-01-01T00:00:00+0000", Some("4")),
                row("2021-01-01T00:00:00+0000", None),
            ]
        );
    }

    #[test]
    fn rows_from_group_by() {
        let day = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let result = QueryResult::GroupBy(GroupByRow::new(
            day,
            BTreeMap::from([
                ("iOS 14".to_string(), GroupByValue::from(3)),
                ("iOS 15".to_string(), GroupByValue::from("12")),
            ]),
        ));

        assert_eq!(
            InsightData::from_query_result(&result, "count"),
            vec![row("iOS 14", Some("3")), row("iOS 15", Some("12"))]
        );
    }

    #[test]
    fn absent_y_is_omitted_on_the_wire() {
        assert_eq!(
            serde_json::to_string(&row("a", None)).unwrap(),
            r#"{"xAxisValue":"a"}"#
        );
        let decoded: InsightData = serde_json::from_str(r#"{"xAxisValue":"a","yAxisValue":"1"}"#).unwrap();
        assert_eq!(decoded, row("a", Some("1")));
    }
}
