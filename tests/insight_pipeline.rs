use std::thread;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use telemetry_insights::{
    query_result, ChartDataSet, DecodeError, DerivationError, InsightDataTransferObject,
    InsightDefinition, InsightDefinitionRequestBody, NumberFormat, QueryResult, TransferError,
};
use uuid::Uuid;

#[test_log::test]
fn daily_users_from_request_to_chart() {
    let now = Utc.with_ymd_and_hms(2021, 10, 21, 12, 0, 0).unwrap();
    let body = InsightDefinitionRequestBody::new_daily_user_count_insight(Uuid::new_v4());
    let definition = InsightDefinition::from_request_body(body).unwrap();
    let query = definition.query(now);

    // What the signal store sends back for the query above.
    let response = br#"{
        "type": "timeSeriesResult",
        "rows": [
            {"timestamp": "2021-10-19T00:00:00.000Z", "result": {"users": 1200}},
            {"timestamp": "2021-10-20T00:00:00.000Z", "result": {"users": 1450}},
            {"timestamp": "2021-10-21T00:00:00Z", "result": {}}
        ]
    }"#;
    let result = query_result::decode(response).unwrap();

    let dto = InsightDataTransferObject::from_query_result(
        &definition,
        &result,
        now,
        Duration::from_millis(320),
    );
    assert!(!dto.is_empty());
    assert_eq!(dto.data.len(), 3);

    let chart = dto.chart_data(NumberFormat::shared()).unwrap();
    assert_eq!(chart.points.len(), 2);
    assert_eq!(chart.highest_value, 1450.0);
    assert_eq!(chart.points[0].x_axis_label, "2021-10-19T00:00:00+0000");

    let definition = definition
        .with_run_diagnostics(Duration::from_millis(320), now, &query)
        .unwrap();
    assert!(definition
        .last_query
        .as_deref()
        .unwrap()
        .starts_with(r#"{"aggregation":"uniqueUsers","outputName":"users""#));
}

#[test]
fn breakdown_from_group_by_result() {
    let now = Utc.with_ymd_and_hms(2021, 10, 21, 12, 0, 0).unwrap();
    let definition = InsightDefinition::from_request_body(
        InsightDefinitionRequestBody::new_breakdown_insight(Uuid::new_v4(), None, None),
    )
    .unwrap();

    let result = query_result::decode(
        br#"{"type":"groupByResult","timestamp":"2021-10-21T12:00:00+0000","result":{"iOS 14":"1,024","iOS 15":3000}}"#,
    )
    .unwrap();
    assert!(matches!(result, QueryResult::GroupBy(_)));

    let dto = InsightDataTransferObject::from_query_result(&definition, &result, now, Duration::ZERO);
    let chart = dto.chart_data(NumberFormat::shared()).unwrap();
    assert_eq!(chart.points.len(), 2);
    assert_eq!(chart.points[0].y_value, 1024.0);
    assert_eq!(chart.highest_value, 3000.0);
}

#[test]
fn unreadable_value_surfaces_as_error() {
    let definition = InsightDefinition::from_request_body(
        InsightDefinitionRequestBody::new_breakdown_insight(Uuid::new_v4(), None, None),
    )
    .unwrap();
    let result = query_result::decode(
        br#"{"type":"groupByResult","timestamp":"2021-10-21T12:00:00Z","result":{"iOS 15":"lots"}}"#,
    )
    .unwrap();

    let dto = InsightDataTransferObject::from_query_result(&definition, &result, Utc::now(), Duration::ZERO);
    assert_eq!(
        dto.chart_data(NumberFormat::shared()),
        Err(DerivationError::InsufficientData)
    );
}

#[test]
fn undecodable_response_maps_to_transfer_error() {
    let err = query_result::decode(br#"{"type":"scanResult"}"#).unwrap_err();
    assert_eq!(err, DecodeError::UnknownVariant("scanResult".to_string()));

    let transfer: TransferError = err.into();
    assert!(transfer.to_string().contains("could not decode"));
}

#[test]
fn derivations_run_concurrently_with_shared_format() {
    let rows: Vec<_> = (0..50)
        .map(|i| telemetry_insights::InsightData::new(format!("day {i}"), Some(format!("{},000", i + 1))))
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let rows = rows.clone();
            thread::spawn(move || ChartDataSet::derive(&rows, NumberFormat::shared()))
        })
        .collect();

    let charts: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();
    for chart in &charts {
        assert_eq!(chart, &charts[0]);
        assert_eq!(chart.highest_value, 50_000.0);
    }
}
