use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::insight::InsightDefinition;

/// A telemetry event as sent by a client app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "appID", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub received_at: DateTime<Utc>,
    pub client_user: String,
    #[serde(rename = "sessionID", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub signal_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<BTreeMap<String, String>>,
}

/// A signal row as stored in the time-series store, where the payload is a
/// JSON array of `"key:value"` strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDruidStructure {
    #[serde(rename = "appID", skip_serializing_if = "Option::is_none")]
    pub app_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    pub received_at: DateTime<Utc>,
    pub client_user: String,
    #[serde(rename = "sessionID", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub signal_type: String,
    pub payload: String,
}

impl SignalDruidStructure {
    /// Unpacks the payload. Entries without a `:` are skipped; a payload
    /// that is not a JSON string array yields an empty payload.
    pub fn to_signal(&self) -> Signal {
        let unescaped = self.payload.replace('\\', "");
        let mut payload = BTreeMap::new();

        match serde_json::from_str::<Vec<String>>(&unescaped) {
            Ok(entries) => {
                for entry in entries {
                    if let Some((key, value)) = entry.split_once(':') {
                        payload.insert(key.to_string(), value.to_string());
                    }
                }
            }
            Err(err) => {
                debug!(error = %err, signal_type = %self.signal_type, "unreadable signal payload");
            }
        }

        Signal {
            id: None,
            app_id: self.app_id,
            count: self.count,
            received_at: self.received_at,
            client_user: self.client_user.clone(),
            session_id: self.session_id.clone(),
            signal_type: self.signal_type.clone(),
            payload: Some(payload),
        }
    }
}

/// An ordered collection of insights shown together.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightGroup {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
    #[serde(default)]
    pub insights: Vec<InsightDefinition>,
}

impl InsightGroup {
    pub fn dto(&self) -> InsightGroupDto {
        InsightGroupDto {
            id: self.id,
            title: self.title.clone(),
            order: self.order,
        }
    }

    /// Insights by ascending `order`; unordered ones go last, ties keep
    /// their stored order.
    pub fn sorted_insights(&self) -> Vec<&InsightDefinition> {
        let mut insights: Vec<&InsightDefinition> = self.insights.iter().collect();
        insights.sort_by(|a, b| match (a.order, b.order) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        insights
    }
}

// Groups are identified by id alone.
impl PartialEq for InsightGroup {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for InsightGroup {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightGroupDto {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::InsightDefinitionRequestBody;
    use chrono::TimeZone;

    fn druid_row(payload: &str) -> SignalDruidStructure {
        SignalDruidStructure {
            app_id: Some(Uuid::new_v4()),
            count: Some(1),
            received_at: Utc.with_ymd_and_hms(2021, 10, 21, 12, 0, 0).unwrap(),
            client_user: "user-1".to_string(),
            session_id: None,
            signal_type: "appLaunched".to_string(),
            payload: payload.to_string(),
        }
    }

    #[test]
    fn druid_payload_is_unpacked() {
        let signal = druid_row(r#"[\"systemVersion:iOS 15.0\",\"url:https://example.com\",\"broken\"]"#)
            .to_signal();

        assert_eq!(
            signal.payload,
            Some(BTreeMap::from([
                ("systemVersion".to_string(), "iOS 15.0".to_string()),
                ("url".to_string(), "https://example.com".to_string()),
            ]))
        );
        assert_eq!(signal.signal_type, "appLaunched");
    }

    #[test]
    fn unreadable_druid_payload_is_empty() {
        let signal = druid_row("not a list").to_signal();
        assert_eq!(signal.payload, Some(BTreeMap::new()));
    }

    #[test]
    fn signal_wire_names() {
        let signal: Signal = serde_json::from_str(
            r#"{"receivedAt":"2021-10-21T12:00:00Z","clientUser":"u","type":"appLaunched","sessionID":"s1"}"#,
        )
        .unwrap();
        assert_eq!(signal.signal_type, "appLaunched");
        assert_eq!(signal.session_id.as_deref(), Some("s1"));
        assert_eq!(signal.payload, None);
    }

    #[test]
    fn group_sorts_insights_by_order() {
        let mut insights = Vec::new();
        for order in [Some(2.0), None, Some(1.0)] {
            let mut body = InsightDefinitionRequestBody::new_signal_insight(Uuid::new_v4());
            body.order = order;
            insights.push(InsightDefinition::from_request_body(body).unwrap());
        }
        let group = InsightGroup {
            id: Uuid::new_v4(),
            title: "Overview".to_string(),
            order: None,
            insights,
        };

        let orders: Vec<Option<f64>> = group.sorted_insights().iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![Some(1.0), Some(2.0), None]);
        assert_eq!(group.dto().title, "Overview");
    }
}
