//! Insight templates offered when a user adds an insight to a group.
//!
//! Every template looks back thirty days, starts collapsed and without
//! filters. Clients compare the resulting bodies exactly, so change these
//! values only together with the clients.

use std::collections::BTreeMap;

use uuid::Uuid;

use super::definition::{
    InsightDefinitionRequestBody, InsightDisplayMode, InsightGroupByInterval, RollingWindow,
};

pub const DEFAULT_BREAKDOWN_KEY: &str = "systemVersion";

impl InsightDefinitionRequestBody {
    pub fn new_time_series_insight(group_id: Uuid) -> Self {
        preset(
            group_id,
            "New Time Series Insight",
            false,
            None,
            Some(InsightGroupByInterval::Day),
            InsightDisplayMode::LineChart,
        )
    }

    pub fn new_breakdown_insight(
        group_id: Uuid,
        title: Option<String>,
        breakdown_key: Option<String>,
    ) -> Self {
        let mut body = preset(
            group_id,
            "New Breakdown Insight",
            false,
            Some(breakdown_key.unwrap_or_else(|| DEFAULT_BREAKDOWN_KEY.to_string())),
            None,
            InsightDisplayMode::PieChart,
        );
        if let Some(title) = title {
            body.title = title;
        }
        body
    }

    pub fn new_daily_user_count_insight(group_id: Uuid) -> Self {
        preset(
            group_id,
            "Daily Active Users",
            true,
            None,
            Some(InsightGroupByInterval::Day),
            InsightDisplayMode::LineChart,
        )
    }

    pub fn new_weekly_user_count_insight(group_id: Uuid) -> Self {
        preset(
            group_id,
            "Weekly Active Users",
            true,
            None,
            Some(InsightGroupByInterval::Week),
            InsightDisplayMode::BarChart,
        )
    }

    pub fn new_monthly_user_count_insight(group_id: Uuid) -> Self {
        preset(
            group_id,
            "Active Users this Month",
            true,
            None,
            Some(InsightGroupByInterval::Month),
            InsightDisplayMode::Raw,
        )
    }

    pub fn new_signal_insight(group_id: Uuid) -> Self {
        preset(
            group_id,
            "Signals by Day",
            false,
            None,
            Some(InsightGroupByInterval::Day),
            InsightDisplayMode::LineChart,
        )
    }
}

fn preset(
    group_id: Uuid,
    title: &str,
    unique_user: bool,
    breakdown_key: Option<String>,
    group_by: Option<InsightGroupByInterval>,
    display_mode: InsightDisplayMode,
) -> InsightDefinitionRequestBody {
    InsightDefinitionRequestBody {
        order: None,
        title: title.to_string(),
        subtitle: None,
        signal_type: None,
        unique_user,
        filters: BTreeMap::new(),
        rolling_window_size: RollingWindow::THIRTY_DAYS_BACK,
        breakdown_key,
        group_by,
        display_mode,
        group_id: Some(group_id),
        id: None,
        is_expanded: false,
        should_use_druid: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::insight::{Grouping, InsightDefinition};
    use pretty_assertions::assert_eq;

    fn group_id() -> Uuid {
        Uuid::parse_str("7c0d0e4e-5b8a-4d4f-9a51-0c3d9c1e2f10").unwrap()
    }

    #[test]
    fn weekly_user_count_is_exact() {
        let body = InsightDefinitionRequestBody::new_weekly_user_count_insight(group_id());

        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            concat!(
                r#"{"title":"Weekly Active Users","uniqueUser":true,"filters":{},"#,
                r#""rollingWindowSize":-2592000,"groupBy":"week","displayMode":"barChart","#,
                r#""groupID":"7c0d0e4e-5b8a-4d4f-9a51-0c3d9c1e2f10","isExpanded":false,"shouldUseDruid":false}"#
            )
        );
    }

    #[test]
    fn preset_parameters() {
        let cases = [
            (
                InsightDefinitionRequestBody::new_time_series_insight(group_id()),
                "New Time Series Insight",
                false,
                Grouping::Interval(InsightGroupByInterval::Day),
                InsightDisplayMode::LineChart,
            ),
            (
                InsightDefinitionRequestBody::new_breakdown_insight(group_id(), None, None),
                "New Breakdown Insight",
                false,
                Grouping::Breakdown("systemVersion".to_string()),
                InsightDisplayMode::PieChart,
            ),
            (
                InsightDefinitionRequestBody::new_daily_user_count_insight(group_id()),
                "Daily Active Users",
                true,
                Grouping::Interval(InsightGroupByInterval::Day),
                InsightDisplayMode::LineChart,
            ),
            (
                InsightDefinitionRequestBody::new_weekly_user_count_insight(group_id()),
                "Weekly Active Users",
                true,
                Grouping::Interval(InsightGroupByInterval::Week),
                InsightDisplayMode::BarChart,
            ),
            (
                InsightDefinitionRequestBody::new_monthly_user_count_insight(group_id()),
                "Active Users this Month",
                true,
                Grouping::Interval(InsightGroupByInterval::Month),
                InsightDisplayMode::Raw,
            ),
            (
                InsightDefinitionRequestBody::new_signal_insight(group_id()),
                "Signals by Day",
                false,
                Grouping::Interval(InsightGroupByInterval::Day),
                InsightDisplayMode::LineChart,
            ),
        ];

        for (body, title, unique_user, grouping, display_mode) in cases {
            assert_eq!(body.rolling_window_size.seconds(), -2_592_000.0);
            assert_eq!(body.group_id, Some(group_id()));
            assert_eq!(body.id, None);
            assert!(body.filters.is_empty());
            assert!(!body.is_expanded);

            let definition = InsightDefinition::from_request_body(body).unwrap();
            assert_eq!(definition.title, title);
            assert_eq!(definition.unique_user, unique_user);
            assert_eq!(definition.grouping, grouping);
            assert_eq!(definition.display_mode, display_mode);
        }
    }

    #[test]
    fn breakdown_overrides() {
        let body = InsightDefinitionRequestBody::new_breakdown_insight(
            group_id(),
            Some("Devices".to_string()),
            Some("modelName".to_string()),
        );
        assert_eq!(body.title, "Devices");
        assert_eq!(body.breakdown_key.as_deref(), Some("modelName"));
        assert_eq!(body.group_by, None);
    }
}
