use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::fields::{LookbackWindow, MonitoredField, ROW_LIMIT};
use crate::panels::{panel_links, PanelConfig, PanelLink};
use crate::recommend::{recommend, summarize, AdvisorySummary, Recommendation};
use crate::stats::{compute_stats, StatsRecord};
use crate::store::{QueryError, SeriesQuery, SeriesSource, SeriesTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// Out-of-band message about a query that degraded to an empty table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryNotice {
    pub level: NoticeLevel,
    pub message: String,
}

impl From<&QueryError> for QueryNotice {
    fn from(err: &QueryError) -> Self {
        let level = match err {
            QueryError::Execution { .. } => NoticeLevel::Error,
            QueryError::InvalidTarget { .. } | QueryError::ShapeMismatch { .. } => {
                NoticeLevel::Warning
            }
        };
        Self {
            level,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldReport {
    pub field: MonitoredField,
    pub series: String,
    pub title: String,
    pub table: SeriesTable,
    pub stats: StatsRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<QueryNotice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub lookback_minutes: u32,
    pub fields: Vec<FieldReport>,
    pub recommendations: Vec<Recommendation>,
    pub advisory: AdvisorySummary,
    pub panels: Vec<PanelLink>,
}

impl DashboardSnapshot {
    pub fn field(&self, field: MonitoredField) -> Option<&FieldReport> {
        self.fields.iter().find(|report| report.field == field)
    }
}

fn latest_value(fields: &[FieldReport], field: MonitoredField) -> Option<f64> {
    fields
        .iter()
        .find(|report| report.field == field)
        .and_then(|report| report.stats.latest)
}

/// Fetches one field and reduces it. Query faults never escape: they become
/// an empty table plus a notice.
pub fn field_report(
    source: &dyn SeriesSource,
    field: MonitoredField,
    window: LookbackWindow,
) -> FieldReport {
    let query = SeriesQuery::new(field.series(), field.field(), window.minutes(), ROW_LIMIT);
    let (table, notice) = match source.fetch(&query) {
        Ok(table) => (table, None),
        Err(err) => {
            match &err {
                QueryError::Execution { .. } => {
                    tracing::error!(series = %query.series, field = %query.field, error = %err, "query failed")
                }
                _ => {
                    tracing::warn!(series = %query.series, field = %query.field, error = %err, "query skipped")
                }
            }
            (SeriesTable::empty(field.field()), Some(QueryNotice::from(&err)))
        }
    };
    let stats = compute_stats(&table);
    FieldReport {
        field,
        series: field.series().to_string(),
        title: field.title().to_string(),
        table,
        stats,
        notice,
    }
}

/// One full render: fetch, reduce and recommend for every monitored field.
pub fn build_snapshot(
    source: &dyn SeriesSource,
    window: LookbackWindow,
    panels: &[PanelConfig],
) -> DashboardSnapshot {
    let fields: Vec<FieldReport> = MonitoredField::ALL
        .iter()
        .map(|field| field_report(source, *field, window))
        .collect();

    let recommendations = recommend(
        latest_value(&fields, MonitoredField::Temperature),
        latest_value(&fields, MonitoredField::Humidity),
        latest_value(&fields, MonitoredField::UvIndex),
    );
    let advisory = summarize(&recommendations);
    tracing::info!(
        lookback_minutes = window.minutes(),
        recommendations = recommendations.len(),
        "dashboard snapshot built"
    );
    DashboardSnapshot {
        generated_at: Utc::now(),
        lookback_minutes: window.minutes(),
        fields,
        recommendations,
        advisory,
        panels: panel_links(panels),
    }
}
