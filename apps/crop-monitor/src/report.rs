use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use std::fmt::Write;

use crate::dashboard::{DashboardSnapshot, FieldReport, NoticeLevel};
use crate::panels::PanelLink;
use crate::recommend::AdvisorySummary;
use crate::stats::StatsRecord;
use crate::store::SeriesTable;

const TABLE_PREVIEW_ROWS: usize = 10;

/// Header context that is not part of the snapshot itself.
pub struct ReportContext<'a> {
    pub bucket: &'a str,
    pub org: &'a str,
    pub timezone: Tz,
}

pub fn render_text(snapshot: &DashboardSnapshot, ctx: &ReportContext<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "🥕 Urban micro-crop monitor");
    let _ = writeln!(
        out,
        "ℹ️ Showing data from bucket `{}` in organization `{}`.",
        ctx.bucket, ctx.org
    );
    out.push('\n');

    out.push_str("📊 Dashboard panels\n");
    out.push_str(&render_panels(&snapshot.panels));
    out.push('\n');

    let _ = writeln!(
        out,
        "📝 Recent readings and statistics (last {} minutes)",
        snapshot.lookback_minutes
    );
    for report in &snapshot.fields {
        out.push_str(&render_field(report, snapshot.lookback_minutes));
    }
    out.push('\n');

    out.push_str("💡 Recommendations\n");
    match &snapshot.advisory {
        AdvisorySummary::AllClear { message } => {
            let _ = writeln!(out, "  {message}");
        }
        AdvisorySummary::Advisories { prominent, notes } => {
            for rec in prominent {
                let _ = writeln!(out, "  {}", rec.message);
            }
            for rec in notes {
                let _ = writeln!(out, "    ({})", rec.message);
            }
        }
    }
    out.push('\n');
    let _ = writeln!(out, "Server time: {}", server_clock(snapshot.generated_at, ctx.timezone));
    out
}

pub fn render_panels(panels: &[PanelLink]) -> String {
    let mut out = String::new();
    for panel in panels {
        if panel.valid {
            let _ = writeln!(out, "  {} -> {}", panel.name, panel.url);
        } else {
            let _ = writeln!(
                out,
                "  ⚠️ {}: URL not configured (set it under \"panels\" in the setup file)",
                panel.name
            );
        }
    }
    out
}

fn render_field(report: &FieldReport, lookback_minutes: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n  {} ({})", report.title, report.table.field());
    if let Some(notice) = &report.notice {
        let tag = match notice.level {
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        let _ = writeln!(out, "    [{tag}] {}", notice.message);
    }
    if report.table.is_empty() {
        let _ = writeln!(
            out,
            "    No '{}' data in the last {lookback_minutes} minutes.",
            report.table.field()
        );
        return out;
    }
    out.push_str(&render_table(&report.table, TABLE_PREVIEW_ROWS));
    out.push_str("    Statistics:\n");
    out.push_str(&render_stats(&report.stats));
    // A single reading has no previous value to compare against.
    if report.stats.trend.is_none() {
        out.push_str("      Not enough data for a trend.\n");
    }
    out
}

pub fn render_table(table: &SeriesTable, max_rows: usize) -> String {
    let mut out = String::new();
    let [time_col, value_col] = table.columns();
    let _ = writeln!(out, "    {time_col:<25} {value_col:>12}");
    for reading in table.readings().iter().take(max_rows) {
        let _ = writeln!(
            out,
            "    {:<25} {:>12}",
            reading.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            reading.value
        );
    }
    if table.len() > max_rows {
        let _ = writeln!(out, "    … {} more rows", table.len() - max_rows);
    }
    out
}

fn render_stats(stats: &StatsRecord) -> String {
    let mut out = String::new();
    let rows = [
        ("Min", stats.min),
        ("Max", stats.max),
        ("Mean", stats.mean),
        ("Latest", stats.latest),
        ("Previous", stats.previous),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            let _ = writeln!(out, "      {label:<9} {value}");
        }
    }
    if let Some(trend) = stats.trend {
        let _ = writeln!(out, "      {:<9} {trend}", "Trend");
    }
    out
}

pub fn server_clock(now: DateTime<Utc>, timezone: Tz) -> String {
    now.with_timezone(&timezone)
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string()
}
