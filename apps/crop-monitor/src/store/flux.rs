use super::SeriesQuery;

/// Range-filter-sort-limit query for one measurement/field pair, newest first.
pub(super) fn recent_readings_query(bucket: &str, query: &SeriesQuery) -> String {
    format!(
        r#"from(bucket: "{bucket}")
  |> range(start: -{minutes}m)
  |> filter(fn: (r) => r["_measurement"] == "{series}" and r["_field"] == "{field}")
  |> sort(columns: ["_time"], desc: true)
  |> limit(n: {limit})"#,
        bucket = escape_string_literal(bucket),
        minutes = query.lookback_minutes,
        series = escape_string_literal(&query.series),
        field = escape_string_literal(&query.field),
        limit = query.limit,
    )
}

// Flux string literals treat `\`, `"` and `${` specially.
fn escape_string_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' if chars.peek() == Some(&'{') => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}
