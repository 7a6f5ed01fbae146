mod annotated_csv;
mod connection;
mod flux;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use thiserror::Error;
use url::Url;

use crate::config::{ConfigError, StoreConfig};
use annotated_csv::ResultChunk;
use connection::StoreConnection;

pub const TIMESTAMP_COLUMN: &str = "Timestamp";
const TIME_COLUMN: &str = "_time";
const VALUE_COLUMN: &str = "_value";
const ERROR_COLUMN: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Readings for one series/field pair, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesTable {
    field: String,
    readings: Vec<Reading>,
}

impl SeriesTable {
    /// Builds a table, restoring descending time order.
    pub fn new(field: impl Into<String>, mut readings: Vec<Reading>) -> Self {
        readings.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Self {
            field: field.into(),
            readings,
        }
    }

    pub fn empty(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            readings: Vec::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Output schema: the timestamp column followed by a column named after the field.
    pub fn columns(&self) -> [&str; 2] {
        [TIMESTAMP_COLUMN, self.field.as_str()]
    }

    pub fn readings(&self) -> &[Reading] {
        &self.readings
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.readings.iter().map(|reading| reading.value)
    }

    fn truncate(&mut self, limit: usize) {
        self.readings.truncate(limit);
    }
}

struct RowView<'a> {
    field: &'a str,
    reading: &'a Reading,
}

impl Serialize for RowView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(
            TIMESTAMP_COLUMN,
            &self
                .reading
                .timestamp
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        )?;
        map.serialize_entry(self.field, &self.reading.value)?;
        map.end()
    }
}

impl Serialize for SeriesTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<RowView<'_>> = self
            .readings
            .iter()
            .map(|reading| RowView {
                field: &self.field,
                reading,
            })
            .collect();
        let mut state = serializer.serialize_struct("SeriesTable", 2)?;
        state.serialize_field("columns", &self.columns())?;
        state.serialize_field("rows", &rows)?;
        state.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesQuery {
    pub series: String,
    pub field: String,
    pub lookback_minutes: u32,
    pub limit: usize,
}

impl SeriesQuery {
    pub fn new(
        series: impl Into<String>,
        field: impl Into<String>,
        lookback_minutes: u32,
        limit: usize,
    ) -> Self {
        Self {
            series: series.into(),
            field: field.into(),
            lookback_minutes,
            limit,
        }
    }

    fn check_target(&self) -> Result<(), QueryError> {
        if self.series.trim().is_empty()
            || self.field.trim().is_empty()
            || self.lookback_minutes == 0
            || self.limit == 0
        {
            return Err(QueryError::InvalidTarget {
                series: self.series.clone(),
                field: self.field.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("measurement ('{series}') or field ('{field}') not specified for the query")]
    InvalidTarget { series: String, field: String },
    #[error("error querying '{series}/{field}' from the store: {message}")]
    Execution {
        series: String,
        field: String,
        message: String,
    },
    #[error("unexpected result shape for '{series}/{field}': {detail}")]
    ShapeMismatch {
        series: String,
        field: String,
        detail: String,
    },
}

/// Anything that can answer a recent-readings query.
pub trait SeriesSource {
    fn fetch(&self, query: &SeriesQuery) -> Result<SeriesTable, QueryError>;

    fn fetch_series(
        &self,
        series: &str,
        field: &str,
        lookback_minutes: u32,
        limit: usize,
    ) -> Result<SeriesTable, QueryError> {
        self.fetch(&SeriesQuery::new(series, field, lookback_minutes, limit))
    }
}

/// Query adapter for an InfluxDB 2.x Flux endpoint.
#[derive(Debug, Clone)]
pub struct InfluxStore {
    config: StoreConfig,
    endpoint: Url,
}

impl InfluxStore {
    pub fn new(config: StoreConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let endpoint = query_endpoint(&config)?;
        Ok(Self { config, endpoint })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

fn query_endpoint(config: &StoreConfig) -> Result<Url, ConfigError> {
    let base = format!("{}/", config.url.trim().trim_end_matches('/'));
    let mut endpoint = Url::parse(&base)
        .and_then(|base| base.join("api/v2/query"))
        .map_err(|err| ConfigError::Invalid {
            key: crate::config::ENV_URL,
            reason: err.to_string(),
        })?;
    endpoint
        .query_pairs_mut()
        .append_pair("org", config.org.trim());
    Ok(endpoint)
}

impl SeriesSource for InfluxStore {
    fn fetch(&self, query: &SeriesQuery) -> Result<SeriesTable, QueryError> {
        query.check_target()?;
        let execution = |message: String| QueryError::Execution {
            series: query.series.clone(),
            field: query.field.clone(),
            message,
        };

        let flux = flux::recent_readings_query(self.config.bucket.trim(), query);
        let body = {
            let connection = StoreConnection::open(
                self.config.token.trim(),
                format!("{}/{}", query.series, query.field),
            )
            .map_err(|err| execution(err.to_string()))?;
            connection
                .query(&self.endpoint, &flux)
                .map_err(|err| execution(err.to_string()))?
        };

        let chunks = annotated_csv::parse_chunks(&body)
            .map_err(|err| execution(format!("unreadable response: {err}")))?;
        let table = table_from_chunks(query, &chunks)?;
        tracing::debug!(
            series = %query.series,
            field = %query.field,
            rows = table.len(),
            chunks = chunks.len(),
            "fetched readings"
        );
        Ok(table)
    }
}

/// Flattens every result chunk into one table, keeping only time and value.
fn table_from_chunks(query: &SeriesQuery, chunks: &[ResultChunk]) -> Result<SeriesTable, QueryError> {
    let shape = |detail: String| QueryError::ShapeMismatch {
        series: query.series.clone(),
        field: query.field.clone(),
        detail,
    };

    let mut readings = Vec::new();
    for chunk in chunks.iter().filter(|chunk| !chunk.rows.is_empty()) {
        if let Some(idx) = chunk.column(ERROR_COLUMN) {
            if let Some(message) = chunk
                .rows
                .iter()
                .filter_map(|row| row.get(idx))
                .find(|message| !message.trim().is_empty())
            {
                return Err(QueryError::Execution {
                    series: query.series.clone(),
                    field: query.field.clone(),
                    message: message.trim().to_string(),
                });
            }
        }

        let (Some(time_idx), Some(value_idx)) =
            (chunk.column(TIME_COLUMN), chunk.column(VALUE_COLUMN))
        else {
            return Err(shape(format!(
                "columns '{TIME_COLUMN}' or '{VALUE_COLUMN}' not found"
            )));
        };

        for row in &chunk.rows {
            let raw_time = row.get(time_idx).map(|cell| cell.trim()).unwrap_or("");
            let raw_value = row.get(value_idx).map(|cell| cell.trim()).unwrap_or("");
            // Null cells carry no sample.
            if raw_time.is_empty() || raw_value.is_empty() {
                continue;
            }
            let timestamp = DateTime::parse_from_rfc3339(raw_time)
                .map_err(|err| shape(format!("invalid {TIME_COLUMN} '{raw_time}': {err}")))?
                .with_timezone(&Utc);
            let value = raw_value
                .parse::<f64>()
                .map_err(|err| shape(format!("invalid {VALUE_COLUMN} '{raw_value}': {err}")))?;
            readings.push(Reading::new(timestamp, value));
        }
    }

    let mut table = SeriesTable::new(query.field.clone(), readings);
    table.truncate(query.limit);
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    fn store_config(url: &str) -> StoreConfig {
        StoreConfig {
            url: url.to_string(),
            token: "tok-123".to_string(),
            org: "farm org".to_string(),
            bucket: "microcrops".to_string(),
        }
    }

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, 12, minute, 0).unwrap()
    }

    fn chunk(headers: &[&str], rows: &[&[&str]]) -> ResultChunk {
        ResultChunk {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn construction_fails_fast_on_missing_settings() {
        let mut config = store_config("http://localhost:8086");
        config.token = String::new();
        assert!(matches!(
            InfluxStore::new(config),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn endpoint_carries_org_and_keeps_base_path() {
        let store = InfluxStore::new(store_config("https://influx.example.com/base/")).unwrap();
        assert_eq!(
            store.endpoint.as_str(),
            "https://influx.example.com/base/api/v2/query?org=farm+org"
        );
    }

    #[test]
    fn empty_target_is_rejected_before_any_connection() {
        // Port 9 is never contacted: the target check runs first.
        let store = InfluxStore::new(store_config("http://127.0.0.1:9")).unwrap();
        let err = store.fetch_series("", "humidity", 60, 100).unwrap_err();
        assert!(matches!(err, QueryError::InvalidTarget { .. }));
        let err = store.fetch_series("airSensor", " ", 60, 100).unwrap_err();
        assert!(matches!(err, QueryError::InvalidTarget { .. }));
    }

    #[test]
    fn flattens_chunks_into_descending_table() {
        let query = SeriesQuery::new("airSensor", "humidity", 60, 100);
        let chunks = vec![
            chunk(
                &["", "result", "table", "_time", "_value"],
                &[
                    &["", "_result", "0", "2026-10-18T12:03:00Z", "70.5"],
                    &["", "_result", "0", "2026-10-18T12:01:00Z", "71"],
                ],
            ),
            chunk(
                &["", "result", "table", "_value", "_time", "device"],
                &[&["", "_result", "1", "69.25", "2026-10-18T12:02:00Z", "b"]],
            ),
        ];
        let table = table_from_chunks(&query, &chunks).unwrap();
        assert_eq!(table.columns(), ["Timestamp", "humidity"]);
        let times: Vec<_> = table.readings().iter().map(|r| r.timestamp).collect();
        assert_eq!(times, vec![ts(3), ts(2), ts(1)]);
        assert!(times.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(table.values().collect::<Vec<_>>(), vec![70.5, 69.25, 71.0]);
    }

    #[test]
    fn truncates_to_limit_after_merging() {
        let query = SeriesQuery::new("airSensor", "temperature", 60, 2);
        let chunks = vec![
            chunk(&["_time", "_value"], &[&["2026-10-18T12:00:00Z", "1"]]),
            chunk(
                &["_time", "_value"],
                &[&["2026-10-18T12:05:00Z", "2"], &["2026-10-18T12:04:00Z", "3"]],
            ),
        ];
        let table = table_from_chunks(&query, &chunks).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.readings()[0].timestamp, ts(5));
        assert_eq!(table.readings()[1].timestamp, ts(4));
    }

    #[test]
    fn no_rows_means_empty_table_not_error() {
        let query = SeriesQuery::new("uv_sensor", "uv_index", 60, 100);
        let table = table_from_chunks(&query, &[]).unwrap();
        assert!(table.is_empty());
        let table = table_from_chunks(&query, &[chunk(&["result", "table"], &[])]).unwrap();
        assert!(table.is_empty());
    }

    #[test]
    fn missing_columns_are_a_shape_mismatch() {
        let query = SeriesQuery::new("uv_sensor", "uv_index", 60, 100);
        let err = table_from_chunks(&query, &[chunk(&["_time", "value"], &[&["x", "1"]])])
            .unwrap_err();
        assert!(matches!(err, QueryError::ShapeMismatch { .. }), "{err}");

        let err = table_from_chunks(
            &query,
            &[chunk(&["_time", "_value"], &[&["yesterday", "1"]])],
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::ShapeMismatch { .. }), "{err}");
    }

    #[test]
    fn null_cells_are_skipped() {
        let query = SeriesQuery::new("uv_sensor", "uv_index", 60, 100);
        let table = table_from_chunks(
            &query,
            &[chunk(
                &["_time", "_value"],
                &[&["2026-10-18T12:00:00Z", ""], &["2026-10-18T12:01:00Z", "3.5"]],
            )],
        )
        .unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn in_band_error_column_is_an_execution_fault() {
        let query = SeriesQuery::new("airSensor", "humidity", 60, 100);
        let err = table_from_chunks(
            &query,
            &[chunk(
                &["", "error", "reference"],
                &[&["", "bucket \"nope\" not found", ""]],
            )],
        )
        .unwrap_err();
        match err {
            QueryError::Execution { message, .. } => assert!(message.contains("not found")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn serialized_table_uses_output_schema_and_is_stable() {
        let table = SeriesTable::new(
            "humidity",
            vec![Reading::new(ts(0), 82.0), Reading::new(ts(1), 80.0)],
        );
        let first = serde_json::to_string(&table).unwrap();
        let second = serde_json::to_string(&table.clone()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            r#"{"columns":["Timestamp","humidity"],"rows":[{"Timestamp":"2026-10-18T12:01:00Z","humidity":80.0},{"Timestamp":"2026-10-18T12:00:00Z","humidity":82.0}]}"#
        );
    }

    #[test]
    fn parsed_response_serializes_identically_each_time() {
        let body = "#datatype,string,long,dateTime:RFC3339,double,string\r\n\
#group,false,false,false,false,true\r\n\
#default,_result,,,,\r\n\
,result,table,_time,_value,_field\r\n\
,,0,2026-10-18T12:00:00Z,82,humidity\r\n\
,,0,2026-10-18T12:02:00Z,79.5,humidity\r\n\
\r\n\
#datatype,string,long,dateTime:RFC3339,double,string\r\n\
#group,false,false,false,false,true\r\n\
#default,_result,,,,\r\n\
,result,table,_time,_value,_field\r\n\
,,1,2026-10-18T12:01:00Z,80,humidity\r\n\
\r\n";
        let query = SeriesQuery::new("airSensor", "humidity", 60, 100);
        let render = || {
            let chunks = annotated_csv::parse_chunks(body).unwrap();
            serde_json::to_vec(&table_from_chunks(&query, &chunks).unwrap()).unwrap()
        };
        let first = render();
        assert_eq!(first, render());
        assert_eq!(
            String::from_utf8(first).unwrap(),
            r#"{"columns":["Timestamp","humidity"],"rows":[{"Timestamp":"2026-10-18T12:02:00Z","humidity":79.5},{"Timestamp":"2026-10-18T12:01:00Z","humidity":80.0},{"Timestamp":"2026-10-18T12:00:00Z","humidity":82.0}]}"#
        );
    }

    fn serve_once(status_line: &'static str, body: &'static str) -> Option<(String, mpsc::Receiver<String>)> {
        serve_raw(format!(
            "{status_line}\r\nContent-Type: text/csv\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
    }

    /// Writes `response` verbatim to the first client, then closes the socket
    /// and hands back the raw request.
    fn serve_raw(response: String) -> Option<(String, mpsc::Receiver<String>)> {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            // Sandbox environments can block binding attempts.
            Err(_) => return None,
        };
        let addr = listener.local_addr().ok()?;
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let Ok((mut stream, _)) = listener.accept() else {
                return;
            };
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let Ok(n) = stream.read(&mut buf) else { break };
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let content_length = text[..header_end]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + content_length {
                        break;
                    }
                }
            }
            let _ = stream.write_all(response.as_bytes());
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());
        });
        Some((format!("http://{addr}"), rx))
    }

    #[test]
    fn fetch_posts_flux_and_parses_response() {
        let body = "#datatype,string,long,dateTime:RFC3339,double\r\n\
,result,table,_time,_value\r\n\
,_result,0,2026-10-18T12:01:00Z,80\r\n\
,_result,0,2026-10-18T12:00:00Z,82\r\n\r\n";
        let Some((url, requests)) = serve_once("HTTP/1.1 200 OK", body) else {
            return;
        };
        let store = InfluxStore::new(store_config(&url)).unwrap();
        let table = store.fetch_series("airSensor", "humidity", 60, 100).unwrap();
        assert_eq!(table.values().collect::<Vec<_>>(), vec![80.0, 82.0]);

        let request = requests.recv().unwrap();
        assert!(request.starts_with("POST /api/v2/query?org=farm+org "), "{request}");
        let lower = request.to_lowercase();
        assert!(lower.contains("authorization: token tok-123"));
        assert!(lower.contains("content-type: application/vnd.flux"));
        assert!(request.contains(r#"from(bucket: "microcrops")"#));
        assert!(request.contains("limit(n: 100)"));
    }

    #[test]
    fn http_error_status_becomes_execution_fault() {
        let Some((url, _requests)) = serve_once(
            "HTTP/1.1 401 Unauthorized",
            r#"{"code":"unauthorized","message":"unauthorized access"}"#,
        ) else {
            return;
        };
        let store = InfluxStore::new(store_config(&url)).unwrap();
        let err = store
            .fetch_series("airSensor", "humidity", 60, 100)
            .unwrap_err();
        match err {
            QueryError::Execution { message, .. } => {
                assert!(message.contains("401"), "{message}");
                assert!(message.contains("unauthorized access"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_success_body_becomes_execution_fault() {
        let Some((url, _requests)) = serve_raw(
            "HTTP/1.1 200 OK\r\nContent-Type: text/csv\r\nContent-Length: 5000\r\nConnection: close\r\n\r\n\
,result,table,_time,_value\r\n"
                .to_string(),
        ) else {
            return;
        };
        let store = InfluxStore::new(store_config(&url)).unwrap();
        let result = store.fetch_series("airSensor", "humidity", 60, 100);
        assert!(
            matches!(result, Err(QueryError::Execution { .. })),
            "{result:?}"
        );
    }

    #[test]
    fn unreachable_store_becomes_execution_fault() {
        let listener = match TcpListener::bind("127.0.0.1:0") {
            Ok(listener) => listener,
            Err(_) => return,
        };
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = InfluxStore::new(store_config(&format!("http://{addr}"))).unwrap();
        let err = store.fetch_series("uv_sensor", "uv_index", 10, 100).unwrap_err();
        assert!(matches!(err, QueryError::Execution { .. }), "{err}");
    }
}
