use serde::Serialize;
use std::fmt;

use crate::store::SeriesTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl Trend {
    pub fn between(latest: f64, previous: f64) -> Self {
        if latest > previous {
            Trend::Rising
        } else if latest < previous {
            Trend::Falling
        } else {
            Trend::Stable
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Trend::Rising => "Rising ⬆️",
            Trend::Falling => "Falling ⬇️",
            Trend::Stable => "Stable ➡️",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary of one table. Fields stay `None` when there are too few readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

impl StatsRecord {
    pub fn is_empty(&self) -> bool {
        *self == StatsRecord::default()
    }
}

/// Rounds to two decimals, ties to even.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Relies on the table being newest first: index 0 is latest, index 1 previous.
pub fn compute_stats(table: &SeriesTable) -> StatsRecord {
    let readings = table.readings();
    match readings {
        [] => StatsRecord::default(),
        [only] => StatsRecord {
            latest: Some(round2(only.value)),
            ..StatsRecord::default()
        },
        [latest, previous, ..] => {
            let (min, max, sum) = table.values().fold(
                (f64::INFINITY, f64::NEG_INFINITY, 0.0),
                |(min, max, sum), value| (min.min(value), max.max(value), sum + value),
            );
            let mean = sum / readings.len() as f64;
            let latest = round2(latest.value);
            let previous = round2(previous.value);
            StatsRecord {
                min: Some(round2(min)),
                max: Some(round2(max)),
                mean: Some(round2(mean)),
                latest: Some(latest),
                previous: Some(previous),
                trend: Some(Trend::between(latest, previous)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Reading;
    use chrono::{Duration, TimeZone, Utc};

    fn table(values_newest_first: &[f64]) -> SeriesTable {
        let newest = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let readings = values_newest_first
            .iter()
            .enumerate()
            .map(|(idx, value)| Reading::new(newest - Duration::minutes(idx as i64), *value))
            .collect();
        SeriesTable::new("humidity", readings)
    }

    #[test]
    fn empty_table_gives_empty_record() {
        let stats = compute_stats(&table(&[]));
        assert!(stats.is_empty());
        assert_eq!(serde_json::to_string(&stats).unwrap(), "{}");
    }

    #[test]
    fn single_row_sets_only_latest() {
        let stats = compute_stats(&table(&[21.456]));
        assert_eq!(
            stats,
            StatsRecord {
                latest: Some(21.46),
                ..StatsRecord::default()
            }
        );
    }

    #[test]
    fn humidity_example_is_falling() {
        let stats = compute_stats(&table(&[80.0, 82.0]));
        assert_eq!(
            stats,
            StatsRecord {
                min: Some(80.0),
                max: Some(82.0),
                mean: Some(81.0),
                latest: Some(80.0),
                previous: Some(82.0),
                trend: Some(Trend::Falling),
            }
        );
    }

    #[test]
    fn latest_and_previous_follow_time_order_not_input_order() {
        let oldest = Utc.with_ymd_and_hms(2026, 10, 18, 11, 0, 0).unwrap();
        let readings = vec![
            Reading::new(oldest, 10.0),
            Reading::new(oldest + Duration::minutes(2), 30.0),
            Reading::new(oldest + Duration::minutes(1), 20.0),
        ];
        let stats = compute_stats(&SeriesTable::new("temperature", readings));
        assert_eq!(stats.latest, Some(30.0));
        assert_eq!(stats.previous, Some(20.0));
        assert_eq!(stats.trend, Some(Trend::Rising));
        assert_eq!(stats.mean, Some(20.0));
    }

    #[test]
    fn trend_is_exhaustive_and_exclusive() {
        for (latest, previous, expected) in [
            (5.0, 4.0, Trend::Rising),
            (4.0, 5.0, Trend::Falling),
            (4.5, 4.5, Trend::Stable),
        ] {
            let stats = compute_stats(&table(&[latest, previous]));
            assert_eq!(stats.trend, Some(expected));
        }
    }

    #[test]
    fn trend_compares_rounded_values() {
        let stats = compute_stats(&table(&[20.001, 20.004]));
        assert_eq!(stats.latest, stats.previous);
        assert_eq!(stats.trend, Some(Trend::Stable));
    }

    #[test]
    fn aggregates_cover_every_row() {
        let stats = compute_stats(&table(&[3.0, 1.0, 7.5, 2.25]));
        assert_eq!(stats.min, Some(1.0));
        assert_eq!(stats.max, Some(7.5));
        assert_eq!(stats.mean, Some(3.44));
        assert_eq!(stats.latest, Some(3.0));
        assert_eq!(stats.previous, Some(1.0));
    }

    #[test]
    fn rounds_half_to_even() {
        assert_eq!(round2(0.125), 0.12);
        assert_eq!(round2(0.375), 0.38);
        assert_eq!(round2(2.0), 2.0);
    }
}
