use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const ROW_LIMIT: usize = 100;
pub const LOOKBACK_OPTIONS_MINUTES: [u32; 7] = [10, 30, 60, 120, 180, 240, 360];
pub const DEFAULT_LOOKBACK_MINUTES: u32 = 60;

/// Sensor attributes the dashboard tracks, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoredField {
    Temperature,
    Humidity,
    UvIndex,
}

impl MonitoredField {
    pub const ALL: [MonitoredField; 3] = [
        MonitoredField::Temperature,
        MonitoredField::Humidity,
        MonitoredField::UvIndex,
    ];

    /// Measurement name the field is stored under.
    pub fn series(self) -> &'static str {
        match self {
            MonitoredField::Temperature | MonitoredField::Humidity => "airSensor",
            MonitoredField::UvIndex => "uv_sensor",
        }
    }

    pub fn field(self) -> &'static str {
        match self {
            MonitoredField::Temperature => "temperature",
            MonitoredField::Humidity => "humidity",
            MonitoredField::UvIndex => "uv_index",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            MonitoredField::Temperature => "Temperature",
            MonitoredField::Humidity => "Humidity",
            MonitoredField::UvIndex => "UV index",
        }
    }
}

impl fmt::Display for MonitoredField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.series(), self.field())
    }
}

/// Minutes of history to fetch, restricted to the selector options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LookbackWindow(u32);

impl LookbackWindow {
    pub fn new(minutes: u32) -> Result<Self, String> {
        if LOOKBACK_OPTIONS_MINUTES.contains(&minutes) {
            Ok(Self(minutes))
        } else {
            Err(format!(
                "lookback must be one of {:?} minutes (got {minutes})",
                LOOKBACK_OPTIONS_MINUTES
            ))
        }
    }

    pub fn minutes(self) -> u32 {
        self.0
    }
}

impl Default for LookbackWindow {
    fn default() -> Self {
        Self(DEFAULT_LOOKBACK_MINUTES)
    }
}

impl FromStr for LookbackWindow {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let minutes = raw
            .trim()
            .trim_end_matches('m')
            .parse::<u32>()
            .map_err(|_| format!("invalid lookback minutes: {raw}"))?;
        Self::new(minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_accepts_only_selector_options() {
        for minutes in LOOKBACK_OPTIONS_MINUTES {
            assert_eq!(LookbackWindow::new(minutes).unwrap().minutes(), minutes);
        }
        assert!(LookbackWindow::new(0).is_err());
        assert!(LookbackWindow::new(45).is_err());
        assert!(LookbackWindow::new(720).is_err());
    }

    #[test]
    fn lookback_defaults_to_one_hour_and_parses_suffix() {
        assert_eq!(LookbackWindow::default().minutes(), 60);
        assert_eq!("120m".parse::<LookbackWindow>().unwrap().minutes(), 120);
        assert_eq!(" 30 ".parse::<LookbackWindow>().unwrap().minutes(), 30);
        assert!("an hour".parse::<LookbackWindow>().is_err());
    }

    #[test]
    fn monitored_fields_map_to_store_names() {
        assert_eq!(MonitoredField::Temperature.to_string(), "airSensor/temperature");
        assert_eq!(MonitoredField::Humidity.to_string(), "airSensor/humidity");
        assert_eq!(MonitoredField::UvIndex.to_string(), "uv_sensor/uv_index");
    }
}
