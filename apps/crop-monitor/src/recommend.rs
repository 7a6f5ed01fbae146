use serde::Serialize;

use crate::fields::MonitoredField;

pub const ALL_CLEAR_MESSAGE: &str =
    "✅ No specific recommendations right now, or not enough data to make any.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Informational,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Low,
    High,
    NoData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub field: MonitoredField,
    pub outcome: Outcome,
    pub severity: Severity,
    pub message: String,
}

/// Safe band for one field. Values strictly below `low` or strictly above
/// `high` produce an advisory; the bounds themselves are safe.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdRule {
    pub field: MonitoredField,
    pub low: f64,
    pub high: f64,
    pub low_message: &'static str,
    pub high_message: &'static str,
    pub no_data_message: &'static str,
}

impl ThresholdRule {
    pub fn evaluate(&self, latest: Option<f64>) -> Option<Recommendation> {
        let (outcome, severity, message) = match latest {
            None => (Outcome::NoData, Severity::Unknown, self.no_data_message),
            Some(value) if value < self.low => {
                (Outcome::Low, Severity::Informational, self.low_message)
            }
            Some(value) if value > self.high => {
                (Outcome::High, Severity::Informational, self.high_message)
            }
            Some(_) => return None,
        };
        Some(Recommendation {
            field: self.field,
            outcome,
            severity,
            message: message.to_string(),
        })
    }
}

// Conservative example values for leafy micro-crops, not a calibrated model.
pub const PLANT_CARE_RULES: [ThresholdRule; 3] = [
    ThresholdRule {
        field: MonitoredField::Humidity,
        low: 35.0,
        high: 75.0,
        low_message: "💧 Low humidity: ambient humidity is below 35%. Consider raising it, for example by misting nearby or grouping plants.",
        high_message: "💧 High humidity: ambient humidity is above 75%. Make sure there is good ventilation to prevent mould.",
        no_data_message: "❓ Humidity: no recent data to base a recommendation on.",
    },
    ThresholdRule {
        field: MonitoredField::Temperature,
        low: 15.0,
        high: 28.0,
        low_message: "🌡️ Low temperature: it is below 15°C. Protect cold-sensitive crops.",
        high_message: "🌡️ High temperature: it is above 28°C. Provide shade or improve ventilation if possible.",
        no_data_message: "❓ Temperature: no recent data to base a recommendation on.",
    },
    ThresholdRule {
        field: MonitoredField::UvIndex,
        low: 2.0,
        high: 7.0,
        low_message: "☀️ Low UV radiation: the UV index is below 2. Make sure crops get enough indirect light, or consider supplemental lighting for their growth stage.",
        high_message: "☀️ High UV radiation: the UV index is above 7. Consider partial shade, especially during peak sun hours.",
        no_data_message: "❓ UV index: no recent data to base a recommendation on.",
    },
];

/// Latest value per monitored field, as fed to the rules.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatestReadings {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub uv_index: Option<f64>,
}

impl LatestReadings {
    pub fn get(&self, field: MonitoredField) -> Option<f64> {
        match field {
            MonitoredField::Temperature => self.temperature,
            MonitoredField::Humidity => self.humidity,
            MonitoredField::UvIndex => self.uv_index,
        }
    }
}

pub fn recommend(
    latest_temperature: Option<f64>,
    latest_humidity: Option<f64>,
    latest_uv: Option<f64>,
) -> Vec<Recommendation> {
    let latest = LatestReadings {
        temperature: latest_temperature,
        humidity: latest_humidity,
        uv_index: latest_uv,
    };
    apply_rules(&PLANT_CARE_RULES, &latest)
}

pub fn apply_rules(rules: &[ThresholdRule], latest: &LatestReadings) -> Vec<Recommendation> {
    rules
        .iter()
        .filter_map(|rule| rule.evaluate(latest.get(rule.field)))
        .collect()
}

/// How the advisory section should be shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AdvisorySummary {
    /// Nothing actionable; shown as a single success message.
    AllClear { message: String },
    Advisories {
        prominent: Vec<Recommendation>,
        notes: Vec<Recommendation>,
    },
}

pub fn summarize(recommendations: &[Recommendation]) -> AdvisorySummary {
    let (prominent, notes): (Vec<Recommendation>, Vec<Recommendation>) = recommendations
        .iter()
        .cloned()
        .partition(|rec| rec.severity == Severity::Informational);
    if prominent.is_empty() {
        return AdvisorySummary::AllClear {
            message: ALL_CLEAR_MESSAGE.to_string(),
        };
    }
    AdvisorySummary::Advisories { prominent, notes }
}
