use serde::{Deserialize, Serialize};
use url::Url;

const PLACEHOLDER_PREFIX: &str = "URL_GRAFANA_PANEL_";

/// A named link to an externally hosted dashboard panel, as configured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelLink {
    pub name: String,
    pub url: String,
    pub valid: bool,
}

/// Panels shipped with the dashboard. Every URL starts out as a placeholder
/// and is flagged invalid until replaced through the setup file.
pub fn default_panel_catalog() -> Vec<PanelConfig> {
    [
        ("Temperature (DHT22)", "TEMPERATURA_LINEA"),
        ("Heat index (DHT22)", "INDICE_CALOR_LINEA"),
        ("Humidity (DHT22)", "HUMEDAD_LINEA"),
        ("Temperature levels (general)", "TEMPERATURA_NIVELES_LINEA"),
        ("Humidity heatmap", "HUMEDAD_HEATMAP"),
        ("Temperature heatmap", "TEMPERATURA_HEATMAP"),
        ("UV light intensity (VEML6070)", "UV_LINEA"),
    ]
    .into_iter()
    .map(|(name, slug)| PanelConfig {
        name: name.to_string(),
        url: format!("{PLACEHOLDER_PREFIX}{slug}"),
    })
    .collect()
}

/// Accepts only absolute http(s) URLs with a host.
pub fn is_well_formed_link(raw: &str) -> bool {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with(PLACEHOLDER_PREFIX) {
        return false;
    }
    match Url::parse(raw) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some(),
        Err(_) => false,
    }
}

pub fn panel_links(panels: &[PanelConfig]) -> Vec<PanelLink> {
    panels
        .iter()
        .map(|panel| {
            let valid = is_well_formed_link(&panel.url);
            if !valid {
                tracing::debug!(panel = %panel.name, "panel URL not configured");
            }
            PanelLink {
                name: panel.name.clone(),
                url: panel.url.trim().to_string(),
                valid,
            }
        })
        .collect()
}
