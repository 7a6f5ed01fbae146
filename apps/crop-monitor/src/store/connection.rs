use reqwest::blocking::Client as HttpClient;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub(super) enum TransportError {
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    #[error("store returned {status}: {message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },
}

#[derive(Debug, Deserialize)]
struct StoreErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// One acquire/release cycle against the store. Released on drop, whether the
/// query succeeded or not.
pub(super) struct StoreConnection<'a> {
    client: HttpClient,
    token: &'a str,
    target: String,
}

impl<'a> StoreConnection<'a> {
    pub(super) fn open(token: &'a str, target: String) -> Result<Self, TransportError> {
        let client = HttpClient::builder()
            .user_agent(concat!("crop-monitor/", env!("CARGO_PKG_VERSION")))
            .build()?;
        tracing::debug!(target_series = %target, "store connection opened");
        Ok(Self {
            client,
            token,
            target,
        })
    }

    pub(super) fn query(&self, endpoint: &Url, flux: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .post(endpoint.clone())
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(ACCEPT, "application/csv")
            .header(CONTENT_TYPE, "application/vnd.flux")
            .body(flux.to_string())
            .send()?;

        let status = response.status();
        if !status.is_success() {
            // The body only carries the error message here.
            let text = response.text().unwrap_or_default();
            let message = serde_json::from_str::<StoreErrorBody>(&text)
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| text.trim().to_string());
            return Err(TransportError::Status { status, message });
        }
        // A truncated body must not read as a short result set.
        Ok(response.text()?)
    }
}

impl Drop for StoreConnection<'_> {
    fn drop(&mut self) {
        tracing::debug!(target_series = %self.target, "store connection released");
    }
}
