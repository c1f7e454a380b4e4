//! HttpGateway - JSON over HTTP against the simulation backend

use std::time::Duration;

use contracts::{
    BackendConfig, BackendGateway, ControlAck, GatewayOp, Sample, StatusReport, TransportError,
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::{classify, decode_failure, GatewayError, Result};

/// Backend gateway backed by a shared `reqwest::Client`
///
/// No retries: a failed call is reported once and the engine decides what happens next.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGateway {
    /// Build a gateway from backend settings
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| GatewayError::ClientBuild {
                message: e.to_string(),
            })?;
        Ok(Self { client, base_url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: GatewayOp,
        path: &str,
    ) -> std::result::Result<T, TransportError> {
        let request = self.client.get(self.url(path));
        self.execute(operation, request).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        operation: GatewayOp,
        path: &str,
    ) -> std::result::Result<T, TransportError> {
        let request = self.client.post(self.url(path));
        self.execute(operation, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: GatewayOp,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<T, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|e| classify(operation, &e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(op = %operation, status = status.as_u16(), "Backend rejected request");
            return Err(TransportError::status(operation, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| classify(operation, &e))?;
        debug!(op = %operation, bytes = body.len(), "Backend response received");

        serde_json::from_slice(&body).map_err(|e| decode_failure(operation, &e))
    }
}

/// Strip trailing slashes and require an http(s) scheme
fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let host = match trimmed.split_once("://") {
        Some((scheme, rest))
            if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https") =>
        {
            rest
        }
        _ => return Err(GatewayError::invalid_url(raw, "expected http:// or https://")),
    };
    if host.is_empty() {
        return Err(GatewayError::invalid_url(raw, "missing host"));
    }
    Ok(trimmed.to_string())
}

impl BackendGateway for HttpGateway {
    fn endpoint(&self) -> &str {
        &self.base_url
    }

    #[instrument(name = "gateway_start", skip(self), fields(endpoint = %self.base_url))]
    async fn start(&self) -> std::result::Result<ControlAck, TransportError> {
        self.post_json(GatewayOp::Start, "/start").await
    }

    #[instrument(name = "gateway_stop", skip(self), fields(endpoint = %self.base_url))]
    async fn stop(&self) -> std::result::Result<ControlAck, TransportError> {
        self.post_json(GatewayOp::Stop, "/stop").await
    }

    #[instrument(name = "gateway_status", skip(self), fields(endpoint = %self.base_url))]
    async fn status(&self) -> std::result::Result<StatusReport, TransportError> {
        self.get_json(GatewayOp::Status, "/status").await
    }

    #[instrument(name = "gateway_fetch_all", skip(self), fields(endpoint = %self.base_url))]
    async fn fetch_all(&self) -> std::result::Result<Vec<Sample>, TransportError> {
        self.get_json(GatewayOp::FetchAll, "/results").await
    }

    #[instrument(name = "gateway_fetch_latest", skip(self), fields(endpoint = %self.base_url))]
    async fn fetch_latest(&self) -> std::result::Result<Vec<Sample>, TransportError> {
        self.get_json(GatewayOp::FetchLatest, "/results/latest").await
    }
}
