//! Remote pinning service clients.
//!
//! Two API flavours are supported: the IPFS Pinning Service API
//! (bearer token) and hosted Kubo RPC endpoints (basic credentials).

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{PinServiceConfig, PinServiceKind};
use crate::content_id::ContentId;
use crate::error::StoreError;

#[derive(Debug, Serialize)]
struct PinRequest<'a> {
    cid: String,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct PinStatusResponse {
    #[serde(default)]
    requestid: String,
    #[serde(default)]
    status: String,
}

/// Authenticated client for one remote pinning service.
pub struct PinningService {
    name: String,
    endpoint: String,
    kind: PinServiceKind,
    http: reqwest::Client,
}

impl PinningService {
    /// Creates a client from config.
    ///
    /// Returns `Ok(None)` when the service has no credential.
    pub fn from_config(config: &PinServiceConfig) -> Result<Option<Self>, StoreError> {
        let Some(token) = config.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(None);
        };

        let scheme = match config.kind {
            PinServiceKind::Psa => "Bearer",
            PinServiceKind::KuboRpc => "Basic",
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("{scheme} {}", token.trim())).map_err(|_| {
                StoreError::init(format!("pinning service {} has an invalid token", config.name))
            })?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::init(format!("HTTP client: {e}")))?;

        Ok(Some(Self {
            name: config.name.clone(),
            endpoint: config.endpoint.trim().trim_end_matches('/').to_string(),
            kind: config.kind,
            http,
        }))
    }

    /// Returns the configured service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Requests that the service pin `cid`, labelled `label`.
    pub async fn pin(&self, cid: &ContentId, label: &str) -> Result<(), StoreError> {
        let resp = match self.kind {
            PinServiceKind::Psa => {
                let body = PinRequest {
                    cid: cid.to_string(),
                    name: label,
                };
                self.http
                    .post(format!("{}/pins", self.endpoint))
                    .json(&body)
                    .send()
                    .await?
            }
            PinServiceKind::KuboRpc => {
                self.http
                    .post(format!("{}/pin/add", self.endpoint))
                    .query(&[("arg", cid.to_string())])
                    .send()
                    .await?
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        if self.kind == PinServiceKind::Psa {
            let body = resp.bytes().await?;
            if let Ok(pin) = serde_json::from_slice::<PinStatusResponse>(&body) {
                debug!(service = %self.name, request = %pin.requestid, status = %pin.status, "pin queued");
            }
        }

        Ok(())
    }
}
