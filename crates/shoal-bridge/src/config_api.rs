//! HTTP client for the broadcaster config service.
//!
//! Two endpoints are used:
//!
//! - `GET {base}/api/overlay/{streamer}/config` -- the versioned
//!   [`OverlayConfig`], polled as a fallback to pushes.
//! - `POST {base}/api/skins/lookup` -- batched preferred-skin lookup for
//!   newly observed identities.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shoal_core::{ConfigSource, SkinDirectory, SourceError};
use shoal_types::{OverlayConfig, SkinId, ViewerKey};
use tracing::debug;

use crate::error::BridgeError;
use crate::subjects;

/// Body of a skin lookup.
#[derive(Debug, Serialize)]
struct SkinLookupRequest<'a> {
    identities: &'a [ViewerKey],
}

/// Reply to a skin lookup. Identities without a preference are absent.
#[derive(Debug, Default, Deserialize)]
struct SkinLookupReply {
    #[serde(default)]
    skins: BTreeMap<ViewerKey, SkinId>,
}

/// Client for the config service.
#[derive(Debug, Clone)]
pub struct HttpConfigApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpConfigApi {
    /// Create a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Http`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BridgeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Http {
                url: base_url.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        })
    }

    /// URL of a streamer's config document.
    pub fn config_url(&self, streamer: &ViewerKey) -> String {
        format!("{}/api/overlay/{}/config", self.base_url, streamer.normalized())
    }

    /// URL of the batched skin lookup.
    pub fn lookup_url(&self) -> String {
        format!("{}/api/skins/lookup", self.base_url)
    }

    /// Fetch a streamer's config.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] on transport failure, error status, or an
    /// undecodable body.
    pub async fn get_config(&self, streamer: &ViewerKey) -> Result<OverlayConfig, BridgeError> {
        let url = self.config_url(streamer);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_error(&url, &e))?;
        let body = self.body(&url, response).await?;
        let config = subjects::decode_config(&body)?;
        debug!(url, version = config.version, "config fetched");
        Ok(config)
    }

    /// Look up preferred skins for a batch of identities.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] on transport failure, error status, or an
    /// undecodable body.
    pub async fn lookup_skins(
        &self,
        identities: &[ViewerKey],
    ) -> Result<BTreeMap<ViewerKey, SkinId>, BridgeError> {
        let url = self.lookup_url();
        let response = self
            .client
            .post(&url)
            .json(&SkinLookupRequest { identities })
            .send()
            .await
            .map_err(|e| self.transport_error(&url, &e))?;
        let body = self.body(&url, response).await?;
        let reply: SkinLookupReply =
            serde_json::from_slice(&body).map_err(|source| BridgeError::Decode {
                what: "skin lookup",
                source,
            })?;
        debug!(url, asked = identities.len(), found = reply.skins.len(), "skins looked up");
        Ok(reply
            .skins
            .into_iter()
            .map(|(identity, skin)| (identity.normalized(), skin.normalized()))
            .collect())
    }

    async fn body(&self, url: &str, response: reqwest::Response) -> Result<Vec<u8>, BridgeError> {
        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(url, &e))?;
        Ok(bytes.to_vec())
    }

    fn transport_error(&self, url: &str, error: &reqwest::Error) -> BridgeError {
        if error.is_timeout() {
            BridgeError::TimedOut {
                subject: url.to_owned(),
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            }
        } else {
            BridgeError::Http {
                url: url.to_owned(),
                reason: error.to_string(),
            }
        }
    }
}

impl ConfigSource for HttpConfigApi {
    async fn fetch_config(&self, streamer: &ViewerKey) -> Result<OverlayConfig, SourceError> {
        Ok(self.get_config(streamer).await?)
    }
}

impl SkinDirectory for HttpConfigApi {
    async fn lookup(&self, identities: &[ViewerKey]) -> Result<BTreeMap<ViewerKey, SkinId>, SourceError> {
        Ok(self.lookup_skins(identities).await?)
    }
}
