//! Collaborator traits and stub implementations.
//!
//! The engine talks to four external collaborators: the automation
//! controller's roster, the skin directory, the broadcaster config service,
//! and the controller's race-winner inbox. Each is a trait so the runner
//! can be driven by the real network bridge in production and by the stubs
//! below in tests.
//!
//! Failures are classified, not propagated: connectivity failures flip the
//! overlay to its disconnected state, malformed payloads keep the last good
//! state.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use shoal_types::{OverlayConfig, RaceWinnerReport, RosterEntry, SkinId, ViewerKey};
use tokio::sync::Mutex;

/// Errors a collaborator can report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The collaborator could not be reached.
    #[error("collaborator unavailable: {reason}")]
    Unavailable {
        /// What failed.
        reason: String,
    },

    /// The collaborator answered with something unusable.
    #[error("malformed payload: {reason}")]
    Malformed {
        /// What was wrong with it.
        reason: String,
    },

    /// The collaborator did not answer in time.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout {
        /// The deadline that passed.
        timeout_ms: u64,
    },
}

impl SourceError {
    /// Whether the failure means the link itself is down.
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Source of the current audience roster.
pub trait RosterSource: Send + Sync + 'static {
    /// Request the identities currently present in the channel.
    fn fetch_roster(
        &self,
        streamer: &ViewerKey,
    ) -> impl Future<Output = Result<Vec<RosterEntry>, SourceError>> + Send;
}

/// Directory of viewers' preferred skins.
pub trait SkinDirectory: Send + Sync + 'static {
    /// Look up preferred skins for a batch of identities. Identities with
    /// no preference are simply absent from the result.
    fn lookup(
        &self,
        identities: &[ViewerKey],
    ) -> impl Future<Output = Result<BTreeMap<ViewerKey, SkinId>, SourceError>> + Send;
}

/// Versioned broadcaster configuration endpoint.
pub trait ConfigSource: Send + Sync + 'static {
    /// Fetch the broadcaster's current overlay settings.
    fn fetch_config(
        &self,
        streamer: &ViewerKey,
    ) -> impl Future<Output = Result<OverlayConfig, SourceError>> + Send;
}

/// Receiver of race results.
pub trait WinnerSink: Send + Sync + 'static {
    /// Report a finished race to the automation controller.
    fn report_winner(
        &self,
        report: &RaceWinnerReport,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;
}

/// A roster source whose answer can be changed while the runner is live.
#[derive(Debug, Clone)]
pub struct StubRosterSource {
    reply: Arc<Mutex<Result<Vec<RosterEntry>, SourceError>>>,
}

impl StubRosterSource {
    /// Start out answering with the given roster.
    pub fn new(roster: Vec<RosterEntry>) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Ok(roster))),
        }
    }

    /// Answer with a new roster from now on.
    pub async fn set_roster(&self, roster: Vec<RosterEntry>) {
        *self.reply.lock().await = Ok(roster);
    }

    /// Fail with the given error from now on.
    pub async fn set_failure(&self, error: SourceError) {
        *self.reply.lock().await = Err(error);
    }
}

impl RosterSource for StubRosterSource {
    async fn fetch_roster(&self, _streamer: &ViewerKey) -> Result<Vec<RosterEntry>, SourceError> {
        self.reply.lock().await.clone()
    }
}

/// A skin directory backed by a fixed map that records every batch.
#[derive(Debug, Clone, Default)]
pub struct StubSkinDirectory {
    skins: BTreeMap<ViewerKey, SkinId>,
    batches: Arc<Mutex<Vec<Vec<ViewerKey>>>>,
}

impl StubSkinDirectory {
    /// Answer lookups from the given map.
    pub fn new(skins: BTreeMap<ViewerKey, SkinId>) -> Self {
        Self {
            skins,
            batches: Arc::default(),
        }
    }

    /// Every batch requested so far.
    pub async fn batches(&self) -> Vec<Vec<ViewerKey>> {
        self.batches.lock().await.clone()
    }
}

impl SkinDirectory for StubSkinDirectory {
    async fn lookup(&self, identities: &[ViewerKey]) -> Result<BTreeMap<ViewerKey, SkinId>, SourceError> {
        self.batches.lock().await.push(identities.to_vec());
        Ok(identities
            .iter()
            .filter_map(|id| self.skins.get(id).map(|skin| (id.clone(), skin.clone())))
            .collect())
    }
}

/// A config source whose answer can be changed while the runner is live.
#[derive(Debug, Clone)]
pub struct StubConfigSource {
    reply: Arc<Mutex<Result<OverlayConfig, SourceError>>>,
}

impl StubConfigSource {
    /// Start out answering with the given config.
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            reply: Arc::new(Mutex::new(Ok(config))),
        }
    }

    /// Answer with a new config from now on.
    pub async fn set_config(&self, config: OverlayConfig) {
        *self.reply.lock().await = Ok(config);
    }
}

impl ConfigSource for StubConfigSource {
    async fn fetch_config(&self, _streamer: &ViewerKey) -> Result<OverlayConfig, SourceError> {
        self.reply.lock().await.clone()
    }
}

/// A winner sink that keeps every report.
#[derive(Debug, Clone, Default)]
pub struct RecordingWinnerSink {
    reports: Arc<Mutex<Vec<RaceWinnerReport>>>,
}

impl RecordingWinnerSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every report received so far.
    pub async fn reports(&self) -> Vec<RaceWinnerReport> {
        self.reports.lock().await.clone()
    }
}

impl WinnerSink for RecordingWinnerSink {
    async fn report_winner(&self, report: &RaceWinnerReport) -> Result<(), SourceError> {
        self.reports.lock().await.push(report.clone());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_roster_can_fail_and_recover() {
        let stub = StubRosterSource::new(vec![RosterEntry::viewer("a")]);
        let streamer = ViewerKey::new("reef");
        assert_eq!(stub.fetch_roster(&streamer).await.unwrap().len(), 1);

        stub.set_failure(SourceError::Timeout { timeout_ms: 10 }).await;
        let err = stub.fetch_roster(&streamer).await.unwrap_err();
        assert!(err.is_connectivity());

        stub.set_roster(Vec::new()).await;
        assert!(stub.fetch_roster(&streamer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stub_directory_records_batches() {
        let mut skins = BTreeMap::new();
        skins.insert(ViewerKey::new("a"), SkinId::new("shark"));
        let stub = StubSkinDirectory::new(skins);
        let found = stub
            .lookup(&[ViewerKey::new("a"), ViewerKey::new("b")])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(stub.batches().await.len(), 1);
    }

    #[test]
    fn malformed_is_not_connectivity() {
        let err = SourceError::Malformed {
            reason: "bad json".to_owned(),
        };
        assert!(!err.is_connectivity());
    }
}
