//! NATS link to the local automation controller.
//!
//! [`NatsController`] answers roster polls with request/reply on
//! `shoal.{streamer}.roster.request`, forwards triggers and config pushes
//! into the overlay loop's inbound channels, and publishes race winners.
//! See [`crate::subjects`] for the subject convention.

use std::time::Duration;

use async_nats::client::RequestErrorKind;
use futures::StreamExt as _;
use shoal_core::{RosterSource, SourceError, WinnerSink};
use shoal_types::{RaceWinnerReport, RosterEntry, ViewerKey};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::subjects::{self, RosterRequest, Subjects};

/// Controller client for one streamer channel.
#[derive(Clone)]
pub struct NatsController {
    client: async_nats::Client,
    subjects: Subjects,
    request_timeout: Duration,
}

impl NatsController {
    /// Connect to the NATS server the controller is attached to.
    ///
    /// The server may be down at startup: the client keeps retrying in the
    /// background, and until it succeeds roster requests fail as
    /// connectivity errors, which the overlay shows as disconnected.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connect`] if the URL or options are invalid.
    pub async fn connect(
        url: &str,
        streamer: &ViewerKey,
        request_timeout: Duration,
    ) -> Result<Self, BridgeError> {
        info!(url, streamer = %streamer, "connecting to automation controller");
        let client = async_nats::ConnectOptions::new()
            .request_timeout(Some(request_timeout))
            .retry_on_initial_connect()
            .connect(url)
            .await
            .map_err(|e| BridgeError::Connect {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self::new(client, streamer, request_timeout))
    }

    /// Wrap an already connected client.
    pub fn new(client: async_nats::Client, streamer: &ViewerKey, request_timeout: Duration) -> Self {
        Self {
            client,
            subjects: Subjects::for_streamer(streamer),
            request_timeout,
        }
    }

    /// Subjects this controller uses.
    pub const fn subjects(&self) -> &Subjects {
        &self.subjects
    }

    /// Request the current roster.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoResponders`] when the controller is not
    /// running, [`BridgeError::TimedOut`] when it does not answer in time,
    /// and [`BridgeError::Decode`] for an unusable reply.
    pub async fn request_roster(&self, streamer: &ViewerKey) -> Result<Vec<RosterEntry>, BridgeError> {
        let subject = self.subjects.roster_request.clone();
        let body = serde_json::to_vec(&RosterRequest { streamer }).map_err(|source| {
            BridgeError::Encode {
                what: "roster request",
                source,
            }
        })?;
        let reply = self
            .client
            .request(subject.clone(), body.into())
            .await
            .map_err(|e| match e.kind() {
                RequestErrorKind::NoResponders => BridgeError::NoResponders {
                    subject: subject.clone(),
                },
                RequestErrorKind::TimedOut => BridgeError::TimedOut {
                    subject: subject.clone(),
                    timeout_ms: u64::try_from(self.request_timeout.as_millis()).unwrap_or(u64::MAX),
                },
                RequestErrorKind::Other => BridgeError::Request {
                    subject: subject.clone(),
                    reason: e.to_string(),
                },
            })?;
        let roster = subjects::decode_roster(&reply.payload)?;
        debug!(subject, entries = roster.len(), "roster received");
        Ok(roster)
    }

    /// Publish a race winner and flush.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Publish`] if the message cannot be sent.
    pub async fn publish_winner(&self, report: &RaceWinnerReport) -> Result<(), BridgeError> {
        let subject = self.subjects.race_winner.clone();
        let payload = serde_json::to_vec(report).map_err(|source| BridgeError::Encode {
            what: "race winner",
            source,
        })?;
        self.client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| BridgeError::Publish {
                subject: subject.clone(),
                reason: e.to_string(),
            })?;
        self.client.flush().await.map_err(|e| BridgeError::Publish {
            subject,
            reason: e.to_string(),
        })
    }

    /// Forward every trigger for this channel into `tx`.
    ///
    /// Malformed triggers are logged and skipped. The task ends when the
    /// subscription closes or the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Subscribe`] if the subscription fails.
    pub async fn forward_triggers(
        &self,
        tx: mpsc::Sender<shoal_types::TriggerMessage>,
    ) -> Result<JoinHandle<()>, BridgeError> {
        self.forward(self.subjects.triggers.clone(), subjects::decode_trigger, tx)
            .await
    }

    /// Forward every config push for this channel into `tx`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Subscribe`] if the subscription fails.
    pub async fn forward_config_pushes(
        &self,
        tx: mpsc::Sender<shoal_types::OverlayConfig>,
    ) -> Result<JoinHandle<()>, BridgeError> {
        self.forward(self.subjects.config_saved.clone(), subjects::decode_config, tx)
            .await
    }

    async fn forward<T>(
        &self,
        subject: String,
        decode: fn(&[u8]) -> Result<T, BridgeError>,
        tx: mpsc::Sender<T>,
    ) -> Result<JoinHandle<()>, BridgeError>
    where
        T: Send + 'static,
    {
        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .map_err(|e| BridgeError::Subscribe {
                subject: subject.clone(),
                reason: e.to_string(),
            })?;
        info!(subject, "subscribed");

        Ok(tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                match decode(&message.payload) {
                    Ok(decoded) => {
                        if tx.send(decoded).await.is_err() {
                            debug!(subject, "receiver dropped, stopping forwarder");
                            break;
                        }
                    }
                    Err(error) => warn!(subject, %error, "dropping malformed message"),
                }
            }
        }))
    }
}

impl RosterSource for NatsController {
    async fn fetch_roster(&self, streamer: &ViewerKey) -> Result<Vec<RosterEntry>, SourceError> {
        Ok(self.request_roster(streamer).await?)
    }
}

impl WinnerSink for NatsController {
    async fn report_winner(&self, report: &RaceWinnerReport) -> Result<(), SourceError> {
        Ok(self.publish_winner(report).await?)
    }
}

impl std::fmt::Debug for NatsController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsController")
            .field("subjects", &self.subjects)
            .field("request_timeout_ms", &self.request_timeout.as_millis())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shoal_types::{EventId, TriggerKind, TriggerMessage};

    use super::*;

    const NATS_URL: &str = "nats://localhost:4222";

    /// A controller on a live server, or `None` when no server is running.
    async fn live() -> Option<NatsController> {
        match async_nats::connect(NATS_URL).await {
            Ok(client) => Some(NatsController::new(
                client,
                &ViewerKey::new("reef"),
                Duration::from_millis(500),
            )),
            Err(e) => {
                tracing::error!("NATS unavailable, skipping: {e}");
                None
            }
        }
    }

    #[tokio::test]
    async fn roster_without_controller_is_unavailable() {
        let Some(controller) = live().await else {
            return;
        };
        let err = controller.fetch_roster(&ViewerKey::new("reef")).await.unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn triggers_are_forwarded_and_junk_is_skipped() {
        let Some(controller) = live().await else {
            return;
        };
        let (tx, mut rx) = mpsc::channel(4);
        let handle = controller.forward_triggers(tx).await.unwrap();

        let subject = controller.subjects().triggers.clone();
        controller
            .client
            .publish(subject.clone(), b"not json".to_vec().into())
            .await
            .unwrap();
        let trigger = TriggerMessage {
            streamer: ViewerKey::new("reef"),
            event_kind: TriggerKind::Speak,
            participants: vec![ViewerKey::new("nemo")],
            text: Some("hi".to_owned()),
        };
        controller
            .client
            .publish(subject, serde_json::to_vec(&trigger).unwrap().into())
            .await
            .unwrap();
        controller.client.flush().await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await.unwrap();
        assert_eq!(received, Some(trigger));
        handle.abort();
    }

    #[tokio::test]
    async fn config_pushes_are_forwarded() {
        let Some(controller) = live().await else {
            return;
        };
        let (tx, mut rx) = mpsc::channel(4);
        let handle = controller.forward_config_pushes(tx).await.unwrap();

        let subject = controller.subjects().config_saved.clone();
        controller
            .client
            .publish(subject.clone(), br#"{"sceneSeed":1}"#.to_vec().into())
            .await
            .unwrap();
        controller
            .client
            .publish(subject, br#"{"version":9,"sceneSeed":4}"#.to_vec().into())
            .await
            .unwrap();
        controller.client.flush().await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.version, 9);
        assert_eq!(received.scene_seed, 4);
        handle.abort();
    }

    #[tokio::test]
    async fn winner_is_published_on_the_channel_subject() {
        let Some(controller) = live().await else {
            return;
        };
        let mut sub = controller
            .client
            .subscribe(controller.subjects().race_winner.clone())
            .await
            .unwrap();
        let report = RaceWinnerReport {
            streamer: ViewerKey::new("reef"),
            event_id: EventId::new(),
            winner: ViewerKey::new("nemo"),
            runner_up: Some(ViewerKey::new("dory")),
            finished_at: chrono::Utc::now(),
        };
        controller.report_winner(&report).await.unwrap();
        let message = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .unwrap()
            .unwrap();
        let decoded: RaceWinnerReport = serde_json::from_slice(&message.payload).unwrap();
        assert_eq!(decoded, report);
    }
}
