//! Overlay loop runner.
//!
//! [`run_overlay`] drives a [`Simulation`] at a fixed tick rate and feeds it
//! from independent timers:
//!
//! - **Roster poll**: request/response against the automation controller,
//!   with a timeout. New identities get one batched skin lookup per cycle.
//! - **Config poll**: fallback poll of the versioned config endpoint.
//! - **Config push**: unsolicited payloads after a broadcaster save.
//! - **Triggers**: inbound event requests from the controller.
//!
//! Pollers run as spawned tasks and hand their results back over channels;
//! only the loop itself mutates the simulation, so inputs are applied
//! between ticks and never during one. Race results travel the other way,
//! to a reporter task that sends them to the controller.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use shoal_types::{
    DecorationPlacement, OverlayConfig, RaceWinnerReport, RosterEntry, SceneFrame, SkinId,
    TriggerMessage, ViewerKey,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::choreography::RaceResult;
use crate::context::ConfigChannel;
use crate::skins::LookupLedger;
use crate::source::{ConfigSource, RosterSource, SkinDirectory, SourceError, WinnerSink};
use crate::tick::{Simulation, TickError, TickSummary};

/// Buffered results per poller before it waits on the loop.
const POLL_BUFFER: usize = 4;
/// Buffered race results awaiting delivery.
const WINNER_BUFFER: usize = 16;

/// Errors that can stop the overlay loop.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Result of an overlay run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Total number of ticks executed.
    pub ticks: u64,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
}

/// Receiver of render output.
///
/// Implementations forward frames to the render adapter. Frames arrive
/// after every tick; placements arrive at start and whenever an applied
/// config changes the layout.
pub trait FrameSink: Send {
    /// Called after a tick completes.
    fn on_frame(&mut self, summary: &TickSummary, frame: &SceneFrame);

    /// Called when the decoration layout changes.
    fn on_layout(&mut self, placements: &[DecorationPlacement]);
}

/// A sink that discards everything.
pub struct NoOpSink;

impl FrameSink for NoOpSink {
    fn on_frame(&mut self, _summary: &TickSummary, _frame: &SceneFrame) {}

    fn on_layout(&mut self, _placements: &[DecorationPlacement]) {}
}

/// The external collaborators the loop polls and reports to.
#[derive(Debug, Clone)]
pub struct Collaborators<S, K, C, W> {
    /// Roster provider (automation controller).
    pub roster: S,
    /// Batched skin lookup.
    pub skins: K,
    /// Versioned broadcaster config endpoint.
    pub config: C,
    /// Race winner inbox (automation controller).
    pub winners: W,
}

/// Messages pushed at the engine without being asked for.
#[derive(Debug)]
pub struct Inbound {
    /// Event triggers from the controller.
    pub triggers: mpsc::Receiver<TriggerMessage>,
    /// Config payloads published on every broadcaster save.
    pub config_pushes: mpsc::Receiver<OverlayConfig>,
}

/// One roster poll, as handed back to the loop.
#[derive(Debug)]
enum RosterUpdate {
    Snapshot {
        entries: Vec<RosterEntry>,
        skins: BTreeMap<ViewerKey, SkinId>,
    },
    Failed(SourceError),
}

/// Aborts the poller tasks however the loop exits.
struct TaskGuard(Vec<JoinHandle<()>>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

/// Run the overlay until `shutdown` resolves.
///
/// Collaborator failures never stop the loop: a connectivity failure on the
/// roster flips the overlay to its disconnected state, and anything else
/// keeps the last good state until the next poll.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails unrecoverably.
pub async fn run_overlay<R, S, K, C, W>(
    sim: &mut Simulation<R>,
    collaborators: Collaborators<S, K, C, W>,
    inbound: Inbound,
    sink: &mut dyn FrameSink,
    shutdown: impl Future<Output = ()>,
) -> Result<RunSummary, RunnerError>
where
    R: Rng,
    S: RosterSource,
    K: SkinDirectory,
    C: ConfigSource,
    W: WinnerSink,
{
    let Collaborators {
        roster,
        skins,
        config,
        winners,
    } = collaborators;
    let Inbound {
        mut triggers,
        mut config_pushes,
    } = inbound;
    let timing = sim.settings().timing.clone();
    let streamer = sim.context().streamer().clone();

    let (roster_tx, mut roster_rx) = mpsc::channel(POLL_BUFFER);
    let (config_tx, mut config_rx) = mpsc::channel(POLL_BUFFER);
    let (winner_tx, winner_rx) = mpsc::channel(WINNER_BUFFER);
    let _tasks = TaskGuard(vec![
        tokio::spawn(poll_roster(
            roster,
            skins,
            streamer.clone(),
            timing.roster_poll_ms,
            timing.roster_timeout_ms,
            roster_tx,
        )),
        tokio::spawn(poll_config(
            config,
            streamer.clone(),
            timing.config_poll_ms,
            timing.roster_timeout_ms,
            config_tx,
        )),
        tokio::spawn(report_winners(winners, streamer.clone(), winner_rx)),
    ]);

    info!(
        streamer = %streamer,
        tick_interval_ms = timing.tick_interval_ms,
        roster_poll_ms = timing.roster_poll_ms,
        config_poll_ms = timing.config_poll_ms,
        "overlay starting"
    );
    sink.on_layout(sim.layout());

    let mut ticker = tokio::time::interval(Duration::from_millis(timing.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut result = RunSummary::default();
    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => {
                info!(ticks = result.ticks, "overlay shutdown requested");
                break;
            }

            Some(pushed) = config_pushes.recv() => {
                offer_config(sim, pushed, ConfigChannel::Push, sink);
            }

            Some(polled) = config_rx.recv() => match polled {
                Ok(polled) => offer_config(sim, polled, ConfigChannel::Poll, sink),
                Err(error) => warn!(%error, "config poll failed, keeping last config"),
            },

            Some(update) = roster_rx.recv() => match update {
                RosterUpdate::Snapshot { entries, skins } => {
                    sim.record_skins(skins);
                    sim.apply_roster(&entries);
                }
                RosterUpdate::Failed(error) if error.is_connectivity() => {
                    warn!(%error, "roster unavailable");
                    sim.mark_disconnected();
                }
                RosterUpdate::Failed(error) => {
                    warn!(%error, "roster payload rejected, keeping last state");
                }
            },

            Some(trigger) = triggers.recv() => {
                let outcome = sim.handle_trigger(&trigger);
                debug!(kind = ?trigger.event_kind, ?outcome, "trigger handled");
            }

            _ = ticker.tick() => {
                let summary = sim.run_tick()?;
                for race in summary.race_results.iter().cloned() {
                    if let Err(error) = winner_tx.try_send(race) {
                        warn!(%error, "race result dropped");
                    }
                }
                sink.on_frame(&summary, &sim.frame());
                result.ticks = result.ticks.saturating_add(1);
                result.final_summary = Some(summary);
            }
        }
    }

    info!(
        ticks = result.ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        entities = result.final_summary.as_ref().map(|s| s.entities),
        "overlay stopped"
    );
    Ok(result)
}

/// Offer a config payload and notify the sink if the layout moved.
fn offer_config<R: Rng>(
    sim: &mut Simulation<R>,
    config: OverlayConfig,
    channel: ConfigChannel,
    sink: &mut dyn FrameSink,
) {
    let before = sim.layout().to_vec();
    if sim.apply_config(config, channel).is_applied() && sim.layout() != before.as_slice() {
        debug!(placements = sim.layout().len(), "layout changed");
        sink.on_layout(sim.layout());
    }
}

/// Await a collaborator call, mapping an elapsed deadline to a timeout.
async fn within<T>(
    timeout_ms: u64,
    call: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, SourceError> {
    tokio::time::timeout(Duration::from_millis(timeout_ms), call)
        .await
        .unwrap_or_else(|_elapsed| Err(SourceError::Timeout { timeout_ms }))
}

fn every(period_ms: u64) -> tokio::time::Interval {
    let mut interval = tokio::time::interval(Duration::from_millis(period_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn poll_roster<S: RosterSource, K: SkinDirectory>(
    roster: S,
    skins: K,
    streamer: ViewerKey,
    poll_ms: u64,
    timeout_ms: u64,
    tx: mpsc::Sender<RosterUpdate>,
) {
    let mut ledger = LookupLedger::new();
    let mut interval = every(poll_ms);
    loop {
        interval.tick().await;
        let update = match within(timeout_ms, roster.fetch_roster(&streamer)).await {
            Ok(entries) => {
                let pending = ledger.pending(&entries);
                let found = if pending.is_empty() {
                    BTreeMap::new()
                } else {
                    match within(timeout_ms, skins.lookup(&pending)).await {
                        Ok(found) => {
                            debug!(batch = pending.len(), found = found.len(), "skin lookup");
                            ledger.mark_resolved(&pending);
                            found
                        }
                        Err(error) => {
                            warn!(%error, batch = pending.len(), "skin lookup failed, retrying next cycle");
                            BTreeMap::new()
                        }
                    }
                };
                RosterUpdate::Snapshot {
                    entries,
                    skins: found,
                }
            }
            Err(error) => RosterUpdate::Failed(error),
        };
        if tx.send(update).await.is_err() {
            break;
        }
    }
}

async fn poll_config<C: ConfigSource>(
    source: C,
    streamer: ViewerKey,
    poll_ms: u64,
    timeout_ms: u64,
    tx: mpsc::Sender<Result<OverlayConfig, SourceError>>,
) {
    let mut interval = every(poll_ms);
    loop {
        interval.tick().await;
        let polled = within(timeout_ms, source.fetch_config(&streamer)).await;
        if tx.send(polled).await.is_err() {
            break;
        }
    }
}

async fn report_winners<W: WinnerSink>(
    sink: W,
    streamer: ViewerKey,
    mut rx: mpsc::Receiver<RaceResult>,
) {
    while let Some(race) = rx.recv().await {
        let report = RaceWinnerReport {
            streamer: streamer.clone(),
            event_id: race.event_id,
            winner: race.winner,
            runner_up: race.runner_up,
            finished_at: Utc::now(),
        };
        match sink.report_winner(&report).await {
            Ok(()) => info!(event_id = %report.event_id, winner = %report.winner, "race winner reported"),
            Err(error) => warn!(%error, event_id = %report.event_id, "race winner report failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;
    use shoal_types::{ConnectionState, DecorationId, TriggerKind};

    use super::*;
    use crate::config::AppConfig;
    use crate::source::{
        RecordingWinnerSink, StubConfigSource, StubRosterSource, StubSkinDirectory,
    };

    #[derive(Default)]
    struct RecordingSink {
        frames: Vec<SceneFrame>,
        layouts: Vec<Vec<DecorationPlacement>>,
    }

    impl FrameSink for RecordingSink {
        fn on_frame(&mut self, _summary: &TickSummary, frame: &SceneFrame) {
            self.frames.push(frame.clone());
        }

        fn on_layout(&mut self, placements: &[DecorationPlacement]) {
            self.layouts.push(placements.to_vec());
        }
    }

    struct Harness {
        collaborators: Collaborators<
            StubRosterSource,
            StubSkinDirectory,
            StubConfigSource,
            RecordingWinnerSink,
        >,
        triggers: mpsc::Sender<TriggerMessage>,
        pushes: mpsc::Sender<OverlayConfig>,
        inbound: Inbound,
    }

    fn harness(names: &[&str], config: OverlayConfig) -> Harness {
        let mut skins = BTreeMap::new();
        skins.insert(ViewerKey::new("a"), SkinId::new("shark"));
        let (triggers, trigger_rx) = mpsc::channel(8);
        let (pushes, push_rx) = mpsc::channel(8);
        Harness {
            collaborators: Collaborators {
                roster: StubRosterSource::new(names.iter().map(RosterEntry::viewer).collect()),
                skins: StubSkinDirectory::new(skins),
                config: StubConfigSource::new(config),
                winners: RecordingWinnerSink::new(),
            },
            triggers,
            pushes,
            inbound: Inbound {
                triggers: trigger_rx,
                config_pushes: push_rx,
            },
        }
    }

    fn sim() -> Simulation<SmallRng> {
        Simulation::new(AppConfig::default(), SmallRng::seed_from_u64(3)).unwrap()
    }

    fn config(version: u64, decorations: &[&str]) -> OverlayConfig {
        OverlayConfig {
            version,
            scene_seed: 11,
            active_decoration_ids: decorations.iter().map(DecorationId::new).collect(),
            ..OverlayConfig::default()
        }
    }

    fn after(ms: u64) -> tokio::time::Sleep {
        tokio::time::sleep(Duration::from_millis(ms))
    }

    #[tokio::test(start_paused = true)]
    async fn roster_populates_frames_with_one_skin_batch() {
        let h = harness(&["a", "b"], config(2, &[]));
        let directory = h.collaborators.skins.clone();
        let mut sim = sim();
        let mut sink = RecordingSink::default();

        let result = run_overlay(&mut sim, h.collaborators, h.inbound, &mut sink, after(12_000))
            .await
            .unwrap();

        assert!(result.ticks > 200);
        let last = sink.frames.last().unwrap();
        assert_eq!(last.connection, ConnectionState::Connected);
        assert_eq!(last.config_version, Some(2));
        assert_eq!(last.entities.len(), 2);
        let a = last.entities.iter().find(|e| e.identity.as_str() == "a").unwrap();
        assert_eq!(a.skin.as_str(), "shark");
        // Three roster cycles, but both identities were resolved in the first.
        assert_eq!(directory.batches().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_controller_fades_everyone_out() {
        let h = harness(&["a", "b"], config(1, &[]));
        let roster = h.collaborators.roster.clone();
        tokio::spawn(async move {
            after(6_000).await;
            roster
                .set_failure(SourceError::Unavailable {
                    reason: "controller closed".to_owned(),
                })
                .await;
        });
        let mut sim = sim();
        let mut sink = RecordingSink::default();

        run_overlay(&mut sim, h.collaborators, h.inbound, &mut sink, after(14_000))
            .await
            .unwrap();

        assert!(sink.frames.iter().any(|f| f.entities.len() == 2));
        let last = sink.frames.last().unwrap();
        assert_eq!(last.connection, ConnectionState::Disconnected);
        assert!(last.entities.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_roster_keeps_last_state() {
        let h = harness(&["a", "b"], config(1, &[]));
        let roster = h.collaborators.roster.clone();
        tokio::spawn(async move {
            after(6_000).await;
            roster
                .set_failure(SourceError::Malformed {
                    reason: "not json".to_owned(),
                })
                .await;
        });
        let mut sim = sim();
        let mut sink = RecordingSink::default();

        run_overlay(&mut sim, h.collaborators, h.inbound, &mut sink, after(14_000))
            .await
            .unwrap();

        let last = sink.frames.last().unwrap();
        assert_eq!(last.connection, ConnectionState::Connected);
        assert_eq!(last.entities.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn late_stale_push_never_overrides_newer_poll() {
        let h = harness(&["a"], config(5, &["kelp"]));
        let pushes = h.pushes.clone();
        tokio::spawn(async move {
            after(1_000).await;
            pushes.send(config(4, &["rock"])).await.unwrap();
            after(1_000).await;
            pushes.send(config(6, &["kelp", "rock"])).await.unwrap();
        });
        let mut sim = sim();
        let mut sink = RecordingSink::default();

        run_overlay(&mut sim, h.collaborators, h.inbound, &mut sink, after(3_000))
            .await
            .unwrap();

        assert_eq!(sink.frames.last().unwrap().config_version, Some(6));
        // Empty default layout, then version 5, then version 6.
        assert_eq!(sink.layouts.len(), 3);
        assert!(sink.layouts.first().unwrap().is_empty());
        assert_eq!(sink.layouts.last().unwrap().len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn config_saved_mid_session_arrives_by_poll() {
        let h = harness(&["a", "b"], config(3, &["kelp"]));
        let source = h.collaborators.config.clone();
        tokio::spawn(async move {
            after(5_000).await;
            let mut saved = config(7, &["kelp", "rock"]);
            saved.excluded_identities.insert(ViewerKey::new("a"));
            saved.feature_toggles.predation = false;
            source.set_config(saved).await;
        });
        let mut sim = sim();
        let mut sink = RecordingSink::default();

        run_overlay(&mut sim, h.collaborators, h.inbound, &mut sink, after(40_000))
            .await
            .unwrap();

        // The second poll lands at 30 s; no push was sent.
        let before_poll = sink.frames.iter().rev().find(|f| f.now_ms < 29_000).unwrap();
        assert_eq!(before_poll.config_version, Some(3));
        let last = sink.frames.last().unwrap();
        assert_eq!(last.config_version, Some(7));
        assert_eq!(sink.layouts.len(), 3);
        assert_eq!(sink.layouts.last().unwrap().len(), 6);
        let identities: Vec<&str> = last.entities.iter().map(|e| e.identity.as_str()).collect();
        assert_eq!(identities, vec!["b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn triggered_race_reports_one_winner() {
        let h = harness(&["a", "b"], config(1, &[]));
        let winners = h.collaborators.winners.clone();
        let triggers = h.triggers.clone();
        tokio::spawn(async move {
            after(3_000).await;
            triggers
                .send(TriggerMessage {
                    streamer: ViewerKey::new("streamer"),
                    event_kind: TriggerKind::Race,
                    participants: vec![ViewerKey::new("a"), ViewerKey::new("b")],
                    text: None,
                })
                .await
                .unwrap();
        });
        let mut sim = sim();
        let mut sink = RecordingSink::default();

        run_overlay(&mut sim, h.collaborators, h.inbound, &mut sink, after(60_000))
            .await
            .unwrap();

        let reports = winners.reports().await;
        assert_eq!(reports.len(), 1);
        let report = reports.first().unwrap();
        assert_eq!(report.streamer.as_str(), "streamer");
        assert!(["a", "b"].contains(&report.winner.as_str()));
        assert!(sink.frames.last().unwrap().events.is_empty());
    }
}
