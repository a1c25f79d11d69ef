//! The idle watch: a timer that shelves a forgotten server.
//!
//! One watch exists per process. Arming it replaces any previous timer;
//! the superseded loop is signalled and exits at its next select point,
//! never mid-check. Each pass runs one check and either re-arms with the
//! appropriate delay or ends:
//!
//! ```text
//! Armed ─sleep─▶ Checking ─players online─▶ Armed (recheck delay)
//!                   ├── status read failed ▶ Armed (error backoff)
//!                   ├── instance gone ─────▶ Idle
//!                   └── offline or empty ──▶ shelve, Idle
//! ```
//!
//! The decision procedure lives in [`run_check`], separate from the loop,
//! so it can be driven directly against a scripted [`WatchTarget`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use doze_ping::PingResult;

use crate::error::ControlResult;
use crate::status::InstanceStatus;

/// Boxed future returned by the object-safe [`WatchTarget`] methods.
pub type TargetFuture<T> = std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send>>;

/// What the watch loop needs from the rest of the system.
///
/// Production wires this to the instance service and the status probe;
/// tests substitute scripted values.
pub trait WatchTarget: Send + Sync {
    /// Current provider-side status of the instance.
    fn instance_state(&self) -> TargetFuture<ControlResult<InstanceStatus>>;

    /// One player-count probe against the game server.
    fn probe(&self) -> TargetFuture<PingResult>;

    /// Shelve the instance, host cleanup included.
    fn shelve(&self) -> TargetFuture<ControlResult<()>>;
}

/// Delays between the phases of a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchDelays {
    /// Arm-to-first-check delay after a start request.
    pub initial: Duration,
    /// Re-check delay while players are online.
    pub recheck: Duration,
    /// Re-check delay after a failed status read.
    pub error_backoff: Duration,
}

impl Default for WatchDelays {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(60 * 60),
            recheck: Duration::from_secs(30 * 60),
            error_backoff: Duration::from_secs(5 * 60),
        }
    }
}

impl WatchDelays {
    /// The same short delay for every phase, for tests.
    pub fn uniform(delay: Duration) -> Self {
        Self {
            initial: delay,
            recheck: delay,
            error_backoff: delay,
        }
    }
}

/// What a single check decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Instance is no longer running or starting; nothing left to watch.
    InstanceGone,
    /// Shelve was issued (or attempted); the watch is done.
    ShelveIssued { trigger: ShelveTrigger },
    /// Players are online; check again later.
    PlayersOnline { count: u32 },
    /// The status read failed; check again sooner.
    CheckFailed,
}

/// Why a check decided to shelve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShelveTrigger {
    /// The server did not answer the status handshake.
    ServerOffline,
    /// The server answered with zero players.
    ServerEmpty,
}

/// Run one check against the target.
///
/// Decides only; the caller maps the outcome to a delay or to ending the
/// loop. A failed shelve still counts as `ShelveIssued`: retrying shelve
/// from a timer against a half-cleaned host does more damage than leaving
/// the instance up for an operator.
pub async fn run_check(target: &dyn WatchTarget) -> CheckOutcome {
    let status = match target.instance_state().await {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "watch could not read instance status");
            return CheckOutcome::CheckFailed;
        }
    };

    if !status.is_running() && !status.is_starting() {
        info!(raw = %status.raw, "instance no longer up, watch ends");
        return CheckOutcome::InstanceGone;
    }

    let ping = target.probe().await;
    let trigger = if !ping.online {
        ShelveTrigger::ServerOffline
    } else if ping.players_online == 0 {
        ShelveTrigger::ServerEmpty
    } else {
        debug!(players = ping.players_online, "players online");
        return CheckOutcome::PlayersOnline {
            count: ping.players_online,
        };
    };

    info!(?trigger, "idle server, shelving");
    if let Err(e) = target.shelve().await {
        error!(error = %e, "shelve from watch failed");
    }
    CheckOutcome::ShelveIssued { trigger }
}

/// The armed timer, if any.
struct WatchSlot {
    shutdown_tx: watch::Sender<bool>,
    generation: u64,
}

struct WatchState {
    slot: Option<WatchSlot>,
    generation: u64,
}

/// Owns the process's single idle watch.
pub struct InstanceWatch {
    target: Arc<dyn WatchTarget>,
    delays: WatchDelays,
    state: Arc<Mutex<WatchState>>,
}

impl InstanceWatch {
    pub fn new(target: Arc<dyn WatchTarget>, delays: WatchDelays) -> Self {
        Self {
            target,
            delays,
            state: Arc::new(Mutex::new(WatchState {
                slot: None,
                generation: 0,
            })),
        }
    }

    /// Arm the watch, replacing any previous one.
    ///
    /// The superseded loop is signalled and exits at its next select
    /// point; an in-flight check is never interrupted.
    pub async fn start(&self) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut state = self.state.lock().await;
        state.generation += 1;
        let generation = state.generation;

        let target = self.target.clone();
        let delays = self.delays;
        let watch_state = self.state.clone();
        tokio::spawn(async move {
            run_watch_loop(target, delays, shutdown_rx).await;
            // Clear the slot only if it is still this loop's.
            let mut state = watch_state.lock().await;
            if state
                .slot
                .as_ref()
                .is_some_and(|slot| slot.generation == generation)
            {
                state.slot = None;
            }
        });

        if let Some(old) = state.slot.replace(WatchSlot {
            shutdown_tx,
            generation,
        }) {
            let _ = old.shutdown_tx.send(true);
            debug!(superseded = old.generation, "previous watch signalled");
        }
        info!(delay_secs = self.delays.initial.as_secs(), "watch armed");
    }

    /// Disarm the watch. Idempotent; an in-flight check still completes.
    pub async fn cancel(&self) {
        let mut state = self.state.lock().await;
        if let Some(slot) = state.slot.take() {
            let _ = slot.shutdown_tx.send(true);
            info!("watch cancelled");
        }
    }

    /// Whether a watch is currently armed or checking.
    pub async fn is_armed(&self) -> bool {
        self.state.lock().await.slot.is_some()
    }
}

/// Body of one watch lifetime.
async fn run_watch_loop(
    target: Arc<dyn WatchTarget>,
    delays: WatchDelays,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut delay = delays.initial;
    debug!(delay_secs = delay.as_secs(), "watch loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                match run_check(target.as_ref()).await {
                    CheckOutcome::PlayersOnline { count } => {
                        debug!(players = count, delay_secs = delays.recheck.as_secs(), "watch re-armed");
                        delay = delays.recheck;
                    }
                    CheckOutcome::CheckFailed => {
                        debug!(delay_secs = delays.error_backoff.as_secs(), "watch re-armed after error");
                        delay = delays.error_backoff;
                    }
                    CheckOutcome::InstanceGone | CheckOutcome::ShelveIssued { .. } => break,
                }
            }
            _ = shutdown.changed() => {
                debug!("watch loop shutting down");
                break;
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
