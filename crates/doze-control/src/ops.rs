//! Exposed control operations.
//!
//! Thin decision layer between the HTTP surface and the services: read
//! the status, refuse what the current state forbids, otherwise trigger
//! the provider call and the watch transition. Every reply carries a
//! stable machine code plus a human line; state conflicts are replies,
//! not errors.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use doze_ping::ServerPinger;

use crate::error::ControlResult;
use crate::instance::InstanceService;
use crate::status::InstanceStatus;
use crate::watch::{InstanceWatch, TargetFuture, WatchDelays, WatchTarget};

/// Machine codes carried by [`OpReply`].
pub mod codes {
    pub const INSTANCE_STARTING: &str = "INSTANCE_STARTING";
    pub const INSTANCE_STOPPING: &str = "INSTANCE_STOPPING";
    pub const INSTANCE_STATUS: &str = "INSTANCE_STATUS";
    pub const INSTANCE_ALREADY_ACTIVE: &str = "INSTANCE_ALREADY_ACTIVE";
    pub const INSTANCE_ALREADY_STARTING_OR_STOPPING: &str =
        "INSTANCE_ALREADY_STARTING_OR_STOPPING";
    pub const INSTANCE_NOT_ACTIVE: &str = "INSTANCE_NOT_ACTIVE";
    pub const INSTANCE_STATE_UNKNOWN: &str = "INSTANCE_STATE_UNKNOWN";
    pub const SERVER_ONLINE: &str = "SERVER_ONLINE";
    pub const SERVER_OFFLINE: &str = "SERVER_OFFLINE";
    pub const ONLINE_PLAYERS: &str = "ONLINE_PLAYERS";
    pub const PONG: &str = "PONG";
}

/// Outcome of one exposed operation.
#[derive(Debug, Clone, Serialize)]
pub struct OpReply {
    /// Whether the request was accepted.
    pub success: bool,
    /// Stable machine code for automation.
    pub code: &'static str,
    /// Human-readable detail.
    pub message: String,
}

impl OpReply {
    fn accepted(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code,
            message: message.into(),
        }
    }

    fn refused(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code,
            message: message.into(),
        }
    }
}

/// Production watch target: status and shelve go through the instance
/// service, probes through the pinger.
struct ServiceTarget {
    instances: Arc<InstanceService>,
    pinger: ServerPinger,
}

impl WatchTarget for ServiceTarget {
    fn instance_state(&self) -> TargetFuture<ControlResult<InstanceStatus>> {
        let instances = self.instances.clone();
        Box::pin(async move { instances.status().await })
    }

    fn probe(&self) -> TargetFuture<doze_ping::PingResult> {
        let pinger = self.pinger.clone();
        Box::pin(async move { pinger.status().await })
    }

    fn shelve(&self) -> TargetFuture<ControlResult<()>> {
        let instances = self.instances.clone();
        Box::pin(async move { instances.shelve().await })
    }
}

/// The operations the HTTP layer exposes.
pub struct ControlPlane {
    instances: Arc<InstanceService>,
    pinger: ServerPinger,
    watch: InstanceWatch,
}

impl ControlPlane {
    /// Wire the services together. The watch observes the same instance
    /// and server the operations act on.
    pub fn new(instances: Arc<InstanceService>, pinger: ServerPinger, delays: WatchDelays) -> Self {
        let target = Arc::new(ServiceTarget {
            instances: instances.clone(),
            pinger: pinger.clone(),
        });
        let watch = InstanceWatch::new(target, delays);
        Self {
            instances,
            pinger,
            watch,
        }
    }

    /// Wake the instance and arm the idle watch.
    pub async fn start(&self) -> ControlResult<OpReply> {
        let status = self.instances.status().await?;

        if status.is_transitioning() {
            return Ok(OpReply::refused(
                codes::INSTANCE_ALREADY_STARTING_OR_STOPPING,
                format!("instance is {}, try again later", status.raw),
            ));
        }
        if status.is_running() {
            return Ok(OpReply::refused(
                codes::INSTANCE_ALREADY_ACTIVE,
                "instance is already active",
            ));
        }
        if !status.is_inactive() {
            // Unknown state: waking blind risks fighting a transition the
            // provider has not named.
            return Ok(OpReply::refused(
                codes::INSTANCE_STATE_UNKNOWN,
                format!("instance state {} is not actionable", status.raw),
            ));
        }

        self.instances.unshelve().await?;
        self.watch.start().await;
        info!("instance start accepted");
        Ok(OpReply::accepted(
            codes::INSTANCE_STARTING,
            "instance is waking up",
        ))
    }

    /// Shelve the instance and disarm the watch.
    pub async fn stop(&self) -> ControlResult<OpReply> {
        let status = self.instances.status().await?;

        if status.is_transitioning() {
            return Ok(OpReply::refused(
                codes::INSTANCE_ALREADY_STARTING_OR_STOPPING,
                format!("instance is {}, try again later", status.raw),
            ));
        }
        if !status.is_running() {
            return Ok(OpReply::refused(
                codes::INSTANCE_NOT_ACTIVE,
                "instance is not active",
            ));
        }

        self.instances.shelve().await?;
        self.watch.cancel().await;
        info!("instance stop accepted");
        Ok(OpReply::accepted(
            codes::INSTANCE_STOPPING,
            "instance is shelving",
        ))
    }

    /// Raw provider status of the instance.
    pub async fn status(&self) -> ControlResult<OpReply> {
        let status = self.instances.status().await?;
        Ok(OpReply::accepted(codes::INSTANCE_STATUS, status.raw))
    }

    /// Whether the game server answers its status handshake. Always a
    /// successful reply; offline is an answer, not a failure, so the
    /// message carries the boolean.
    pub async fn server_status(&self) -> OpReply {
        let ping = self.pinger.status().await;
        OpReply::accepted(codes::SERVER_ONLINE, ping.online.to_string())
    }

    /// Online player count; refused while the server is unreachable.
    pub async fn players(&self) -> OpReply {
        let ping = self.pinger.status().await;
        if !ping.online {
            return OpReply::refused(codes::SERVER_OFFLINE, "server is offline");
        }
        OpReply::accepted(codes::ONLINE_PLAYERS, ping.players_online.to_string())
    }

    /// Liveness reply.
    pub fn ping(&self) -> OpReply {
        OpReply::accepted(codes::PONG, "pong")
    }

    /// Whether the idle watch is armed.
    pub async fn watch_armed(&self) -> bool {
        self.watch.is_armed().await
    }
}

// ── Tests ────────────────────────────────────────────────────────────
