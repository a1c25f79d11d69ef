//! Provider-side instance orchestration.
//!
//! Three calls against one instance: read status, unshelve, shelve.
//! Shelve runs the host cleanup commands first and refuses to touch the
//! provider if either fails; a shelved image with a live proxy or stale
//! build data is worse than an instance left running for an operator to
//! look at.

use std::sync::Arc;

use tracing::info;

use doze_exec::RemoteExec;
use doze_ovh::{OvhClient, OvhError};

use crate::error::ControlResult;
use crate::status::InstanceStatus;

/// Host commands run before the provider shelve call, in order.
#[derive(Debug, Clone)]
pub struct CleanupCommands {
    /// Stops the connection proxy so players disconnect cleanly.
    pub stop_proxy: String,
    /// Clears regenerable build data so the shelved image stays small.
    pub clear_build_data: String,
}

impl Default for CleanupCommands {
    fn default() -> Self {
        Self {
            stop_proxy: "sudo systemctl stop mcproxy".to_string(),
            clear_build_data: "rm -rf /srv/MinecraftServer/dev/special/Construction/*"
                .to_string(),
        }
    }
}

/// Orchestrates one cloud instance.
pub struct InstanceService {
    api: OvhClient,
    service_id: String,
    instance_id: String,
    cleanup: Arc<dyn RemoteExec>,
    commands: CleanupCommands,
}

impl InstanceService {
    pub fn new(
        api: OvhClient,
        service_id: impl Into<String>,
        instance_id: impl Into<String>,
        cleanup: Arc<dyn RemoteExec>,
        commands: CleanupCommands,
    ) -> Self {
        Self {
            api,
            service_id: service_id.into(),
            instance_id: instance_id.into(),
            cleanup,
            commands,
        }
    }

    fn instance_path(&self) -> String {
        format!(
            "/cloud/project/{}/instance/{}",
            self.service_id, self.instance_id
        )
    }

    /// Read the instance's current lifecycle status.
    pub async fn status(&self) -> ControlResult<InstanceStatus> {
        let body = self.api.get(&self.instance_path()).await?;
        let value: serde_json::Value = serde_json::from_str(&body).map_err(|e| OvhError::Api {
            status: 200,
            body: format!("instance reply is not valid json: {e}"),
        })?;

        let raw = value
            .get("status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("");
        let status = InstanceStatus::parse(raw);
        info!(raw = %status.raw, state = ?status.state, "instance status");
        Ok(status)
    }

    /// Wake a shelved instance.
    pub async fn unshelve(&self) -> ControlResult<()> {
        self.api
            .post(&format!("{}/unshelve", self.instance_path()), "")
            .await?;
        info!(instance_id = %self.instance_id, "unshelve requested");
        Ok(())
    }

    /// Shelve the instance after cleaning up the host.
    ///
    /// Cleanup order is load-bearing: the proxy stops before build data
    /// is cleared, and the provider call happens only once both commands
    /// have succeeded.
    pub async fn shelve(&self) -> ControlResult<()> {
        info!(command = %self.commands.stop_proxy, "host cleanup");
        self.cleanup.run(&self.commands.stop_proxy).await?;
        info!(command = %self.commands.clear_build_data, "host cleanup");
        self.cleanup.run(&self.commands.clear_build_data).await?;

        self.api
            .post(&format!("{}/shelve", self.instance_path()), "")
            .await?;
        info!(instance_id = %self.instance_id, "shelve requested");
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
