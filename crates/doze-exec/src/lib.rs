//! doze-exec — remote command execution over SSH.
//!
//! Shelving the game host needs a couple of commands run on the machine
//! first (stop the proxy, clear scratch data). This crate provides the
//! [`RemoteExec`] seam the orchestration layer calls through, and the
//! production [`SshRunner`] that drives libssh2 from a blocking task.
//!
//! A command either succeeds (exit status 0) or fails with an
//! [`ExecError`] carrying its captured stderr; there is no partial
//! success to reason about.

pub mod ssh;

use thiserror::Error;

pub use ssh::{SshConfig, SshRunner};

/// Boxed future returned by [`RemoteExec::run`].
pub type ExecFuture =
    std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), ExecError>> + Send>>;

/// Something that can run a shell command on the game host.
///
/// Object-safe so callers hold `Arc<dyn RemoteExec>` and tests can
/// substitute a recorder.
pub trait RemoteExec: Send + Sync {
    /// Run one command, succeeding only on exit status 0.
    fn run(&self, command: &str) -> ExecFuture;
}

/// Errors from remote command execution.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("connect to {host}:{port} failed: {source}")]
    Connect {
        host: String,
        port: u16,
        source: std::io::Error,
    },

    #[error("authentication as {username} failed: {source}")]
    Auth {
        username: String,
        source: ssh2::Error,
    },

    #[error("session error: {0}")]
    Session(#[from] ssh2::Error),

    #[error("i/o on channel failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("command `{command}` exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("executor task failed: {0}")]
    Internal(String),
}
