//! Control-plane error type.

use thiserror::Error;

use doze_exec::ExecError;
use doze_ovh::OvhError;

/// Result alias for control-plane operations.
pub type ControlResult<T> = Result<T, ControlError>;

/// Failures surfaced by orchestration and the exposed operations.
///
/// Provider API errors pass through unchanged; host cleanup failures keep
/// their own variant so callers can tell a refused provider call from a
/// half-finished shelve.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Api(#[from] OvhError),

    #[error("host cleanup failed: {0}")]
    Cleanup(#[from] ExecError),
}
