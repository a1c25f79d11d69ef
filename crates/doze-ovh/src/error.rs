//! Error taxonomy for provider API calls.

use thiserror::Error;

/// Result alias for provider calls.
pub type OvhResult<T> = Result<T, OvhError>;

/// Errors from a signed provider call, keyed to the response status.
///
/// Each variant carries the raw response body (or transport detail) so
/// the provider's own diagnostics survive to the logs.
#[derive(Debug, Error)]
pub enum OvhError {
    /// 400 — the request was malformed.
    #[error("bad parameters: {0}")]
    BadParameters(String),

    /// 403 — bad credentials, bad signature, or an expired consumer key.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// 404 — no such route or object.
    #[error("not found: {0}")]
    NotFound(String),

    /// 409 — the object rejects the operation in its current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other non-200 status.
    #[error("api error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// The call never produced an HTTP status (DNS, connect, timeout, read).
    #[error("transport failed: {0}")]
    Internal(String),
}
