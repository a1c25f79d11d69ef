//! doze-ovh — signed client for the OVH REST API.
//!
//! Covers the slice of the API this system needs: four HTTP verbs, the
//! per-request SHA-1 signature scheme, and a status-code error taxonomy.
//! Responses come back as raw body text; callers own the parsing.
//!
//! Authenticated calls carry four headers:
//!
//! | header | value |
//! |---|---|
//! | `X-Ovh-Application` | application key |
//! | `X-Ovh-Consumer` | consumer key |
//! | `X-Ovh-Timestamp` | unix seconds at send time |
//! | `X-Ovh-Signature` | `$1$` + SHA-1 over credentials, method, URL, body, timestamp |
//!
//! Only a 200 counts as success. 400/403/404/409 map to dedicated
//! [`OvhError`] variants carrying the response body; anything else is an
//! [`OvhError::Api`]; failures without an HTTP status (DNS, connect,
//! timeout) are [`OvhError::Internal`]. Nothing is retried.

pub mod client;
pub mod error;

pub use client::{OvhClient, OvhCredentials, mask, resolve_endpoint, signature};
pub use error::{OvhError, OvhResult};
