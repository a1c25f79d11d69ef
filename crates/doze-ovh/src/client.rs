//! Signed HTTP client.
//!
//! One [`OvhClient`] per account. Each authenticated request is signed
//! individually:
//!
//! ```text
//! X-Ovh-Signature = "$1$" + sha1_hex(secret + "+" + consumer + "+" + METHOD
//!                                    + "+" + full_url + "+" + body + "+" + ts)
//! ```
//!
//! The URL is signed byte-for-byte as sent, so path strings must already
//! be in their final form when they reach [`OvhClient::request`].

use std::time::Duration;

use sha1::{Digest, Sha1};
use tracing::{debug, info};

use crate::error::{OvhError, OvhResult};

/// Timeout applied both to connecting and to the request as a whole.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// How much of a request or response body the debug logs keep.
const MAX_LOGGED_BODY: usize = 4096;

/// Regional API entry points, keyed by the short names the provider's
/// tooling uses. A key not in this table is taken as a literal base URL.
const ENDPOINTS: &[(&str, &str)] = &[
    ("ovh-eu", "https://eu.api.ovh.com/1.0"),
    ("ovh-ca", "https://ca.api.ovh.com/1.0"),
    ("kimsufi-eu", "https://eu.api.kimsufi.com/1.0"),
    ("kimsufi-ca", "https://ca.api.kimsufi.com/1.0"),
    ("soyoustart-eu", "https://eu.api.soyoustart.com/1.0"),
    ("soyoustart-ca", "https://ca.api.soyoustart.com/1.0"),
    ("runabove", "https://api.runabove.com/1.0"),
    ("runabove-ca", "https://api.runabove.com/1.0"),
];

/// Resolve an endpoint alias to its base URL.
///
/// Unknown names pass through verbatim, which is how tests point the
/// client at a local server.
pub fn resolve_endpoint(endpoint: &str) -> &str {
    ENDPOINTS
        .iter()
        .find(|(alias, _)| *alias == endpoint)
        .map(|(_, base)| *base)
        .unwrap_or(endpoint)
}

/// Compute the request signature.
///
/// Pure in its six inputs; changing any one of them changes the digest.
pub fn signature(
    application_secret: &str,
    consumer_key: &str,
    method: &str,
    url: &str,
    body: &str,
    timestamp: u64,
) -> String {
    let mut hasher = Sha1::new();
    hasher.update(application_secret.as_bytes());
    hasher.update(b"+");
    hasher.update(consumer_key.as_bytes());
    hasher.update(b"+");
    hasher.update(method.as_bytes());
    hasher.update(b"+");
    hasher.update(url.as_bytes());
    hasher.update(b"+");
    hasher.update(body.as_bytes());
    hasher.update(b"+");
    hasher.update(timestamp.to_string().as_bytes());
    format!("$1${}", hex::encode(hasher.finalize()))
}

/// Keep only the last four characters of a credential for logging.
pub fn mask(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

/// Credentials and endpoint for one provider account.
#[derive(Debug, Clone)]
pub struct OvhCredentials {
    /// Endpoint alias (`ovh-eu`, `ovh-ca`, ...) or a literal base URL.
    pub endpoint: String,
    pub application_key: String,
    pub application_secret: String,
    pub consumer_key: String,
}

/// Signed API client. Cheap to clone; the inner connection pool is shared.
#[derive(Clone)]
pub struct OvhClient {
    http: reqwest::Client,
    base_url: String,
    application_key: String,
    application_secret: String,
    consumer_key: String,
}

impl OvhClient {
    /// Build a client for the given account.
    pub fn new(credentials: OvhCredentials) -> OvhResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(REQUEST_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| OvhError::Internal(e.to_string()))?;

        let base_url = resolve_endpoint(&credentials.endpoint).to_string();
        info!(
            endpoint = %credentials.endpoint,
            %base_url,
            application_key = %mask(&credentials.application_key),
            consumer_key = %mask(&credentials.consumer_key),
            "provider client ready"
        );

        Ok(Self {
            http,
            base_url,
            application_key: credentials.application_key,
            application_secret: credentials.application_secret,
            consumer_key: credentials.consumer_key,
        })
    }

    /// Signed GET.
    pub async fn get(&self, path: &str) -> OvhResult<String> {
        self.request("GET", path, "", true).await
    }

    /// Signed POST.
    pub async fn post(&self, path: &str, body: &str) -> OvhResult<String> {
        self.request("POST", path, body, true).await
    }

    /// Signed PUT.
    pub async fn put(&self, path: &str, body: &str) -> OvhResult<String> {
        self.request("PUT", path, body, true).await
    }

    /// Signed DELETE.
    pub async fn delete(&self, path: &str) -> OvhResult<String> {
        self.request("DELETE", path, "", true).await
    }

    /// Issue one call and return the raw 200 body.
    ///
    /// With `need_auth` the consumer, timestamp, and signature headers are
    /// attached; without it only the application key travels (the handful
    /// of public routes, like credential creation, work that way). The
    /// body participates in the signature even when empty, but an empty
    /// body is not sent on the wire.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        body: &str,
        need_auth: bool,
    ) -> OvhResult<String> {
        let url = format!("{}{}", self.base_url, path);
        let http_method = reqwest::Method::from_bytes(method.as_bytes())
            .map_err(|_| OvhError::BadParameters(format!("invalid http method: {method}")))?;

        info!(method, %url, need_auth, "provider call");
        debug!(body = %truncate_for_log(body), "request body");

        let mut request = self
            .http
            .request(http_method, &url)
            .header("Content-Type", "application/json; charset=utf-8")
            .header("X-Ovh-Application", &self.application_key);

        if need_auth {
            let timestamp = epoch_secs();
            let signature = signature(
                &self.application_secret,
                &self.consumer_key,
                method,
                &url,
                body,
                timestamp,
            );
            request = request
                .header("X-Ovh-Consumer", &self.consumer_key)
                .header("X-Ovh-Timestamp", timestamp.to_string())
                .header("X-Ovh-Signature", signature);
        }

        if !body.is_empty() {
            request = request.body(body.to_string());
        }

        let started = std::time::Instant::now();
        let response = request
            .send()
            .await
            .map_err(|e| OvhError::Internal(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| OvhError::Internal(e.to_string()))?;

        info!(
            method,
            %url,
            status,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "provider reply"
        );
        debug!(body = %truncate_for_log(&text), "response body");

        match status {
            200 => Ok(text),
            400 => Err(OvhError::BadParameters(text)),
            403 => Err(OvhError::Auth(text)),
            404 => Err(OvhError::NotFound(text)),
            409 => Err(OvhError::Conflict(text)),
            _ => Err(OvhError::Api { status, body: text }),
        }
    }
}

/// Cap a body for debug logging.
fn truncate_for_log(body: &str) -> String {
    if body.len() <= MAX_LOGGED_BODY {
        return body.to_string();
    }
    let mut end = MAX_LOGGED_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &body[..end])
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ── Tests ────────────────────────────────────────────────────────────
