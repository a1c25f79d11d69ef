//! Status probe: one handshake round trip, never an error.
//!
//! [`fetch_status`] performs the exchange and reports exactly what went
//! wrong; [`probe`] wraps it in a deadline and folds every failure into
//! [`PingResult::offline`], logging the cause at debug level.

use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::wire::{self, WireError};

/// Upper bound on the status JSON a server may declare. Real payloads are
/// a few KiB; anything near this is garbage or hostile.
const MAX_STATUS_JSON_BYTES: usize = 1024 * 1024;

/// Outcome of a status probe.
///
/// `online == false` always comes with `players_online == 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingResult {
    /// Whether the server completed the status handshake.
    pub online: bool,
    /// Player count from the status JSON, 0 when offline.
    pub players_online: u32,
}

impl PingResult {
    /// Server answered with the given player count.
    pub fn online(players_online: u32) -> Self {
        Self {
            online: true,
            players_online,
        }
    }

    /// Server unreachable or misbehaving.
    pub fn offline() -> Self {
        Self {
            online: false,
            players_online: 0,
        }
    }
}

/// Why a status exchange failed.
///
/// Collapsed to offline at the [`probe`] boundary; kept distinct so logs
/// separate a dead server from a misbehaving one.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect failed: {0}")]
    Connect(std::io::Error),

    #[error("exchange failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("unexpected packet id {0:#04x}")]
    UnexpectedPacket(i32),

    #[error("status payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run the status handshake against `host:port` and parse the reply.
///
/// No deadline of its own; callers wanting a bound use [`probe`].
pub async fn fetch_status(host: &str, port: u16) -> Result<PingResult, ProbeError> {
    let mut stream = TcpStream::connect((host, port))
        .await
        .map_err(ProbeError::Connect)?;

    stream.write_all(&wire::handshake(host, port)).await?;
    stream.write_all(&wire::STATUS_REQUEST).await?;
    stream.flush().await?;

    // Reply frame: total length, packet id, JSON length, JSON bytes.
    let _frame_len = wire::read_varint_from(&mut stream).await?;
    let packet_id = wire::read_varint_from(&mut stream).await?;
    if packet_id != i32::from(wire::PACKET_STATUS) {
        return Err(ProbeError::UnexpectedPacket(packet_id));
    }

    let json_len = wire::read_varint_from(&mut stream).await?;
    if json_len < 0 || json_len as usize > MAX_STATUS_JSON_BYTES {
        return Err(ProbeError::Wire(WireError::LengthOverflow {
            len: json_len,
            cap: MAX_STATUS_JSON_BYTES,
        }));
    }

    let mut payload = vec![0u8; json_len as usize];
    stream.read_exact(&mut payload).await?;

    let status: serde_json::Value = serde_json::from_slice(&payload)?;
    let players = status
        .get("players")
        .and_then(|p| p.get("online"))
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);

    Ok(PingResult::online(
        u32::try_from(players).unwrap_or(u32::MAX),
    ))
}

/// Query the server status, treating every failure as offline.
///
/// The whole exchange (connect, handshake, reply) runs under a single
/// deadline.
pub async fn probe(host: &str, port: u16, timeout: Duration) -> PingResult {
    match tokio::time::timeout(timeout, fetch_status(host, port)).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            debug!(%host, port, error = %e, "status probe failed");
            PingResult::offline()
        }
        Err(_) => {
            debug!(%host, port, timeout_ms = timeout.as_millis() as u64, "status probe timed out");
            PingResult::offline()
        }
    }
}

/// Reusable probe handle for a single server.
#[derive(Debug, Clone)]
pub struct ServerPinger {
    host: String,
    port: u16,
    timeout: Duration,
}

impl ServerPinger {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// One status round trip.
    pub async fn status(&self) -> PingResult {
        probe(&self.host, self.port, self.timeout).await
    }

    /// Whether the server completed the handshake.
    pub async fn is_online(&self) -> bool {
        self.status().await.online
    }

    /// Current player count, 0 when offline.
    pub async fn players_online(&self) -> u32 {
        self.status().await.players_online
    }
}

// ── Tests ────────────────────────────────────────────────────────────
