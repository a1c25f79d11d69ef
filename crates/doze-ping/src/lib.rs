//! doze-ping — player-count probe over the Minecraft Server List Ping.
//!
//! Speaks just enough of the modern (post-Netty) protocol to ask a server
//! for its status JSON in one TCP round trip:
//!
//! ```text
//! → handshake    (packet 0x00: protocol version, host, port, next state 1)
//! → status query (packet 0x00, empty payload)
//! ← status reply (packet 0x00: length-prefixed JSON with players.online)
//! ```
//!
//! The public entry point is [`probe`] (or the reusable [`ServerPinger`]):
//! it never fails. A dead host, a refused connection, a malformed frame, or
//! a timeout all come back as [`PingResult::offline`], because for the
//! caller "unreachable" and "down" demand the same reaction. The fallible
//! [`fetch_status`] is exported for callers that need the distinction.

pub mod probe;
pub mod wire;

pub use probe::{PingResult, ProbeError, ServerPinger, fetch_status, probe};
