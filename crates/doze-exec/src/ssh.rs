//! SSH runner backed by libssh2.
//!
//! libssh2 is blocking, so every command runs inside
//! `tokio::task::spawn_blocking`: connect with a bounded timeout,
//! publickey auth, one exec channel, drain both output streams, check the
//! exit status. Each command gets a fresh session; the cleanup sequences
//! this serves are two commands long, so connection reuse buys nothing
//! worth the state.

use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::time::Duration;

use ssh2::Session;
use tracing::debug;

use crate::{ExecError, ExecFuture, RemoteExec};

/// Bound on establishing the TCP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bound on each blocking libssh2 operation, in milliseconds.
const COMMAND_TIMEOUT_MS: u32 = 30_000;

/// Captured remote output is capped at this many bytes in errors.
const MAX_CAPTURED_OUTPUT: usize = 4096;

/// Connection settings for the game host.
#[derive(Debug, Clone)]
pub struct SshConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    /// Path to the private key used for publickey auth.
    pub private_key: PathBuf,
}

/// Production [`RemoteExec`] implementation.
#[derive(Debug, Clone)]
pub struct SshRunner {
    config: SshConfig,
}

impl SshRunner {
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }
}

impl RemoteExec for SshRunner {
    fn run(&self, command: &str) -> ExecFuture {
        let config = self.config.clone();
        let command = command.to_string();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || {
                let session = connect(&config)?;
                exec_one(&session, &command)
            })
            .await
            .map_err(|e| ExecError::Internal(e.to_string()))?
        })
    }
}

/// Open and authenticate a session.
fn connect(config: &SshConfig) -> Result<Session, ExecError> {
    let connect_err = |source| ExecError::Connect {
        host: config.host.clone(),
        port: config.port,
        source,
    };

    let addr = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(connect_err)?
        .next()
        .ok_or_else(|| {
            connect_err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "hostname resolved to no addresses",
            ))
        })?;

    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT).map_err(connect_err)?;

    let mut session = Session::new()?;
    // Bound every libssh2 operation, the handshake included.
    session.set_timeout(COMMAND_TIMEOUT_MS);
    session.set_tcp_stream(tcp);
    session.handshake()?;

    session
        .userauth_pubkey_file(&config.username, None, &config.private_key, None)
        .map_err(|source| ExecError::Auth {
            username: config.username.clone(),
            source,
        })?;

    debug!(host = %config.host, port = config.port, username = %config.username, "ssh session ready");
    Ok(session)
}

/// Run one command on an authenticated session.
fn exec_one(session: &Session, command: &str) -> Result<(), ExecError> {
    debug!(%command, "remote command");

    let mut channel = session.channel_session()?;
    channel.exec(command)?;

    // Drain both streams so the remote side can close cleanly.
    let mut stdout = Vec::new();
    channel.read_to_end(&mut stdout)?;
    let mut stderr = Vec::new();
    channel.stderr().read_to_end(&mut stderr)?;
    channel.wait_close()?;

    let status = channel.exit_status()?;
    if status != 0 {
        return Err(ExecError::CommandFailed {
            command: command.to_string(),
            status,
            stderr: cap_output(&String::from_utf8_lossy(&stderr)),
        });
    }

    debug!(%command, "remote command ok");
    Ok(())
}

/// Trim and cap captured remote output for inclusion in errors.
fn cap_output(output: &str) -> String {
    let trimmed = output.trim_end();
    if trimmed.len() <= MAX_CAPTURED_OUTPUT {
        return trimmed.to_string();
    }
    let mut end = MAX_CAPTURED_OUTPUT;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &trimmed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;

    fn test_runner(host: &str, port: u16) -> SshRunner {
        SshRunner::new(SshConfig {
            host: host.to_string(),
            port,
            username: "minecraft".to_string(),
            private_key: PathBuf::from("/tmp/id_ed25519"),
        })
    }

    #[tokio::test]
    async fn refused_connection_is_a_connect_error() {
        // Nothing listens on port 1.
        let runner = test_runner("127.0.0.1", 1);
        let err = runner.run("true").await.unwrap_err();
        assert!(matches!(err, ExecError::Connect { port: 1, .. }));
    }

    #[tokio::test]
    async fn non_ssh_server_fails_the_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
        let addr = listener.local_addr().expect("local addr");
        std::thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let _ = stream.write_all(b"I am not an SSH daemon\r\n");
            }
        });

        let runner = test_runner(&addr.ip().to_string(), addr.port());
        let err = runner.run("true").await.unwrap_err();
        assert!(matches!(err, ExecError::Session(_)));
    }

    #[test]
    fn cap_output_passes_short_text() {
        assert_eq!(cap_output("rm: cannot remove\n"), "rm: cannot remove");
    }

    #[test]
    fn cap_output_truncates_long_text() {
        let long = "e".repeat(MAX_CAPTURED_OUTPUT + 500);
        let capped = cap_output(&long);
        assert!(capped.ends_with("...(truncated)"));
        assert!(capped.len() <= MAX_CAPTURED_OUTPUT + "...(truncated)".len());
    }

    #[test]
    fn command_failure_message_names_the_command() {
        let err = ExecError::CommandFailed {
            command: "sudo systemctl stop mcproxy".to_string(),
            status: 5,
            stderr: "unit not loaded".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("sudo systemctl stop mcproxy"));
        assert!(message.contains("status 5"));
        assert!(message.contains("unit not loaded"));
    }
}
