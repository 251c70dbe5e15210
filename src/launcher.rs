//! Provider plugin process management.
//!
//! Providers run as child processes that print a one-line handshake on
//! stdout and then serve gRPC. This module spawns the binary with the
//! handshake environment, parses the line, connects a channel to the
//! advertised address and hands back a [`ProviderClient`] together with a
//! handle for shutting the process down.
//!
//! The handshake line has pipe-separated fields:
//!
//! ```text
//! CORE-VERSION|PROTOCOL-VERSION|NETWORK|ADDRESS|PROTOCOL
//! 1|6|tcp|127.0.0.1:10042|grpc
//! ```

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, Command};
use tonic::transport::Endpoint;
use tracing::{debug, info};

use crate::client::{Protocol, ProviderClient};
use crate::error::BridgeError;

/// Magic cookie providers require before they will serve. Guards against a
/// provider binary being executed by hand.
const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

/// Protocol versions offered to the provider, newest first. The provider
/// answers with the one it picked in the handshake line.
const PROTOCOL_VERSIONS: &str = "6,5";

/// Handing the provider a port range makes it listen on TCP instead of a
/// unix socket.
const MIN_PORT: &str = "10000";
const MAX_PORT: &str = "25000";

/// How long to wait for the handshake line before giving up on the plugin.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// A launched provider: the gRPC client plus the process handle.
pub struct LaunchedProvider {
    /// Client speaking the protocol the provider negotiated.
    pub client: ProviderClient,
    /// Handle used to terminate the plugin process.
    pub process: PluginProcess,
}

/// Handle on a running provider process.
///
/// The child is killed when the handle is dropped; call
/// [`PluginProcess::kill`] to do it eagerly and reap the exit status.
#[derive(Debug)]
pub struct PluginProcess {
    child: Child,
}

impl PluginProcess {
    /// OS process id, while the child is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Terminate the provider process and wait for it to exit.
    ///
    /// A process that already exited on its own is not an error.
    pub async fn kill(&mut self) -> Result<(), BridgeError> {
        match self.child.start_kill() {
            Ok(()) => {}
            // Raised when the child has already been reaped.
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
            Err(e) => return Err(e.into()),
        }
        let status = self.child.wait().await?;
        debug!(?status, "provider process exited");
        Ok(())
    }
}

/// Spawn a provider binary and connect to it.
///
/// `command` is run through `sh -c`, so it may carry arguments. The call
/// returns once the handshake completed and the gRPC channel is up.
pub async fn launch(command: &str) -> Result<LaunchedProvider, BridgeError> {
    debug!(command, "starting provider plugin");
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
        .env("PLUGIN_PROTOCOL_VERSIONS", PROTOCOL_VERSIONS)
        .env("PLUGIN_MIN_PORT", MIN_PORT)
        .env("PLUGIN_MAX_PORT", MAX_PORT)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_output("stderr", BufReader::new(stderr).lines()));
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| BridgeError::Handshake("plugin stdout unavailable".to_string()))?;
    let mut stdout_lines = BufReader::new(stdout).lines();

    let line = tokio::time::timeout(HANDSHAKE_TIMEOUT, stdout_lines.next_line())
        .await
        .map_err(|_| {
            BridgeError::Handshake("timed out waiting for the plugin handshake".to_string())
        })??
        .ok_or_else(|| {
            BridgeError::Handshake("plugin exited before completing the handshake".to_string())
        })?;
    let handshake = parse_handshake(&line)?;
    info!(
        protocol = %handshake.protocol,
        address = %handshake.address,
        "provider handshake complete"
    );

    // Anything else the plugin prints on stdout is log material.
    tokio::spawn(forward_output("stdout", stdout_lines));

    let endpoint = Endpoint::from_shared(format!("http://{}", handshake.address))
        .map_err(|e| {
            BridgeError::Handshake(format!(
                "invalid plugin address {:?}: {}",
                handshake.address, e
            ))
        })?
        .connect_timeout(Duration::from_secs(10));
    let channel = endpoint.connect().await?;

    Ok(LaunchedProvider {
        client: ProviderClient::new(channel, handshake.protocol),
        process: PluginProcess { child },
    })
}

/// Parsed contents of the stdout handshake line.
#[derive(Debug, PartialEq, Eq)]
struct Handshake {
    protocol: Protocol,
    address: String,
}

fn parse_handshake(line: &str) -> Result<Handshake, BridgeError> {
    let line = line.trim();
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 4 {
        return Err(BridgeError::Handshake(format!(
            "malformed handshake line {:?}",
            line
        )));
    }

    if parts[0] != "1" {
        return Err(BridgeError::Handshake(format!(
            "unsupported core protocol version {:?}",
            parts[0]
        )));
    }

    let version: u32 = parts[1].parse().map_err(|_| {
        BridgeError::Handshake(format!("invalid protocol version {:?}", parts[1]))
    })?;
    let protocol = Protocol::from_version(version).ok_or_else(|| {
        BridgeError::Handshake(format!(
            "provider negotiated unsupported protocol version {}",
            version
        ))
    })?;

    if parts[2] != "tcp" {
        return Err(BridgeError::Handshake(format!(
            "unsupported network type {:?}",
            parts[2]
        )));
    }
    let address = parts[3].to_string();

    // Field 5 was introduced alongside gRPC; a line without it comes from a
    // plugin speaking the legacy RPC protocol.
    match parts.get(4) {
        Some(&"grpc") => {}
        other => {
            return Err(BridgeError::Handshake(format!(
                "provider does not speak grpc (got {:?})",
                other.unwrap_or(&"netrpc")
            )));
        },
    }

    // A sixth field carries a server certificate when mutual TLS was
    // requested, which this client never does.
    if parts.get(5).is_some_and(|cert| !cert.is_empty()) {
        return Err(BridgeError::Handshake(
            "provider requested TLS, which is not supported".to_string(),
        ));
    }

    Ok(Handshake { protocol, address })
}

async fn forward_output<R>(stream: &'static str, mut lines: Lines<R>)
where
    R: AsyncBufRead + Unpin,
{
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "provider", stream, "{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handshake_v6() {
        let handshake = parse_handshake("1|6|tcp|127.0.0.1:10042|grpc").unwrap();
        assert_eq!(handshake.protocol, Protocol::V6);
        assert_eq!(handshake.address, "127.0.0.1:10042");
    }

    #[test]
    fn test_parse_handshake_v5_with_newline() {
        let handshake = parse_handshake("1|5|tcp|127.0.0.1:10001|grpc\n").unwrap();
        assert_eq!(handshake.protocol, Protocol::V5);
        assert_eq!(handshake.address, "127.0.0.1:10001");
    }

    #[test]
    fn test_parse_handshake_empty_cert_field() {
        let handshake = parse_handshake("1|6|tcp|127.0.0.1:10042|grpc|").unwrap();
        assert_eq!(handshake.protocol, Protocol::V6);
    }

    #[test]
    fn test_parse_handshake_rejections() {
        // Not enough fields.
        assert!(parse_handshake("1|6|tcp").is_err());
        // Unknown core version.
        assert!(parse_handshake("2|6|tcp|127.0.0.1:1|grpc").is_err());
        // Protocol version we never offered.
        assert!(parse_handshake("1|4|tcp|127.0.0.1:1|grpc").is_err());
        assert!(parse_handshake("1|six|tcp|127.0.0.1:1|grpc").is_err());
        // Unix sockets are ruled out by the port range environment.
        assert!(parse_handshake("1|6|unix|/tmp/plugin.sock|grpc").is_err());
        // Legacy RPC plugins (no protocol field, or an explicit one).
        assert!(parse_handshake("1|6|tcp|127.0.0.1:1").is_err());
        assert!(parse_handshake("1|6|tcp|127.0.0.1:1|netrpc").is_err());
        // TLS is not supported.
        assert!(parse_handshake("1|6|tcp|127.0.0.1:1|grpc|Q0VSVA==").is_err());
    }
}
