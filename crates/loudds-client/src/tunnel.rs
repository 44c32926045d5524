//! # SSH Tunnel
//!
//! Local port forward to the rsync daemon inside the user's namespace,
//! carried by the OpenSSH client.
//!
//! ## Tunnel Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         SSH Tunnel States                               │
//! │                                                                         │
//! │  ┌────────────┐   start()   ┌──────────────────┐                        │
//! │  │    Idle    │ ──────────► │ spawn ssh -N -L  │                        │
//! │  └────────────┘             └────────┬─────────┘                        │
//! │        ▲                             │                                  │
//! │        │                 port open   │   ssh exited / timeout           │
//! │        │                   ┌─────────┴─────────┐                        │
//! │        │                   ▼                   ▼                        │
//! │        │            ┌────────────┐      ┌────────────┐                  │
//! │        │            │   Active   │      │  Stopped   │ (error returned) │
//! │        │            └─────┬──────┘      └─────┬──────┘                  │
//! │        │                  │ stop()            │                         │
//! │        │                  ▼                   │ start() again           │
//! │        │            ┌────────────┐            │                         │
//! │        └─────────── │  Stopped   │ ◄──────────┘                         │
//! │                     └────────────┘                                      │
//! │                                                                         │
//! │  127.0.0.1:10873 ══ssh══► proxy_host:proxy_port ──► tensorboard-N:873   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The private key lives in a 0600 temp file for as long as ssh runs and is
//! removed on `stop()` or drop. Dropping an active tunnel kills ssh.

use std::fmt;
use std::io::Write;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use loudds_core::validation::{validate_port, validate_private_key};
use loudds_core::{host_literal, SshKeyMaterial, TunnelTarget};
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::process::{Child, Command};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::TunnelSettings;
use crate::error::{ClientError, ClientResult};

/// Delay between readiness probes of the forwarded port.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

// =============================================================================
// Tunnel State
// =============================================================================

/// Lifecycle state of an [`SshTunnel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Created, never started.
    Idle,
    /// ssh is running and the local port accepts connections.
    Active,
    /// Stopped explicitly or after a failed start.
    Stopped,
}

impl fmt::Display for TunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunnelState::Idle => write!(f, "idle"),
            TunnelState::Active => write!(f, "active"),
            TunnelState::Stopped => write!(f, "stopped"),
        }
    }
}

// =============================================================================
// Tunnel Options
// =============================================================================

/// Local side of the tunnel and how ssh is invoked.
#[derive(Debug, Clone)]
pub struct TunnelOptions {
    pub ssh_binary: String,
    pub bind_addr: IpAddr,
    pub local_port: u16,
    pub ready_timeout: Duration,
    pub strict_host_key_checking: bool,
}

impl TunnelOptions {
    pub fn from_settings(settings: &TunnelSettings) -> ClientResult<Self> {
        let bind_addr = settings.local_bind_addr.parse::<IpAddr>().map_err(|_| {
            ClientError::InvalidConfig(format!(
                "local_bind_addr must be an IP address, got: {}",
                settings.local_bind_addr
            ))
        })?;

        Ok(Self {
            ssh_binary: settings.ssh_binary.clone(),
            bind_addr,
            local_port: settings.local_bind_port,
            ready_timeout: settings.ready_timeout(),
            strict_host_key_checking: settings.strict_host_key_checking,
        })
    }

    /// Same options, different local port.
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }
}

// =============================================================================
// SSH Tunnel
// =============================================================================

/// `ssh -L` port forward to the user's rsync daemon.
///
/// ## Usage
/// ```rust,ignore
/// let mut tunnel = loud.setup_tensorboard_tunnel(1).await?;
/// tunnel.start().await?;
/// loud.upload_tensorboard_logs(&loud.rsyncd_remote_url(tunnel.local_port()), "../runs/").await?;
/// tunnel.stop().await?;
/// ```
pub struct SshTunnel {
    options: TunnelOptions,
    target: TunnelTarget,
    key: SshKeyMaterial,
    state: TunnelState,
    child: Option<Child>,
    key_file: Option<NamedTempFile>,
}

impl SshTunnel {
    /// Creates an idle tunnel. Nothing is spawned until [`start`](Self::start).
    pub fn new(options: TunnelOptions, target: TunnelTarget, key: SshKeyMaterial) -> ClientResult<Self> {
        validate_port("local_bind_port", options.local_port)?;
        validate_port("proxy_port", target.proxy_port)?;
        validate_private_key(&key.private_key)?;

        Ok(Self {
            options,
            target,
            key,
            state: TunnelState::Idle,
            child: None,
            key_file: None,
        })
    }

    pub fn state(&self) -> TunnelState {
        self.state
    }

    /// True while ssh is still running. Notices an ssh that exited on its
    /// own and moves the tunnel to `Stopped`.
    pub fn is_active(&mut self) -> bool {
        if self.state != TunnelState::Active {
            return false;
        }

        let exited = match self.child.as_mut().map(|c| c.try_wait()) {
            Some(Ok(None)) => None,
            Some(Ok(Some(status))) => Some(status.to_string()),
            Some(Err(e)) => Some(e.to_string()),
            None => Some("no child process".to_string()),
        };

        if let Some(reason) = exited {
            warn!(local = %self.local_address(), %reason, "ssh tunnel exited");
            self.child = None;
            self.key_file = None;
            self.state = TunnelState::Stopped;
            return false;
        }
        true
    }

    pub fn local_port(&self) -> u16 {
        self.options.local_port
    }

    pub fn local_address(&self) -> SocketAddr {
        SocketAddr::new(self.options.bind_addr, self.options.local_port)
    }

    pub fn target(&self) -> &TunnelTarget {
        &self.target
    }

    /// Arguments passed to ssh for a given identity file.
    pub fn ssh_args(&self, identity_file: &Path) -> Vec<String> {
        let mut args = vec![
            "-N".to_string(),
            "-i".to_string(),
            identity_file.display().to_string(),
            "-o".to_string(),
            "IdentitiesOnly=yes".to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=30".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
        ];

        if self.options.strict_host_key_checking {
            args.extend(["-o".to_string(), "StrictHostKeyChecking=yes".to_string()]);
        } else {
            args.extend([
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                "-o".to_string(),
                "UserKnownHostsFile=/dev/null".to_string(),
            ]);
        }

        args.extend([
            "-p".to_string(),
            self.target.proxy_port.to_string(),
            "-L".to_string(),
            format!(
                "{}:{}:{}:{}",
                host_literal(&self.options.bind_addr.to_string()),
                self.options.local_port,
                host_literal(&self.target.remote_host),
                self.target.remote_port
            ),
            self.target.destination(),
        ]);

        args
    }

    /// Spawns ssh and waits until the local port accepts connections.
    pub async fn start(&mut self) -> ClientResult<()> {
        if self.state == TunnelState::Active {
            return Err(ClientError::TunnelAlreadyActive(self.options.local_port));
        }

        self.ensure_port_free().await?;

        let key_file = self.write_key_file()?;
        let args = self.ssh_args(key_file.path());
        debug!(
            ssh = %self.options.ssh_binary,
            destination = %self.target.destination(),
            forward = %args.join(" "),
            "Spawning ssh tunnel"
        );

        let child = Command::new(&self.options.ssh_binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ClientError::Spawn {
                program: self.options.ssh_binary.clone(),
                reason: e.to_string(),
            })?;

        self.child = Some(child);
        self.key_file = Some(key_file);

        match self.wait_until_ready().await {
            Ok(()) => {
                self.drain_stderr();
                self.state = TunnelState::Active;
                info!(
                    local = %self.local_address(),
                    remote = %self.target.remote_endpoint(),
                    proxy = %self.target.destination(),
                    "SSH tunnel active"
                );
                Ok(())
            }
            Err(e) => {
                self.shutdown_child().await;
                self.state = TunnelState::Stopped;
                Err(e)
            }
        }
    }

    /// Kills ssh and removes the key file. No-op unless active.
    pub async fn stop(&mut self) -> ClientResult<()> {
        if self.state != TunnelState::Active {
            debug!(state = %self.state, "Tunnel not active, nothing to stop");
            return Ok(());
        }

        self.shutdown_child().await;
        self.state = TunnelState::Stopped;
        info!(local = %self.local_address(), "SSH tunnel stopped");
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn ensure_port_free(&self) -> ClientResult<()> {
        let addr = self.local_address();
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                drop(listener);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
                Err(ClientError::LocalPortInUse(addr.port()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_key_file(&self) -> ClientResult<NamedTempFile> {
        // NamedTempFile is created with mode 0600 on unix.
        let mut file = tempfile::Builder::new().prefix("loudds-key-").tempfile()?;
        file.write_all(self.key.to_key_file_contents().as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    async fn wait_until_ready(&mut self) -> ClientResult<()> {
        let addr = self.local_address();
        let deadline = Instant::now() + self.options.ready_timeout;

        loop {
            if let Some(child) = self.child.as_mut() {
                if let Some(status) = child.try_wait()? {
                    let mut stderr = String::new();
                    if let Some(mut pipe) = child.stderr.take() {
                        let _ = pipe.read_to_string(&mut stderr).await;
                    }
                    warn!(%status, "ssh exited before the tunnel came up");
                    return Err(ClientError::TunnelExited {
                        status: status.to_string(),
                        stderr: stderr.trim().to_string(),
                    });
                }
            }

            if TcpStream::connect(addr).await.is_ok() {
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(ClientError::TunnelTimeout(self.options.ready_timeout.as_secs()));
            }

            sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Forwards ssh's stderr to the log so the pipe never fills up.
    fn drain_stderr(&mut self) {
        let Some(stderr) = self.child.as_mut().and_then(|c| c.stderr.take()) else {
            return;
        };
        let local = self.local_address();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).split(b'\n');
            while let Ok(Some(line)) = lines.next_segment().await {
                debug!(%local, ssh = %String::from_utf8_lossy(&line), "ssh stderr");
            }
        });
    }

    async fn shutdown_child(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Failed to kill ssh");
            }
        }
        self.key_file = None;
    }
}

impl fmt::Display for SshTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SshTunnel[{}] {} -> {} via {}:{}",
            self.state,
            self.local_address(),
            self.target.remote_endpoint(),
            self.target.destination(),
            self.target.proxy_port
        )
    }
}

impl fmt::Debug for SshTunnel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshTunnel")
            .field("state", &self.state)
            .field("local", &self.local_address())
            .field("target", &self.target)
            .finish()
    }
}
