//! # Domain Types
//!
//! Payloads exchanged with the loudds backend.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Backend Payloads                                │
//! │                                                                         │
//! │  GET /users/me/ssh_key      GET /users/me        GET /datasets/{id}/    │
//! │  ┌─────────────────┐   ┌─────────────────┐   │     cluster            │
//! │  │ SshKeyMaterial  │   │    UserInfo     │   ┌─────────────────┐       │
//! │  │  private_key    │   │  id             │   │  ClusterInfo    │       │
//! │  └────────┬────────┘   │  organisation_id│   │  domain         │       │
//! │           │            └────────┬────────┘   │  proxy_host/port│       │
//! │           │                     │            └────────┬────────┘       │
//! │           └─────────────────────┼─────────────────────┘                │
//! │                                 ▼                                       │
//! │                        ┌─────────────────┐                              │
//! │                        │ ConnectionInfo  │ ──► TunnelTarget             │
//! │                        └─────────────────┘                              │
//! │                                                                         │
//! │  POST /predictions/{dataset_id}                                        │
//! │  ┌─────────────────────────────────────────┐                           │
//! │  │ PredictionSummary { items: [SummaryItem] }                          │
//! │  └─────────────────────────────────────────┘                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::{DEFAULT_SSH_USER, REMOTE_RSYNCD_PORT};

// =============================================================================
// User
// =============================================================================

/// The authenticated user, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Backend user id.
    pub id: u64,

    /// Organisation the user belongs to. Selects the compute namespace.
    pub organisation_id: u64,
}

impl UserInfo {
    /// Kubernetes-style namespace holding this user's workloads.
    pub fn namespace(&self) -> String {
        format!("org-{}", self.organisation_id)
    }
}

// =============================================================================
// SSH Key
// =============================================================================

/// Per-user SSH private key handed out by the backend.
///
/// `Debug` never prints the key itself.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyMaterial {
    /// PEM / OpenSSH encoded private key.
    pub private_key: String,
}

impl SshKeyMaterial {
    pub fn new(private_key: impl Into<String>) -> Self {
        Self {
            private_key: private_key.into(),
        }
    }

    /// Key text terminated by a newline; OpenSSH rejects keys without one.
    pub fn to_key_file_contents(&self) -> String {
        let mut contents = self.private_key.trim_end().to_string();
        contents.push('\n');
        contents
    }
}

impl fmt::Debug for SshKeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshKeyMaterial")
            .field("private_key", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Cluster
// =============================================================================

fn default_ssh_user() -> String {
    DEFAULT_SSH_USER.to_string()
}

/// Connection metadata for the cluster hosting a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// In-cluster DNS suffix, e.g. `cluster.local`.
    pub domain: String,

    /// Publicly reachable SSH proxy (bastion) host.
    pub proxy_host: String,

    /// SSH port on the proxy.
    pub proxy_port: u16,

    /// Login name on the proxy.
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
}

impl ClusterInfo {
    /// Checks that every field needed to open a tunnel is present.
    pub fn ensure_complete(&self) -> CoreResult<()> {
        let missing = if self.domain.trim().is_empty() {
            Some("domain is empty")
        } else if self.proxy_host.trim().is_empty() {
            Some("proxy_host is empty")
        } else if self.proxy_port == 0 {
            Some("proxy_port is 0")
        } else if self.ssh_user.trim().is_empty() {
            Some("ssh_user is empty")
        } else {
            None
        };

        match missing {
            Some(reason) => Err(CoreError::IncompletePayload {
                payload: "cluster info".to_string(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// In-cluster DNS name of the user's rsync daemon.
    pub fn rsyncd_host(&self, user: &UserInfo) -> String {
        format!(
            "tensorboard-{}.{}.svc.{}",
            user.id,
            user.namespace(),
            self.domain.trim_start_matches('.')
        )
    }
}

// =============================================================================
// Connection Info
// =============================================================================

/// Everything fetched from the backend before a tunnel can be opened.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub key: SshKeyMaterial,
    pub user: UserInfo,
    pub cluster: ClusterInfo,
}

impl ConnectionInfo {
    /// Derives the SSH forwarding target.
    pub fn tunnel_target(&self) -> CoreResult<TunnelTarget> {
        self.cluster.ensure_complete()?;

        Ok(TunnelTarget {
            proxy_host: self.cluster.proxy_host.clone(),
            proxy_port: self.cluster.proxy_port,
            ssh_user: self.cluster.ssh_user.clone(),
            remote_host: self.cluster.rsyncd_host(&self.user),
            remote_port: REMOTE_RSYNCD_PORT,
        })
    }
}

/// Where an SSH tunnel connects and what it forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelTarget {
    pub proxy_host: String,
    pub proxy_port: u16,
    pub ssh_user: String,
    /// Host as resolved from the proxy, not from the local machine.
    pub remote_host: String,
    pub remote_port: u16,
}

impl TunnelTarget {
    /// `user@host` destination for ssh.
    pub fn destination(&self) -> String {
        format!("{}@{}", self.ssh_user, self.proxy_host)
    }

    /// `host:port` of the forwarded service.
    pub fn remote_endpoint(&self) -> String {
        format!("{}:{}", self.remote_host, self.remote_port)
    }
}

// =============================================================================
// Prediction Summary
// =============================================================================

/// One scored example in a prediction summary.
///
/// ```json
/// {
///   "predictions": {"cat": 0.91, "dog": 0.09},
///   "target": "cat",
///   "loss": 0.094,
///   "filename": "img_001.jpg",
///   "type": "validation"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryItem {
    /// Score per class name.
    pub predictions: BTreeMap<String, f64>,

    /// Ground-truth class name.
    pub target: String,

    /// Per-example loss.
    pub loss: f64,

    /// File name of the example (no directory).
    pub filename: String,

    /// Dataset split, e.g. `validation` or `test`.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of `POST /predictions/{dataset_id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub items: Vec<SummaryItem>,
}

impl PredictionSummary {
    pub fn new(items: Vec<SummaryItem>) -> Self {
        Self { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends the items of another summary (e.g. the test split after validation).
    pub fn extend(&mut self, other: PredictionSummary) {
        self.items.extend(other.items);
    }
}
