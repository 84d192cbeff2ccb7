//! Remote command execution seam.
pub mod ssh;

use std::time::Duration;

use async_trait::async_trait;

use crate::{errors::Result, node::CloudService};

pub const SSH_USER: &str = "ubuntu";

/// ssh/scp options shared by every connection to a fleet host.
pub const SSH_COMMON_ARGS: &[&str] = &[
    "-o",
    "IdentitiesOnly=yes",
    "-o",
    "StrictHostKeyChecking=no",
    "-o",
    "UserKnownHostsFile=/dev/null",
    "-o",
    "ConnectTimeout=10",
    "-o",
    "LogLevel=ERROR",
];

/// One reachable fleet host.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Host {
    /// Inventory alias, e.g., "aws_node_i-0123".
    pub node_id: String,
    pub ip: String,
    pub ssh_user: String,
    pub ssh_private_key_path: String,
    pub ssh_common_args: Vec<String>,
}

impl Host {
    pub fn new(cloud: CloudService, instance_id: &str, ip: &str, ssh_private_key_path: &str) -> Self {
        Self {
            node_id: Self::alias(cloud, instance_id),
            ip: ip.to_string(),
            ssh_user: SSH_USER.to_string(),
            ssh_private_key_path: ssh_private_key_path.to_string(),
            ssh_common_args: SSH_COMMON_ARGS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn alias(cloud: CloudService, instance_id: &str) -> String {
        format!("{}_node_{}", cloud.as_str(), instance_id)
    }

    /// Cloud instance ID the alias was built from.
    pub fn instance_id(&self) -> &str {
        for prefix in ["aws_node_", "gcp_node_"] {
            if let Some(id) = self.node_id.strip_prefix(prefix) {
                return id;
            }
        }
        &self.node_id
    }

    pub fn destination(&self) -> String {
        format!("{}@{}", self.ssh_user, self.ip)
    }
}

/// Runs commands on and copies files to fleet hosts.
#[async_trait]
pub trait Remote: Send + Sync {
    /// One connection attempt.
    async fn connect(&self, host: &Host) -> Result<()>;

    /// Runs the shell script on the host and returns its stdout.
    async fn run(&self, host: &Host, script: &str, timeout: Duration) -> Result<String>;

    async fn upload(
        &self,
        host: &Host,
        local_path: &str,
        remote_path: &str,
        timeout: Duration,
    ) -> Result<()>;
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- remote::test_host --exact --show-output
#[test]
fn test_host() {
    let h = Host::new(CloudService::Gcp, "node-0", "10.0.0.1", "/tmp/kp.pem");
    assert_eq!(h.node_id, "gcp_node_node-0");
    assert_eq!(h.instance_id(), "node-0");
    assert_eq!(h.destination(), "ubuntu@10.0.0.1");
}
