//! Cloud provider seam used by the provisioning orchestrator.
pub mod aws;
pub mod gcp;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{errors::Result, node::CloudService};

pub const SSH_PORT: u16 = 22;
pub const AVALANCHEGO_API_PORT: u16 = 9650;
pub const AVALANCHEGO_P2P_PORT: u16 = 9651;

/// Open to everyone.
pub const ANY_CIDR: &str = "0.0.0.0/0";

/// One allowed inbound TCP port from one CIDR.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct IngressRule {
    pub port: u16,
    pub cidr: String,
}

impl IngressRule {
    pub fn new(port: u16, cidr: &str) -> Self {
        Self {
            port,
            cidr: cidr.to_string(),
        }
    }
}

/// Inclusive TCP port range allowed from one CIDR, as an existing group reports it.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct IngressPermission {
    pub from_port: u16,
    pub to_port: u16,
    pub cidr: String,
}

impl IngressPermission {
    pub fn new(from_port: u16, to_port: u16, cidr: &str) -> Self {
        Self {
            from_port,
            to_port,
            cidr: cidr.to_string(),
        }
    }

    /// Every port from any source.
    pub fn all_ports(cidr: &str) -> Self {
        Self::new(0, u16::MAX, cidr)
    }

    pub fn covers(&self, rule: &IngressRule) -> bool {
        self.cidr == rule.cidr && self.from_port <= rule.port && rule.port <= self.to_port
    }
}

/// Existing security group (AWS) or firewall rule (GCP).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    pub ingress: Vec<IngressPermission>,
}

impl SecurityGroup {
    pub fn allows(&self, rule: &IngressRule) -> bool {
        self.ingress.iter().any(|p| p.covers(rule))
    }
}

/// Cloud API calls the orchestrator needs.
/// Instance creation itself goes through the declarative infra applier.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    fn service(&self) -> CloudService;

    /// Ubuntu image to launch in the region.
    async fn image_id(&self, region: &str) -> Result<String>;

    async fn key_pair_exists(&self, region: &str, name: &str) -> Result<bool>;

    async fn security_group(&self, region: &str, name: &str) -> Result<Option<SecurityGroup>>;

    async fn stop_instance(&self, region: &str, instance_id: &str) -> Result<()>;

    /// Current public IP of each instance, keyed by instance ID.
    async fn public_ips(
        &self,
        region: &str,
        instance_ids: &[String],
    ) -> Result<BTreeMap<String, String>>;
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- cloud::test_allows --exact --show-output
#[test]
fn test_allows() {
    let sg = SecurityGroup {
        id: "sg-1".to_string(),
        name: "sg".to_string(),
        ingress: vec![
            IngressPermission::all_ports("1.2.3.4/32"),
            IngressPermission::new(9650, 9651, ANY_CIDR),
        ],
    };
    assert!(sg.allows(&IngressRule::new(SSH_PORT, "1.2.3.4/32")));
    assert!(sg.allows(&IngressRule::new(AVALANCHEGO_API_PORT, "1.2.3.4/32")));
    assert!(sg.allows(&IngressRule::new(AVALANCHEGO_P2P_PORT, ANY_CIDR)));
    assert!(!sg.allows(&IngressRule::new(SSH_PORT, ANY_CIDR)));
    assert!(!sg.allows(&IngressRule::new(AVALANCHEGO_API_PORT, "5.6.7.8/32")));
}
