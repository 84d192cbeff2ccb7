//! Declarative infrastructure for a cluster: what to create in each region.
pub mod terraform;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::{cloud::IngressRule, errors::Result, node::CloudService};

/// How the region gets its SSH key pair.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum KeyPairPlan {
    /// Generate a new key and write its private half to "cert_path".
    Create { name: String, cert_path: String },
    /// Register the existing local private key with the cloud.
    Import { name: String, cert_path: String },
    /// Key pair exists in the cloud and locally.
    Reuse { name: String, cert_path: String },
}

impl KeyPairPlan {
    pub fn name(&self) -> &str {
        match self {
            KeyPairPlan::Create { name, .. }
            | KeyPairPlan::Import { name, .. }
            | KeyPairPlan::Reuse { name, .. } => name,
        }
    }

    pub fn cert_path(&self) -> &str {
        match self {
            KeyPairPlan::Create { cert_path, .. }
            | KeyPairPlan::Import { cert_path, .. }
            | KeyPairPlan::Reuse { cert_path, .. } => cert_path,
        }
    }
}

/// How the region gets its security group (AWS) or firewall (GCP).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum SecurityGroupPlan {
    Create {
        name: String,
        ingress: Vec<IngressRule>,
    },
    /// Adds the missing rules to an existing group.
    Extend {
        id: String,
        name: String,
        ingress: Vec<IngressRule>,
    },
}

impl SecurityGroupPlan {
    pub fn name(&self) -> &str {
        match self {
            SecurityGroupPlan::Create { name, .. } | SecurityGroupPlan::Extend { name, .. } => {
                name
            }
        }
    }

    pub fn ingress(&self) -> &[IngressRule] {
        match self {
            SecurityGroupPlan::Create { ingress, .. }
            | SecurityGroupPlan::Extend { ingress, .. } => ingress,
        }
    }
}

/// Resources of one region.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RegionSpec {
    pub region: String,
    pub image_id: String,
    pub node_type: String,
    pub count: u32,
    pub key_pair: KeyPairPlan,
    pub security_group: SecurityGroupPlan,
    pub static_ip: bool,
    /// Instance name prefix; the index is appended.
    pub instance_prefix: String,
}

/// Everything one apply creates.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct InfraSpec {
    pub cloud: CloudService,
    pub aws_profile: String,
    pub gcp_project: String,
    pub gcp_credentials: String,
    pub regions: Vec<RegionSpec>,
}

/// Per-region results of a successful apply.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct ApplyOutput {
    pub instance_ids: BTreeMap<String, Vec<String>>,
    /// Only set for regions with static IPs, in the same order as the instance IDs.
    pub static_ips: BTreeMap<String, Vec<String>>,
}

/// Applies an infra spec.
#[async_trait]
pub trait InfraApplier: Send + Sync {
    async fn apply(&self, spec: &InfraSpec) -> Result<ApplyOutput>;

    /// Instances recorded in the infra state, keyed by region.
    /// Also works after a failed apply, which is what cleanup relies on.
    async fn created_instances(&self) -> Result<BTreeMap<String, Vec<String>>>;
}
