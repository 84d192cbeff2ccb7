use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    errors::{Error, Result},
    network::Network,
};

/// Nodes of one operator-named cluster.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub struct ClusterConfig {
    pub network: Network,
    /// Cloud instance IDs, in registration order.
    #[serde(default)]
    pub nodes: Vec<String>,
}

/// GCP settings remembered across runs.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub struct GcpConfig {
    pub project_name: String,
    pub service_account_file_path: String,
}

/// Persisted cluster and key-pair state ("clusters.yaml").
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub struct ClustersConfig {
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterConfig>,
    /// Cloud key-pair name to the local private key path.
    #[serde(default)]
    pub key_pairs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<GcpConfig>,
}

impl ClustersConfig {
    /// Loads the config, or returns an empty one if the file does not exist yet.
    pub fn load_or_default(file_path: &str) -> Result<Self> {
        if !Path::new(file_path).exists() {
            log::info!("{} does not exist, starting with an empty config", file_path);
            return Ok(Self::default());
        }
        Self::load(file_path)
    }

    pub fn load(file_path: &str) -> Result<Self> {
        log::info!("loading ClustersConfig from {}", file_path);
        if !Path::new(file_path).exists() {
            return Err(Error::NotFound {
                message: format!("clusters config {} does not exist", file_path),
            });
        }
        let f = File::open(file_path)?;
        Ok(serde_yaml::from_reader(f)?)
    }

    pub fn sync(&self, file_path: &str) -> Result<()> {
        log::info!("syncing ClustersConfig to '{}'", file_path);
        if let Some(parent_dir) = Path::new(file_path).parent() {
            fs::create_dir_all(parent_dir)?;
        }
        let d = serde_yaml::to_string(self)?;
        let mut f = File::create(file_path)?;
        f.write_all(d.as_bytes())?;
        Ok(())
    }

    pub fn cluster(&self, name: &str) -> Result<&ClusterConfig> {
        self.clusters.get(name).ok_or_else(|| Error::NotFound {
            message: format!("cluster '{}' does not exist", name),
        })
    }

    /// Appends the node to the cluster, creating the cluster on first use.
    /// Re-adding a node already in the cluster is a no-op.
    pub fn add_node(&mut self, cluster_name: &str, network: &Network, node_id: &str) {
        let cluster = self
            .clusters
            .entry(cluster_name.to_string())
            .or_insert_with(|| ClusterConfig {
                network: network.clone(),
                nodes: Vec::new(),
            });
        if !cluster.nodes.iter().any(|n| n == node_id) {
            cluster.nodes.push(node_id.to_string());
        }
    }

    /// Registers the key pair unless the name is already taken.
    /// Returns the path on record, which is the original one for existing names.
    pub fn register_key_pair(&mut self, name: &str, cert_path: &str) -> String {
        self.key_pairs
            .entry(name.to_string())
            .or_insert_with(|| cert_path.to_string())
            .clone()
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- cluster::test_register_key_pair_idempotent --exact --show-output
#[test]
fn test_register_key_pair_idempotent() {
    let mut cfg = ClustersConfig::default();
    assert_eq!(cfg.register_key_pair("kp-1", "/a/kp-1.pem"), "/a/kp-1.pem");
    assert_eq!(cfg.register_key_pair("kp-1", "/a/kp-1.pem"), "/a/kp-1.pem");
    assert_eq!(cfg.key_pairs.len(), 1);

    // a different path never overwrites the original
    assert_eq!(cfg.register_key_pair("kp-1", "/b/other.pem"), "/a/kp-1.pem");
    assert_eq!(cfg.key_pairs.get("kp-1").map(String::as_str), Some("/a/kp-1.pem"));
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- cluster::test_clusters_config --exact --show-output
#[test]
fn test_clusters_config() {
    let _ = env_logger::builder().is_test(true).try_init();

    let d = tempfile::tempdir().unwrap();
    let p = d.path().join("clusters.yaml").display().to_string();

    let mut cfg = ClustersConfig::load_or_default(&p).unwrap();
    assert!(cfg.clusters.is_empty());
    assert!(cfg.cluster("c1").is_err());

    cfg.add_node("c1", &Network::fuji(), "i-1");
    cfg.add_node("c1", &Network::devnet("http://x:9650"), "i-2");
    cfg.add_node("c1", &Network::fuji(), "i-1");
    cfg.register_key_pair("kp", "/kp.pem");
    cfg.sync(&p).unwrap();

    let loaded = ClustersConfig::load(&p).unwrap();
    assert_eq!(loaded, cfg);
    let c1 = loaded.cluster("c1").unwrap();
    // the network is fixed when the cluster is created
    assert_eq!(c1.network, Network::fuji());
    assert_eq!(c1.nodes, vec!["i-1".to_string(), "i-2".to_string()]);
}
