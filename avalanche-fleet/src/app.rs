use std::path::{Path, PathBuf};

use crate::{
    cluster::ClustersConfig,
    errors::Result,
    node::NodeConfig,
};

pub const CLUSTERS_CONFIG_FILE: &str = "clusters.yaml";
pub const NODE_CONFIG_FILE: &str = "node_cloud_config.yaml";
pub const GENESIS_FILE: &str = "genesis.json";
pub const SIDECAR_FILE: &str = "sidecar.yaml";

pub const STAKER_CERT_FILE: &str = "staker.crt";
pub const STAKER_KEY_FILE: &str = "staker.key";
pub const SIGNER_KEY_FILE: &str = "signer.key";

/// On-disk state, all rooted at one base directory.
#[derive(Debug, Clone)]
pub struct App {
    base_dir: PathBuf,
}

impl App {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path(&self, parts: &[&str]) -> String {
        let mut p = self.base_dir.clone();
        for part in parts {
            p.push(part);
        }
        p.display().to_string()
    }

    pub fn clusters_config_path(&self) -> String {
        self.path(&[CLUSTERS_CONFIG_FILE])
    }

    pub fn node_dir(&self, instance_id: &str) -> String {
        self.path(&["nodes", instance_id])
    }

    pub fn node_config_path(&self, instance_id: &str) -> String {
        self.path(&["nodes", instance_id, NODE_CONFIG_FILE])
    }

    pub fn ssh_dir(&self) -> String {
        self.path(&["ssh"])
    }

    pub fn ssh_cert_path(&self, cert_name: &str) -> String {
        self.path(&["ssh", cert_name])
    }

    pub fn terraform_dir(&self, cluster_name: &str) -> String {
        self.path(&["terraform", cluster_name])
    }

    pub fn inventory_path(&self, cluster_name: &str) -> String {
        self.path(&["inventories", cluster_name, "hosts"])
    }

    pub fn subnet_dir(&self, subnet_name: &str) -> String {
        self.path(&["subnets", subnet_name])
    }

    pub fn genesis_path(&self, subnet_name: &str) -> String {
        self.path(&["subnets", subnet_name, GENESIS_FILE])
    }

    pub fn sidecar_path(&self, subnet_name: &str) -> String {
        self.path(&["subnets", subnet_name, SIDECAR_FILE])
    }

    pub fn subnet_exists(&self, subnet_name: &str) -> bool {
        Path::new(&self.sidecar_path(subnet_name)).exists()
    }

    pub fn load_clusters_config(&self) -> Result<ClustersConfig> {
        ClustersConfig::load_or_default(&self.clusters_config_path())
    }

    pub fn write_clusters_config(&self, cfg: &ClustersConfig) -> Result<()> {
        cfg.sync(&self.clusters_config_path())
    }

    pub fn load_node_config(&self, instance_id: &str) -> Result<NodeConfig> {
        NodeConfig::load(&self.node_config_path(instance_id))
    }

    pub fn write_node_config(&self, cfg: &NodeConfig) -> Result<()> {
        cfg.sync(&self.node_config_path(&cfg.node_id))
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- app::test_layout --exact --show-output
#[test]
fn test_layout() {
    let app = App::new("/tmp/fleet");
    assert_eq!(app.clusters_config_path(), "/tmp/fleet/clusters.yaml");
    assert_eq!(
        app.node_config_path("i-1"),
        "/tmp/fleet/nodes/i-1/node_cloud_config.yaml"
    );
    assert_eq!(app.inventory_path("c1"), "/tmp/fleet/inventories/c1/hosts");
    assert_eq!(app.sidecar_path("my subnet"), "/tmp/fleet/subnets/my subnet/sidecar.yaml");
}
