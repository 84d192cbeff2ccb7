use std::{
    collections::BTreeMap,
    fmt,
    fs::{self, File},
    io::Write,
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Copy)]
pub enum VmType {
    #[serde(rename = "Subnet-EVM")]
    SubnetEvm,
    #[serde(rename = "Custom")]
    CustomVm,
}

impl fmt::Display for VmType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VmType::SubnetEvm => write!(f, "Subnet-EVM"),
            VmType::CustomVm => write!(f, "Custom VM"),
        }
    }
}

/// Deployment of the subnet on one network.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub struct NetworkData {
    #[serde(default)]
    pub subnet_id: String,
    #[serde(default)]
    pub blockchain_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub teleporter_messenger_address: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub teleporter_registry_address: String,
}

/// Metadata kept next to a subnet's genesis.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub struct Sidecar {
    pub name: String,
    pub vm: VmType,
    #[serde(default)]
    pub vm_version: String,
    #[serde(default)]
    pub rpc_version: u32,
    pub subnet: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub custom_vm_path: String,
    #[serde(default)]
    pub token_symbol: String,
    #[serde(default)]
    pub token_name: String,
    #[serde(default)]
    pub teleporter_ready: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub teleporter_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub teleporter_version: String,
    /// Keyed by network name.
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkData>,
}

impl Sidecar {
    pub fn new(name: &str, vm: VmType) -> Self {
        Self {
            name: name.to_string(),
            vm,
            vm_version: String::new(),
            rpc_version: 0,
            subnet: name.to_string(),
            custom_vm_path: String::new(),
            token_symbol: String::new(),
            token_name: String::new(),
            teleporter_ready: false,
            teleporter_key: String::new(),
            teleporter_version: String::new(),
            networks: BTreeMap::new(),
        }
    }

    pub fn sync(&self, file_path: &str) -> Result<()> {
        log::info!("syncing Sidecar to '{}'", file_path);
        if let Some(parent_dir) = Path::new(file_path).parent() {
            fs::create_dir_all(parent_dir)?;
        }
        let d = serde_yaml::to_string(self)?;
        let mut f = File::create(file_path)?;
        f.write_all(d.as_bytes())?;
        Ok(())
    }

    pub fn load(file_path: &str) -> Result<Self> {
        if !Path::new(file_path).exists() {
            return Err(Error::NotFound {
                message: format!("sidecar {} does not exist", file_path),
            });
        }
        let f = File::open(file_path)?;
        Ok(serde_yaml::from_reader(f)?)
    }

    /// Blockchain ID of the deployment on the network, if deployed.
    pub fn blockchain_id(&self, network_name: &str) -> Option<&str> {
        self.networks
            .get(network_name)
            .map(|n| n.blockchain_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- sidecar::test_sidecar --exact --show-output
#[test]
fn test_sidecar() {
    let mut sc = Sidecar::new("mysubnet", VmType::SubnetEvm);
    assert!(sc.blockchain_id("Fuji").is_none());
    sc.networks.insert("Fuji".to_string(), NetworkData::default());
    assert!(sc.blockchain_id("Fuji").is_none());
    sc.networks.insert(
        "Fuji".to_string(),
        NetworkData {
            blockchain_id: "2X5...".to_string(),
            ..Default::default()
        },
    );
    assert_eq!(sc.blockchain_id("Fuji"), Some("2X5..."));

    let d = tempfile::tempdir().unwrap();
    let p = d.path().join("sidecar.yaml").display().to_string();
    sc.sync(&p).unwrap();
    let loaded = Sidecar::load(&p).unwrap();
    assert_eq!(loaded, sc);
    assert!(serde_yaml::to_string(&sc).unwrap().contains("vm: Subnet-EVM"));
}
