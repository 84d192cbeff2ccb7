use std::{
    fmt,
    fs::{self, File},
    io::{self, ErrorKind, Write},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Cloud a node runs on.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum CloudService {
    Aws,
    Gcp,
}

impl CloudService {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudService::Aws => "aws",
            CloudService::Gcp => "gcp",
        }
    }

    pub fn default_node_type(&self) -> &'static str {
        match self {
            CloudService::Aws => "c5.2xlarge",
            CloudService::Gcp => "e2-standard-8",
        }
    }
}

impl fmt::Display for CloudService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CloudService::Aws => write!(f, "Amazon Web Services"),
            CloudService::Gcp => write!(f, "Google Cloud Platform"),
        }
    }
}

/// What a node is used for.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Copy, PartialOrd, Ord)]
pub enum Role {
    #[serde(rename = "Validator")]
    Validator,
    #[serde(rename = "API")]
    Api,
    #[serde(rename = "Monitor")]
    Monitor,
    #[serde(rename = "AWM-Relayer")]
    AwmRelayer,
    #[serde(rename = "Load-Test")]
    LoadTest,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Validator => "Validator",
            Role::Api => "API",
            Role::Monitor => "Monitor",
            Role::AwmRelayer => "AWM-Relayer",
            Role::LoadTest => "Load-Test",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Validator" => Ok(Role::Validator),
            "API" => Ok(Role::Api),
            "Monitor" => Ok(Role::Monitor),
            "AWM-Relayer" => Ok(Role::AwmRelayer),
            "Load-Test" => Ok(Role::LoadTest),
            _ => Err(Error::InvalidName {
                name: s.to_string(),
                reason: "unknown node role".to_string(),
            }),
        }
    }
}

/// One provisioned cloud instance ("node_cloud_config.yaml").
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub struct NodeConfig {
    /// Cloud instance ID.
    pub node_id: String,
    pub region: String,
    pub ami: String,
    pub key_pair: String,
    pub cert_path: String,
    pub security_group: String,
    #[serde(default)]
    pub elastic_ip: String,
    pub cloud_service: CloudService,
    #[serde(default)]
    pub use_static_ip: bool,
    /// Avalanche node ID derived from the staking certificate.
    /// Set once after the staking keys are generated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_identity: Option<String>,
    #[serde(default)]
    pub roles: Vec<Role>,
}

impl NodeConfig {
    /// Converts to string with YAML encoder.
    pub fn encode_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self)?)
    }

    /// Saves the node config to disk
    /// and overwrites the file.
    pub fn sync(&self, file_path: &str) -> Result<()> {
        log::info!("syncing NodeConfig to '{}'", file_path);
        let path = Path::new(file_path);
        if let Some(parent_dir) = path.parent() {
            fs::create_dir_all(parent_dir)?;
        }

        let d = self.encode_yaml()?;
        let mut f = File::create(file_path)?;
        f.write_all(d.as_bytes())?;
        Ok(())
    }

    pub fn load(file_path: &str) -> Result<Self> {
        log::info!("loading NodeConfig from {}", file_path);

        if !Path::new(file_path).exists() {
            return Err(Error::NotFound {
                message: format!("node config {} does not exist", file_path),
            });
        }

        let f = File::open(file_path).map_err(|e| {
            io::Error::new(
                ErrorKind::Other,
                format!("failed to open {} ({})", file_path, e),
            )
        })?;
        serde_yaml::from_reader(f).map_err(|e| {
            Error::Io(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid YAML: {}", e),
            ))
        })
    }

    pub fn set_roles(&mut self, roles: &[String]) -> Result<()> {
        let mut parsed = roles
            .iter()
            .map(|r| Role::from_str(r))
            .collect::<Result<Vec<_>>>()?;
        parsed.sort();
        parsed.dedup();
        self.roles = parsed;
        Ok(())
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- node::test_node_config --exact --show-output
#[test]
fn test_node_config() {
    let _ = env_logger::builder().is_test(true).try_init();

    let mut cfg = NodeConfig {
        node_id: "i-0123456789".to_string(),
        region: "us-east-1".to_string(),
        ami: "ami-abc".to_string(),
        key_pair: "user-us-east-1-avalanche-cli-us-east-1".to_string(),
        cert_path: "/tmp/kp.pem".to_string(),
        security_group: "user-us-east-1-avalanche-cli-us-east-1-sg".to_string(),
        elastic_ip: String::new(),
        cloud_service: CloudService::Aws,
        use_static_ip: false,
        node_identity: None,
        roles: Vec::new(),
    };
    cfg.set_roles(&["Validator".to_string(), "API".to_string(), "Validator".to_string()])
        .unwrap();
    assert_eq!(cfg.roles, vec![Role::Validator, Role::Api]);
    assert!(cfg.set_roles(&["Miner".to_string()]).is_err());

    let d = tempfile::tempdir().unwrap();
    let p = d.path().join("nodes").join(&cfg.node_id).join("node_cloud_config.yaml");
    let p = p.display().to_string();
    assert!(matches!(NodeConfig::load(&p), Err(Error::NotFound { .. })));

    cfg.node_identity = Some("NodeID-7Xhw2mDxuDS44j42TCB6U5579esbSt3Lg".to_string());
    cfg.sync(&p).unwrap();
    let loaded = NodeConfig::load(&p).unwrap();
    assert_eq!(loaded, cfg);
    assert!(cfg.encode_yaml().unwrap().contains("cloud_service: aws"));
    assert!(cfg.encode_yaml().unwrap().contains("- API"));
}
