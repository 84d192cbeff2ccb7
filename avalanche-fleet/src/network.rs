use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAINNET_ID: u32 = 1;
pub const FUJI_ID: u32 = 5;
pub const LOCAL_ID: u32 = 1337;
pub const DEVNET_ID: u32 = 1338;

pub const MAINNET_ENDPOINT: &str = "https://api.avax.network";
pub const FUJI_ENDPOINT: &str = "https://api.avax-test.network";
pub const LOCAL_ENDPOINT: &str = "http://127.0.0.1:9650";

#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Mainnet,
    Fuji,
    Local,
    Devnet,
    Cluster,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Kind::Mainnet => write!(f, "Mainnet"),
            Kind::Fuji => write!(f, "Fuji"),
            Kind::Local => write!(f, "Local Network"),
            Kind::Devnet => write!(f, "Devnet"),
            Kind::Cluster => write!(f, "Cluster"),
        }
    }
}

/// Network a cluster or subnet deployment targets.
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(rename_all = "snake_case")]
pub struct Network {
    pub kind: Kind,
    pub id: u32,
    pub endpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
}

impl Network {
    pub fn mainnet() -> Self {
        Self::new(Kind::Mainnet, MAINNET_ID, MAINNET_ENDPOINT)
    }

    pub fn fuji() -> Self {
        Self::new(Kind::Fuji, FUJI_ID, FUJI_ENDPOINT)
    }

    pub fn local() -> Self {
        Self::new(Kind::Local, LOCAL_ID, LOCAL_ENDPOINT)
    }

    /// Devnet endpoint is the API port of one of its nodes.
    pub fn devnet(endpoint: &str) -> Self {
        Self::new(Kind::Devnet, DEVNET_ID, endpoint)
    }

    pub fn cluster(cluster_name: &str) -> Self {
        Self {
            cluster_name: Some(cluster_name.to_string()),
            ..Self::new(Kind::Cluster, LOCAL_ID, LOCAL_ENDPOINT)
        }
    }

    fn new(kind: Kind, id: u32, endpoint: &str) -> Self {
        Self {
            kind,
            id,
            endpoint: endpoint.to_string(),
            cluster_name: None,
        }
    }

    /// Name used as the key for per-network sidecar records.
    pub fn name(&self) -> String {
        match &self.cluster_name {
            Some(c) => format!("{} {}", self.kind, c),
            None => self.kind.to_string(),
        }
    }

    /// Value for the avalanchego "--network-id" flag.
    pub fn network_id_flag(&self) -> String {
        match self.kind {
            Kind::Mainnet => "mainnet".to_string(),
            Kind::Fuji => "fuji".to_string(),
            _ => format!("network-{}", self.id),
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- network::test_network --exact --show-output
#[test]
fn test_network() {
    assert_eq!(Network::fuji().network_id_flag(), "fuji");
    assert_eq!(Network::mainnet().network_id_flag(), "mainnet");
    assert_eq!(Network::devnet("http://1.2.3.4:9650").network_id_flag(), "network-1338");
    assert_eq!(Network::cluster("c1").name(), "Cluster c1");
    assert_eq!(Network::fuji().id, 5);

    let s = serde_yaml::to_string(&Network::devnet("http://1.2.3.4:9650")).unwrap();
    assert!(s.contains("kind: devnet"));
    let n: Network = serde_yaml::from_str(&s).unwrap();
    assert_eq!(n.endpoint, "http://1.2.3.4:9650");
}
