//! Release and RPC protocol compatibility lookups.
use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use reqwest::ClientBuilder;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

pub const AVA_LABS_ORG: &str = "ava-labs";
pub const AVALANCHEGO_REPO: &str = "avalanchego";
pub const SUBNET_EVM_REPO: &str = "subnet-evm";

/// Used when no other version source is given.
pub const DEFAULT_AVALANCHEGO_VERSION: &str = "v1.10.11";

/// Maps subnet-evm versions to their RPC chain VM protocol version.
pub const SUBNET_EVM_COMPATIBILITY_URL: &str =
    "https://raw.githubusercontent.com/ava-labs/subnet-evm/master/compatibility.json";

/// Maps RPC chain VM protocol versions to the avalanchego versions speaking them.
pub const AVALANCHEGO_COMPATIBILITY_URL: &str =
    "https://raw.githubusercontent.com/ava-labs/avalanchego/master/version/compatibility.json";

/// Parses "v<major>.<minor>.<patch>[-suffix]".
pub fn parse_version(v: &str) -> Option<(u64, u64, u64)> {
    let rest = v.strip_prefix('v')?;
    let core = match rest.split_once('-') {
        Some((core, suffix)) if !suffix.is_empty() => core,
        Some(_) => return None,
        None => rest,
    };
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

pub fn validate_version(v: &str) -> Result<()> {
    if parse_version(v).is_none() {
        return Err(Error::InvalidVersion {
            version: v.to_string(),
        });
    }
    Ok(())
}

/// ref. https://api.github.com/repos/ava-labs/avalanchego/releases/latest
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub struct ReleaseResponse {
    /// Sometimes empty for github API consistency issue.
    pub tag_name: Option<String>,
    #[serde(default)]
    pub prerelease: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubnetEvmCompatibility {
    rpc_chain_vm_protocol_version: BTreeMap<String, u32>,
}

/// Reads the RPC protocol version of the subnet-evm version.
pub fn parse_rpc_version(compatibility: &[u8], vm_version: &str) -> Result<u32> {
    let c: SubnetEvmCompatibility = serde_json::from_slice(compatibility)?;
    c.rpc_chain_vm_protocol_version
        .get(vm_version)
        .copied()
        .ok_or_else(|| Error::NotFound {
            message: format!("RPC protocol version for subnet-evm {}", vm_version),
        })
}

/// Picks the newest avalanchego version speaking the RPC protocol version.
pub fn parse_avalanchego_for_rpc(compatibility: &[u8], rpc_version: u32) -> Result<String> {
    let c: BTreeMap<String, Vec<String>> = serde_json::from_slice(compatibility)?;
    c.get(&rpc_version.to_string())
        .into_iter()
        .flatten()
        .filter_map(|v| parse_version(v).map(|parsed| (parsed, v)))
        .max_by_key(|(parsed, _)| *parsed)
        .map(|(_, v)| v.clone())
        .ok_or_else(|| Error::NotFound {
            message: format!("avalanchego version for RPC protocol version {}", rpc_version),
        })
}

/// Version lookups the subnet and cluster flows need.
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn latest_release(&self, org: &str, repo: &str) -> Result<String>;

    /// Newest release including pre-releases.
    async fn latest_pre_release(&self, org: &str, repo: &str) -> Result<String>;

    async fn rpc_version(&self, vm_version: &str) -> Result<u32>;

    async fn avalanchego_for_rpc(&self, rpc_version: u32) -> Result<String>;
}

/// Looks versions up on GitHub.
#[derive(Debug, Clone, Default)]
pub struct GitHub;

async fn fetch(ep: &str) -> Result<Vec<u8>> {
    log::info!("fetching {}", ep);

    let cli = ClientBuilder::new()
        .user_agent(env!("CARGO_PKG_NAME"))
        .timeout(Duration::from_secs(15))
        .connection_verbose(true)
        .build()
        .map_err(|e| Error::other(format!("failed ClientBuilder build {}", e)))?;
    let resp = cli
        .get(ep)
        .send()
        .await
        .map_err(|e| Error::other(format!("failed ClientBuilder send {}", e)))?;
    if !resp.status().is_success() {
        return Err(Error::other(format!(
            "{} returned status {}",
            ep,
            resp.status()
        )));
    }
    let out = resp
        .bytes()
        .await
        .map_err(|e| Error::other(format!("failed ClientBuilder bytes {}", e)))?;
    Ok(out.into())
}

fn tag_of(resp: ReleaseResponse, org: &str, repo: &str) -> Result<String> {
    resp.tag_name.ok_or_else(|| Error::NotFound {
        message: format!("release tag for {}/{}", org, repo),
    })
}

#[async_trait]
impl VersionSource for GitHub {
    async fn latest_release(&self, org: &str, repo: &str) -> Result<String> {
        let ep = format!("https://api.github.com/repos/{}/{}/releases/latest", org, repo);
        let resp: ReleaseResponse = serde_json::from_slice(&fetch(&ep).await?)?;
        tag_of(resp, org, repo)
    }

    async fn latest_pre_release(&self, org: &str, repo: &str) -> Result<String> {
        let ep = format!("https://api.github.com/repos/{}/{}/releases?per_page=10", org, repo);
        let releases: Vec<ReleaseResponse> = serde_json::from_slice(&fetch(&ep).await?)?;
        match releases.into_iter().next() {
            Some(r) => tag_of(r, org, repo),
            None => Err(Error::NotFound {
                message: format!("releases for {}/{}", org, repo),
            }),
        }
    }

    async fn rpc_version(&self, vm_version: &str) -> Result<u32> {
        parse_rpc_version(&fetch(SUBNET_EVM_COMPATIBILITY_URL).await?, vm_version)
    }

    async fn avalanchego_for_rpc(&self, rpc_version: u32) -> Result<String> {
        parse_avalanchego_for_rpc(&fetch(AVALANCHEGO_COMPATIBILITY_URL).await?, rpc_version)
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- versions::test_parse_version --exact --show-output
#[test]
fn test_parse_version() {
    assert_eq!(parse_version("v1.10.11"), Some((1, 10, 11)));
    assert_eq!(parse_version("v0.5.6-rc.1"), Some((0, 5, 6)));
    assert_eq!(parse_version("1.10.11"), None);
    assert_eq!(parse_version("v1.10"), None);
    assert_eq!(parse_version("v1.10.11-"), None);
    assert_eq!(parse_version("v1.10.11.2"), None);
    assert!(matches!(
        validate_version("latest"),
        Err(Error::InvalidVersion { .. })
    ));
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- versions::test_compatibility --exact --show-output
#[test]
fn test_compatibility() {
    let _ = env_logger::builder().is_test(true).try_init();

    let evm = br#"{"rpcChainVMProtocolVersion": {"v0.5.5": 28, "v0.5.6": 28, "v0.4.12": 26}}"#;
    assert_eq!(parse_rpc_version(evm, "v0.5.6").unwrap(), 28);
    assert!(parse_rpc_version(evm, "v9.9.9").is_err());

    let avalanchego = br#"{"28": ["v1.10.9", "v1.10.11", "v1.10.10"], "26": ["v1.10.0"]}"#;
    assert_eq!(parse_avalanchego_for_rpc(avalanchego, 28).unwrap(), "v1.10.11");
    assert!(parse_avalanchego_for_rpc(avalanchego, 30).is_err());
}
