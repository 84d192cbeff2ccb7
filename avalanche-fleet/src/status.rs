//! Health of a cluster's nodes, optionally with the sync status of one subnet.
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::{json, Value};

use crate::{
    app::App,
    errors::{Error, Result},
    inventory,
    remote::{Host, Remote},
    results::{self, Report},
    sidecar::Sidecar,
};

pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

const INFO_ENDPOINT: &str = "http://127.0.0.1:9650/ext/info";
const PLATFORM_ENDPOINT: &str = "http://127.0.0.1:9650/ext/bc/P";

#[derive(Debug, Clone)]
pub struct StatusOptions {
    pub cluster_name: String,
    pub subnet: Option<String>,
    pub timeout: Duration,
}

/// One row of the status table.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct NodeStatus {
    pub alias: String,
    pub instance_id: String,
    pub node_identity: String,
    pub ip: String,
    pub bootstrapped: bool,
    /// "Syncing", "Validating" etc. when a subnet was asked for.
    pub subnet_status: Option<String>,
}

#[derive(Debug, Default)]
pub struct StatusReport {
    pub rows: Vec<NodeStatus>,
    /// Hosts whose queries failed.
    pub queries: Report,
}

impl StatusReport {
    pub fn not_bootstrapped(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| !r.bootstrapped)
            .map(|r| r.alias.clone())
            .collect()
    }

    /// Nodes not validating the subnet (only meaningful with a subnet).
    pub fn not_validating(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|r| matches!(&r.subnet_status, Some(s) if s != "Validating"))
            .map(|r| r.alias.clone())
            .collect()
    }
}

/// Shell script that posts the JSON-RPC request with curl on the host.
fn rpc_script(endpoint: &str, method: &str, params: Value) -> String {
    let body = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": method,
        "params": params,
    });
    format!(
        "curl -s -X POST --data '{}' -H 'content-type:application/json;' {}",
        body, endpoint
    )
}

fn rpc_result(host: &Host, out: &str) -> Result<Value> {
    let v: Value = serde_json::from_str(out.trim())
        .map_err(|e| Error::remote(&host.node_id, format!("invalid RPC response: {}", e)))?;
    if let Some(err) = v.get("error") {
        return Err(Error::remote(&host.node_id, format!("RPC error: {}", err)));
    }
    Ok(v["result"].clone())
}

pub async fn is_bootstrapped(remote: &dyn Remote, host: &Host, timeout: Duration) -> Result<bool> {
    let out = remote
        .run(
            host,
            &rpc_script(INFO_ENDPOINT, "info.isBootstrapped", json!({ "chain": "X" })),
            timeout,
        )
        .await?;
    Ok(rpc_result(host, &out)?["isBootstrapped"]
        .as_bool()
        .unwrap_or(false))
}

pub async fn blockchain_status(
    remote: &dyn Remote,
    host: &Host,
    blockchain_id: &str,
    timeout: Duration,
) -> Result<String> {
    let out = remote
        .run(
            host,
            &rpc_script(
                PLATFORM_ENDPOINT,
                "platform.getBlockchainStatus",
                json!({ "blockchainID": blockchain_id }),
            ),
            timeout,
        )
        .await?;
    Ok(rpc_result(host, &out)?["status"]
        .as_str()
        .unwrap_or("Unknown")
        .to_string())
}

/// Fails if the cluster is unknown, or the subnet has no blockchain on the cluster's network.
pub async fn status(app: &App, remote: Arc<dyn Remote>, opts: &StatusOptions) -> Result<StatusReport> {
    let clusters = app.load_clusters_config()?;
    let cluster = clusters.cluster(&opts.cluster_name)?;

    let blockchain_id = match &opts.subnet {
        Some(subnet) => {
            let sc = Sidecar::load(&app.sidecar_path(subnet))?;
            let id = sc.blockchain_id(&cluster.network.name()).ok_or_else(|| Error::NotFound {
                message: format!(
                    "subnet '{}' is not deployed on {}",
                    subnet,
                    cluster.network.name()
                ),
            })?;
            Some(id.to_string())
        }
        None => None,
    };

    let hosts = inventory::read(&app.inventory_path(&opts.cluster_name))?;
    let mut rows: BTreeMap<String, NodeStatus> = BTreeMap::new();
    for h in hosts.iter() {
        let identity = app
            .load_node_config(h.instance_id())
            .ok()
            .and_then(|c| c.node_identity)
            .unwrap_or_default();
        rows.insert(
            h.node_id.clone(),
            NodeStatus {
                alias: h.node_id.clone(),
                instance_id: h.instance_id().to_string(),
                node_identity: identity,
                ip: h.ip.clone(),
                ..Default::default()
            },
        );
    }
    let rows = Arc::new(Mutex::new(rows));

    let timeout = opts.timeout;
    let shared = Arc::clone(&rows);
    let queries = results::fan_out(
        hosts,
        |h| h.node_id.clone(),
        move |host| {
            let remote = Arc::clone(&remote);
            let rows = Arc::clone(&shared);
            let blockchain_id = blockchain_id.clone();
            async move {
                let res = async {
                    let bootstrapped = is_bootstrapped(remote.as_ref(), &host, timeout).await?;
                    let subnet_status = match &blockchain_id {
                        Some(id) => Some(blockchain_status(remote.as_ref(), &host, id, timeout).await?),
                        None => None,
                    };
                    if let Ok(mut rows) = rows.lock() {
                        if let Some(row) = rows.get_mut(&host.node_id) {
                            row.bootstrapped = bootstrapped;
                            row.subnet_status = subnet_status;
                        }
                    }
                    Ok::<(), Error>(())
                }
                .await;
                (None, res)
            }
        },
    )
    .await;

    let rows = match rows.lock() {
        Ok(g) => g.values().cloned().collect(),
        Err(poisoned) => poisoned.into_inner().values().cloned().collect(),
    };
    Ok(StatusReport { rows, queries })
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- status::test_rpc --exact --show-output
#[test]
fn test_rpc() {
    use crate::node::CloudService;

    let s = rpc_script(INFO_ENDPOINT, "info.isBootstrapped", json!({"chain": "X"}));
    assert!(s.starts_with("curl -s -X POST --data '{"));
    assert!(s.contains("\"method\":\"info.isBootstrapped\""));
    assert!(s.ends_with(INFO_ENDPOINT));

    let h = Host::new(CloudService::Aws, "i-1", "10.0.0.1", "/tmp/kp.pem");
    let v = rpc_result(&h, r#"{"jsonrpc":"2.0","result":{"isBootstrapped":true},"id":1}"#).unwrap();
    assert_eq!(v["isBootstrapped"], true);
    assert!(rpc_result(&h, r#"{"jsonrpc":"2.0","error":{"code":-32000},"id":1}"#).is_err());
    assert!(rpc_result(&h, "curl: (7) Failed to connect").is_err());
}
