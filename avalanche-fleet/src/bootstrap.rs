//! Brings freshly provisioned hosts to a running validator state.
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::Path,
    sync::Arc,
    time::Duration,
};

use serde_json::json;

use crate::{
    app::App,
    cloud::AVALANCHEGO_P2P_PORT,
    errors::Result,
    network::{Kind, Network},
    remote::{Host, Remote},
    results::{self, Report, TaskOutcome},
    scripts, staking,
};

pub const REMOTE_STAKING_DIR: &str = "/home/ubuntu/.avalanchego/staking";
pub const REMOTE_CONFIGS_DIR: &str = "/home/ubuntu/.avalanchego/configs";
pub const REMOTE_NODE_CONFIG: &str = "/home/ubuntu/.avalanchego/configs/node.json";
pub const NODE_CONFIG_FILE: &str = "node.json";

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(15 * 60);
const SHORT_STEP_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub avalanchego_version: String,
    /// Git branch or tag to build the CLI from.
    pub cli_version: String,
    pub network: Network,
    pub step_timeout: Duration,
}

/// Renders "node.json" for the host.
/// Bootstrap peers are (node ID, "ip:port") pairs, only set on Devnet.
pub fn render_node_config(
    network: &Network,
    public_ip: &str,
    bootstrap_peers: &[(String, String)],
) -> Result<Vec<u8>> {
    let mut cfg = json!({
        "network-id": network.network_id_flag(),
        "public-ip": public_ip,
        "http-host": "",
        "api-admin-enabled": true,
        "index-enabled": true,
    });
    if network.kind == Kind::Devnet && !bootstrap_peers.is_empty() {
        let ids: Vec<&str> = bootstrap_peers.iter().map(|(id, _)| id.as_str()).collect();
        let ips: Vec<&str> = bootstrap_peers.iter().map(|(_, ip)| ip.as_str()).collect();
        cfg["bootstrap-ids"] = json!(ids.join(","));
        cfg["bootstrap-ips"] = json!(ips.join(","));
    }
    Ok(serde_json::to_vec_pretty(&cfg)?)
}

fn write_local(path: &str, contents: &[u8]) -> Result<()> {
    if let Some(parent_dir) = Path::new(path).parent() {
        fs::create_dir_all(parent_dir)?;
    }
    let mut f = File::create(path)?;
    f.write_all(contents)?;
    Ok(())
}

fn node_config_path(app: &App, host: &Host) -> String {
    Path::new(&app.node_dir(host.instance_id()))
        .join(NODE_CONFIG_FILE)
        .display()
        .to_string()
}

/// Uploads "node.json" and restarts the node so it takes effect.
async fn push_node_config(
    app: &App,
    remote: &dyn Remote,
    host: &Host,
    contents: &[u8],
    timeout: Duration,
) -> Result<()> {
    let local = node_config_path(app, host);
    write_local(&local, contents)?;
    remote
        .run(host, &format!("mkdir -p {REMOTE_CONFIGS_DIR}"), SHORT_STEP_TIMEOUT)
        .await?;
    remote.upload(host, &local, REMOTE_NODE_CONFIG, timeout).await?;
    remote
        .run(host, "sudo systemctl restart avalanchego", SHORT_STEP_TIMEOUT)
        .await?;
    Ok(())
}

/// Steps after the identity exists; the first failure stops the host.
async fn setup_host(
    app: &App,
    remote: &dyn Remote,
    host: &Host,
    identity: &staking::Identity,
    opts: &BootstrapOptions,
) -> Result<()> {
    let mut cfg = app.load_node_config(host.instance_id())?;
    cfg.node_identity = Some(identity.node_id.clone());
    app.write_node_config(&cfg)?;

    remote
        .run(host, &format!("mkdir -p {REMOTE_STAKING_DIR}"), SHORT_STEP_TIMEOUT)
        .await?;
    for (local, name) in identity.files() {
        remote
            .upload(host, local, &format!("{REMOTE_STAKING_DIR}/{name}"), opts.step_timeout)
            .await?;
    }

    log::info!("[{}] installing avalanchego {}", host.node_id, opts.avalanchego_version);
    let script = scripts::setup_node(&opts.avalanchego_version, &opts.network.network_id_flag())?;
    remote.run(host, &script, opts.step_timeout).await?;

    let node_config = render_node_config(&opts.network, &host.ip, &[])?;
    push_node_config(app, remote, host, &node_config, opts.step_timeout).await?;

    log::info!("[{}] setting up build environment", host.node_id);
    remote
        .run(host, &scripts::setup_build_env()?, opts.step_timeout)
        .await?;

    log::info!("[{}] building CLI at {}", host.node_id, opts.cli_version);
    remote
        .run(host, &scripts::setup_cli_from_source(&opts.cli_version)?, opts.step_timeout)
        .await?;
    Ok(())
}

async fn bootstrap_host(
    app: App,
    remote: Arc<dyn Remote>,
    host: Host,
    opts: BootstrapOptions,
) -> TaskOutcome {
    if let Err(e) = remote.connect(&host).await {
        return (None, Err(e));
    }
    let identity = match staking::generate(&app.node_dir(host.instance_id())) {
        Ok(id) => id,
        Err(e) => return (None, Err(e)),
    };
    log::info!("[{}] node identity {}", host.node_id, identity.node_id);

    // identity is reported whether or not the remaining steps succeed
    let res = setup_host(&app, remote.as_ref(), &host, &identity, &opts).await;
    if let Err(e) = &res {
        log::warn!("[{}] bootstrap failed: {}", host.node_id, e);
    }
    (Some(identity.node_id), res)
}

/// Bootstraps every host in parallel. The report is keyed by host alias and
/// carries each node identity that was generated, including on failed hosts.
pub async fn bootstrap(
    app: &App,
    remote: Arc<dyn Remote>,
    hosts: Vec<Host>,
    opts: &BootstrapOptions,
) -> Report {
    log::info!("bootstrapping {} host(s)", hosts.len());
    let app = app.clone();
    let opts = opts.clone();
    results::fan_out(
        hosts,
        |h| h.node_id.clone(),
        move |host| bootstrap_host(app.clone(), Arc::clone(&remote), host, opts.clone()),
    )
    .await
}

/// Points every Devnet node at all the others as bootstrap peers.
/// "identities" is the bootstrap report, whose values are node identities.
pub async fn configure_devnet(
    app: &App,
    remote: Arc<dyn Remote>,
    hosts: Vec<Host>,
    identities: &Report,
    opts: &BootstrapOptions,
) -> Report {
    let peers: BTreeMap<String, (String, String)> = hosts
        .iter()
        .filter_map(|h| {
            identities.value(&h.node_id).map(|id| {
                (
                    h.node_id.clone(),
                    (id.to_string(), format!("{}:{}", h.ip, AVALANCHEGO_P2P_PORT)),
                )
            })
        })
        .collect();
    let peers = Arc::new(peers);

    log::info!("configuring devnet bootstrap peers on {} host(s)", hosts.len());
    let app = app.clone();
    let opts = opts.clone();
    results::fan_out(
        hosts,
        |h| h.node_id.clone(),
        move |host| {
            let app = app.clone();
            let remote = Arc::clone(&remote);
            let peers = Arc::clone(&peers);
            let opts = opts.clone();
            async move {
                let own = peers.get(&host.node_id).map(|(id, _)| id.clone());
                let others: Vec<(String, String)> = peers
                    .iter()
                    .filter(|(alias, _)| **alias != host.node_id)
                    .map(|(_, p)| p.clone())
                    .collect();
                let res = match render_node_config(&opts.network, &host.ip, &others) {
                    Ok(cfg) => {
                        push_node_config(&app, remote.as_ref(), &host, &cfg, opts.step_timeout)
                            .await
                    }
                    Err(e) => Err(e),
                };
                (own, res)
            }
        },
    )
    .await
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- bootstrap::test_render_node_config --exact --show-output
#[test]
fn test_render_node_config() {
    let v: serde_json::Value =
        serde_json::from_slice(&render_node_config(&Network::fuji(), "1.2.3.4", &[]).unwrap())
            .unwrap();
    assert_eq!(v["network-id"], "fuji");
    assert_eq!(v["public-ip"], "1.2.3.4");
    assert!(v.get("bootstrap-ids").is_none());

    let peers = vec![
        ("NodeID-A".to_string(), "10.0.0.1:9651".to_string()),
        ("NodeID-B".to_string(), "10.0.0.2:9651".to_string()),
    ];
    let devnet = Network::devnet("http://10.0.0.1:9650");
    let v: serde_json::Value =
        serde_json::from_slice(&render_node_config(&devnet, "10.0.0.3", &peers).unwrap()).unwrap();
    assert_eq!(v["network-id"], "network-1338");
    assert_eq!(v["bootstrap-ids"], "NodeID-A,NodeID-B");
    assert_eq!(v["bootstrap-ips"], "10.0.0.1:9651,10.0.0.2:9651");
}
