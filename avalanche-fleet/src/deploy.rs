//! Deploys a subnet onto a Devnet cluster through the CLI built on its first node.
use std::{
    fs::{self, File},
    io::Write,
    path::Path,
    sync::Arc,
    time::Duration,
};

use serde_json::{json, Value};

use crate::{
    app::App,
    cloud::AVALANCHEGO_API_PORT,
    errors::{Error, Result},
    inventory,
    network::Kind,
    remote::Remote,
    results::{self, Report},
    scripts,
    sidecar::Sidecar,
    status,
};

pub const EXPORT_FILE: &str = "export.json";
pub const REMOTE_EXPORT_PATH: &str = "/home/ubuntu/subnet-export.json";

pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub cluster_name: String,
    pub subnet_name: String,
    pub timeout: Duration,
}

/// Sidecar and genesis as one document, the format "subnet import file" reads.
pub fn export_subnet(app: &App, subnet_name: &str) -> Result<Value> {
    let sc = Sidecar::load(&app.sidecar_path(subnet_name))?;
    let genesis_path = app.genesis_path(subnet_name);
    if !Path::new(&genesis_path).exists() {
        return Err(Error::NotFound {
            message: format!("genesis of subnet '{}'", subnet_name),
        });
    }
    let genesis = fs::read(&genesis_path)?;
    Ok(json!({
        "sidecar": sc,
        "genesis": String::from_utf8_lossy(&genesis),
    }))
}

/// Checks the cluster, its readiness and the subnet, then runs the deployment.
/// The returned report holds the outcome on the deploying host.
pub async fn deploy(app: &App, remote: Arc<dyn Remote>, opts: &DeployOptions) -> Result<Report> {
    let clusters = app.load_clusters_config()?;
    let cluster = clusters.cluster(&opts.cluster_name)?;
    if cluster.network.kind != Kind::Devnet {
        return Err(Error::other(format!(
            "cluster '{}' is on {}, only Devnet clusters can be deployed to",
            opts.cluster_name, cluster.network.kind
        )));
    }
    if !app.subnet_exists(&opts.subnet_name) {
        return Err(Error::NotFound {
            message: format!("subnet '{}'", opts.subnet_name),
        });
    }

    let hosts = inventory::read(&app.inventory_path(&opts.cluster_name))?;
    let first = hosts
        .first()
        .cloned()
        .ok_or_else(|| Error::other(format!("cluster '{}' has no hosts", opts.cluster_name)))?;

    let shared = Arc::clone(&remote);
    let readiness = results::fan_out(
        hosts,
        |h| h.node_id.clone(),
        move |host| {
            let remote = Arc::clone(&shared);
            async move {
                let res =
                    match status::is_bootstrapped(remote.as_ref(), &host, status::DEFAULT_QUERY_TIMEOUT)
                        .await
                    {
                        Ok(true) => Ok(()),
                        Ok(false) => Err(Error::remote(&host.node_id, "not bootstrapped yet")),
                        Err(e) => Err(e),
                    };
                (None, res)
            }
        },
    )
    .await;
    if let Some(e) = readiness.to_error() {
        log::warn!("nodes not ready: {:?}", readiness.failed_nodes());
        return Err(e);
    }

    let export = export_subnet(app, &opts.subnet_name)?;
    let local = Path::new(&app.subnet_dir(&opts.subnet_name))
        .join(EXPORT_FILE)
        .display()
        .to_string();
    let mut f = File::create(&local)?;
    f.write_all(&serde_json::to_vec_pretty(&export)?)?;

    let endpoint = format!("http://{}:{}", first.ip, AVALANCHEGO_API_PORT);
    let script = scripts::deploy_subnet(&opts.subnet_name, REMOTE_EXPORT_PATH, &endpoint)?;
    let timeout = opts.timeout;
    log::info!("deploying '{}' from {}", opts.subnet_name, first.node_id);
    Ok(results::fan_out(
        vec![first],
        |h| h.node_id.clone(),
        move |host| {
            let remote = Arc::clone(&remote);
            let local = local.clone();
            let script = script.clone();
            async move {
                let res = async {
                    remote.upload(&host, &local, REMOTE_EXPORT_PATH, timeout).await?;
                    remote.run(&host, &script, timeout).await?;
                    Ok::<(), Error>(())
                }
                .await;
                (None, res)
            }
        },
    )
    .await)
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- deploy::test_export_subnet --exact --show-output
#[test]
fn test_export_subnet() {
    use crate::sidecar::VmType;

    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let app = App::new(dir.path());
    assert!(export_subnet(&app, "s1").is_err());

    let sc = Sidecar::new("s1", VmType::SubnetEvm);
    sc.sync(&app.sidecar_path("s1")).unwrap();
    assert!(matches!(export_subnet(&app, "s1"), Err(Error::NotFound { .. })));

    fs::write(app.genesis_path("s1"), br#"{"config":{"chainId":1}}"#).unwrap();
    let v = export_subnet(&app, "s1").unwrap();
    assert_eq!(v["sidecar"]["name"], "s1");
    assert!(v["genesis"].as_str().unwrap().contains("chainId"));
}
