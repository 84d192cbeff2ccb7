mod common;

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use avalanche_fleet::{
    bootstrap::{self, BootstrapOptions},
    errors::Error,
    network::Network,
    node::{CloudService, NodeConfig, Role},
    remote::Host,
    waiter,
};

use common::StubRemote;

fn hosts(n: usize) -> Vec<Host> {
    (0..n)
        .map(|i| {
            Host::new(
                CloudService::Aws,
                &format!("i-{i}"),
                &format!("10.0.0.{}", i + 1),
                "/tmp/kp.pem",
            )
        })
        .collect()
}

fn node_config(instance_id: &str) -> NodeConfig {
    NodeConfig {
        node_id: instance_id.to_string(),
        region: "us-east-1".to_string(),
        ami: "ami-test".to_string(),
        key_pair: "kp".to_string(),
        cert_path: "/tmp/kp.pem".to_string(),
        security_group: "sg".to_string(),
        elastic_ip: String::new(),
        cloud_service: CloudService::Aws,
        use_static_ip: false,
        node_identity: None,
        roles: vec![Role::Validator],
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test fleet -- test_bootstrap_reports_identity_on_failure --exact --show-output
#[tokio::test]
async fn test_bootstrap_reports_identity_on_failure() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let hosts = hosts(3);
    for h in hosts.iter() {
        app.write_node_config(&node_config(h.instance_id())).unwrap();
    }
    let broken = hosts[1].node_id.clone();
    let remote = Arc::new(StubRemote {
        fail_upload: BTreeSet::from([broken.clone()]),
        ..Default::default()
    });

    let opts = BootstrapOptions {
        avalanchego_version: "v1.10.11".to_string(),
        cli_version: "main".to_string(),
        network: Network::fuji(),
        step_timeout: Duration::from_secs(5),
    };
    let report = bootstrap::bootstrap(&app, remote.clone(), hosts.clone(), &opts).await;

    assert_eq!(report.len(), 3);
    assert_eq!(report.failed_nodes(), vec![broken.clone()]);
    assert!(matches!(report.error(&broken), Some(Error::Remote { .. })));

    let mut identities = BTreeSet::new();
    for h in hosts.iter() {
        let id = report.value(&h.node_id).unwrap();
        assert!(id.starts_with("NodeID-"));
        identities.insert(id.to_string());

        // recorded before the failing upload
        let cfg = app.load_node_config(h.instance_id()).unwrap();
        assert_eq!(cfg.node_identity.as_deref(), Some(id));
    }
    assert_eq!(identities.len(), 3);

    // the broken host stopped at its first upload
    let runs_on_broken = remote
        .calls()
        .into_iter()
        .filter(|c| *c == format!("run:{broken}"))
        .count();
    assert_eq!(runs_on_broken, 1);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test fleet -- test_bootstrap_unreachable_host --exact --show-output
#[tokio::test]
async fn test_bootstrap_unreachable_host() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let hosts = hosts(2);
    for h in hosts.iter() {
        app.write_node_config(&node_config(h.instance_id())).unwrap();
    }
    let gone = hosts[0].node_id.clone();
    let remote = Arc::new(StubRemote {
        unreachable: BTreeSet::from([gone.clone()]),
        ..Default::default()
    });
    let opts = BootstrapOptions {
        avalanchego_version: "v1.10.11".to_string(),
        cli_version: "main".to_string(),
        network: Network::fuji(),
        step_timeout: Duration::from_secs(5),
    };
    let report = bootstrap::bootstrap(&app, remote, hosts, &opts).await;

    // no identity generated for a host that was never reached
    assert_eq!(report.failed_nodes(), vec![gone.clone()]);
    assert!(report.value(&gone).is_none());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test fleet -- test_wait_for_hosts --exact --show-output
#[tokio::test]
async fn test_wait_for_hosts() {
    common::init_logger();

    let hosts = hosts(4);
    let unreachable = BTreeSet::from([hosts[0].node_id.clone(), hosts[3].node_id.clone()]);
    let remote = Arc::new(StubRemote {
        unreachable: unreachable.clone(),
        ..Default::default()
    });

    let report = waiter::wait_for_hosts(
        remote.clone(),
        hosts.clone(),
        Duration::from_millis(300),
        Duration::from_millis(50),
    )
    .await;

    assert_eq!(report.len(), 4);
    assert_eq!(
        report.failed_nodes().into_iter().collect::<BTreeSet<_>>(),
        unreachable
    );
    for alias in unreachable.iter() {
        let msg = report.error(alias).unwrap().to_string();
        assert!(msg.contains("not reachable"), "{msg}");
    }

    // reachable hosts are connected once, the others retried
    let calls = remote.calls();
    let count = |alias: &str| calls.iter().filter(|c| **c == format!("connect:{alias}")).count();
    assert_eq!(count(&hosts[1].node_id), 1);
    assert!(count(&hosts[0].node_id) > 1);
}
