mod common;

use std::{
    collections::{BTreeMap, BTreeSet},
    path::Path,
    sync::Arc,
    time::Duration,
};

use avalanche_fleet::{
    errors::Error,
    infra::KeyPairPlan,
    network::Kind,
    node::CloudService,
    prompt::Scripted,
    provision::{self, Collaborators, CreateOptions, Orchestrator},
};

use common::{StubCloud, StubInfra, StubIp, StubRemote, StubVersions};

fn fuji_options(cluster_name: &str) -> CreateOptions {
    CreateOptions {
        cluster_name: cluster_name.to_string(),
        use_aws: true,
        regions: vec!["us-east-1".to_string()],
        num_nodes: vec![2],
        authorize_access: true,
        fuji: true,
        ssh_timeout: Duration::from_secs(1),
        user: "alice".to_string(),
        ..Default::default()
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test create -- test_create_fuji_cluster --exact --show-output
#[tokio::test]
async fn test_create_fuji_cluster() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let cloud = Arc::new(StubCloud::default());
    let infra = Arc::new(StubInfra::default());
    let remote = Arc::new(StubRemote::default());
    let c = Collaborators {
        cloud: cloud.clone(),
        infra: infra.clone(),
        ip: Arc::new(StubIp::default()),
        remote: remote.clone(),
        versions: Arc::new(StubVersions),
        prompter: Arc::new(Scripted::new(vec![])),
    };

    let cluster_name = format!("c-{}", random_manager::secure_string(8).to_lowercase());
    let outcome = provision::create_cluster(&app, &c, &fuji_options(&cluster_name), CloudService::Aws)
        .await
        .unwrap();

    assert_eq!(outcome.network.kind, Kind::Fuji);
    assert_eq!(outcome.nodes.len(), 2);
    assert_eq!(outcome.hosts.len(), 2);
    assert!(!outcome.report.has_errors());
    for n in outcome.nodes.iter() {
        assert_eq!(n.region, "us-east-1");
        assert_eq!(n.cloud_service, CloudService::Aws);
        assert!(n.node_identity.as_deref().unwrap().starts_with("NodeID-"));
        assert_eq!(app.load_node_config(&n.node_id).unwrap(), *n);
    }

    // new key pair planned for the region and recorded once
    let applied = infra.applied.lock().unwrap().clone();
    assert_eq!(applied.len(), 1);
    let region = &applied[0].regions[0];
    assert_eq!(region.count, 2);
    assert_eq!(region.node_type, "c5.2xlarge");
    assert!(matches!(region.key_pair, KeyPairPlan::Create { .. }));

    let clusters = app.load_clusters_config().unwrap();
    let cluster = clusters.cluster(&cluster_name).unwrap();
    assert_eq!(cluster.nodes.len(), 2);
    assert_eq!(clusters.key_pairs.len(), 1);
    assert_eq!(
        clusters.key_pairs.get("alice-us-east-1-avalanche-cli-us-east-1"),
        Some(&region.key_pair.cert_path().to_string())
    );
    assert!(Path::new(&app.inventory_path(&cluster_name)).exists());

    // every host got its three staking files
    let uploads = remote
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("upload:") && c.contains("/staking/"))
        .count();
    assert_eq!(uploads, 6);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test create -- test_rerun_keeps_existing_nodes --exact --show-output
#[tokio::test]
async fn test_rerun_keeps_existing_nodes() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let cluster_name = format!("c-{}", random_manager::secure_string(8).to_lowercase());
    let remote = Arc::new(StubRemote::default());
    let collaborators = |infra: StubInfra| Collaborators {
        cloud: Arc::new(StubCloud::default()),
        infra: Arc::new(infra),
        ip: Arc::new(StubIp::default()),
        remote: remote.clone(),
        versions: Arc::new(StubVersions),
        prompter: Arc::new(Scripted::new(vec![])),
    };

    let first = provision::create_cluster(
        &app,
        &collaborators(StubInfra::default()),
        &fuji_options(&cluster_name),
        CloudService::Aws,
    )
    .await
    .unwrap();
    let kept = first.nodes[0].clone();
    let uploads_after_first = remote.calls().len();

    // second run lists an instance of the first one next to a new instance
    let infra = StubInfra {
        earlier: BTreeMap::from([("us-east-1".to_string(), vec![kept.node_id.clone()])]),
        id_offset: 2,
        ..Default::default()
    };
    let opts = CreateOptions {
        num_nodes: vec![1],
        ..fuji_options(&cluster_name)
    };
    let second = provision::create_cluster(&app, &collaborators(infra), &opts, CloudService::Aws)
        .await
        .unwrap();

    assert_eq!(second.nodes.len(), 1);
    assert_eq!(second.nodes[0].node_id, "i-us-east-1-2");
    assert_eq!(second.hosts.len(), 1);
    assert!(!second.report.has_errors());

    // the earlier node was neither re-registered nor re-bootstrapped
    assert_eq!(app.load_node_config(&kept.node_id).unwrap(), kept);
    let new_calls = &remote.calls()[uploads_after_first..];
    assert!(new_calls.iter().all(|c| !c.contains(&kept.node_id)));

    let clusters = app.load_clusters_config().unwrap();
    assert_eq!(clusters.cluster(&cluster_name).unwrap().nodes.len(), 3);
    let inventory = avalanche_fleet::inventory::read(&app.inventory_path(&cluster_name)).unwrap();
    assert_eq!(inventory.len(), 3);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test create -- test_create_rejects_mismatch_before_any_call --exact --show-output
#[tokio::test]
async fn test_create_rejects_mismatch_before_any_call() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let cloud = Arc::new(StubCloud::default());
    let infra = Arc::new(StubInfra::default());
    let ip = Arc::new(StubIp::default());
    let remote = Arc::new(StubRemote::default());
    let c = Collaborators {
        cloud: cloud.clone(),
        infra: infra.clone(),
        ip: ip.clone(),
        remote: remote.clone(),
        versions: Arc::new(StubVersions),
        prompter: Arc::new(Scripted::new(vec![])),
    };

    let opts = CreateOptions {
        regions: vec!["us-east-1".to_string(), "us-west-2".to_string()],
        num_nodes: vec![1],
        ..fuji_options("mismatch")
    };
    let err = provision::create_cluster(&app, &c, &opts, CloudService::Aws)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RegionNodeCountMismatch {
            regions: 2,
            num_nodes: 1
        }
    ));
    assert!(err.is_configuration());

    assert!(cloud.calls().is_empty());
    assert!(infra.calls().is_empty());
    assert!(ip.calls.lock().unwrap().is_empty());
    assert!(remote.calls().is_empty());
    assert!(!Path::new(&app.clusters_config_path()).exists());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test create -- test_failed_apply_lists_unstopped_instances --exact --show-output
#[tokio::test]
async fn test_failed_apply_lists_unstopped_instances() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let mut created = BTreeMap::new();
    created.insert(
        "us-east-1".to_string(),
        vec!["i-a".to_string(), "i-b".to_string(), "i-c".to_string()],
    );
    let cloud = StubCloud {
        fail_stop: BTreeSet::from(["i-a".to_string(), "i-c".to_string()]),
        ..Default::default()
    };
    let infra = StubInfra {
        fail_with_created: Some(created),
        ..Default::default()
    };
    let ip = StubIp::default();
    let orchestrator = Orchestrator {
        app: &app,
        cloud: &cloud,
        infra: &infra,
        ip: &ip,
        prompter: Arc::new(Scripted::new(vec![])),
    };

    let err = orchestrator
        .provision(&fuji_options("teardown"), CloudService::Aws)
        .await
        .unwrap_err();
    match err {
        Error::TeardownIncomplete { failed, cause } => {
            assert_eq!(
                failed.keys().cloned().collect::<Vec<_>>(),
                vec!["i-a".to_string(), "i-c".to_string()]
            );
            assert!(cause.contains("quota exceeded"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    // every created instance was attempted, failed ones included
    let stops: Vec<String> = cloud
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("stop:"))
        .collect();
    assert_eq!(stops.len(), 3);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test create -- test_failed_apply_with_clean_teardown --exact --show-output
#[tokio::test]
async fn test_failed_apply_with_clean_teardown() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let mut created = BTreeMap::new();
    created.insert("us-east-1".to_string(), vec!["i-a".to_string()]);
    let cloud = StubCloud::default();
    let infra = StubInfra {
        fail_with_created: Some(created),
        ..Default::default()
    };
    let ip = StubIp::default();
    let orchestrator = Orchestrator {
        app: &app,
        cloud: &cloud,
        infra: &infra,
        ip: &ip,
        prompter: Arc::new(Scripted::new(vec![])),
    };

    let err = orchestrator
        .provision(&fuji_options("clean"), CloudService::Aws)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Infra { message } if message.contains("quota exceeded")));
    assert_eq!(
        cloud.calls().iter().filter(|c| c.starts_with("stop:")).count(),
        1
    );
    assert!(!Path::new(&app.clusters_config_path()).exists());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test create -- test_key_pair_rename --exact --show-output
#[tokio::test]
async fn test_key_pair_rename() {
    use avalanche_fleet::prompt::Answer;

    common::init_logger();
    let (_dir, app) = common::temp_app();

    // in the cloud but not local: operator picks a new name
    let cloud = StubCloud {
        key_pairs: BTreeSet::from(["taken".to_string()]),
        ..Default::default()
    };
    let infra = StubInfra::default();
    let ip = StubIp::default();
    let prompter = Arc::new(Scripted::new(vec![Answer::Text("fresh".to_string())]));
    let orchestrator = Orchestrator {
        app: &app,
        cloud: &cloud,
        infra: &infra,
        ip: &ip,
        prompter: prompter.clone(),
    };

    let plan = orchestrator.key_pair_plan("us-east-1", "taken").await.unwrap();
    assert_eq!(plan.name(), "fresh");
    assert!(matches!(plan, KeyPairPlan::Create { .. }));
    assert_eq!(prompter.remaining(), 0);
    assert_eq!(prompter.printed().len(), 1);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test create -- test_create_devnet_cluster --exact --show-output
#[tokio::test]
async fn test_create_devnet_cluster() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let remote = Arc::new(StubRemote::default());
    let c = Collaborators {
        cloud: Arc::new(StubCloud::default()),
        infra: Arc::new(StubInfra::default()),
        ip: Arc::new(StubIp::default()),
        remote: remote.clone(),
        versions: Arc::new(StubVersions),
        prompter: Arc::new(Scripted::new(vec![])),
    };
    let opts = CreateOptions {
        fuji: false,
        devnet: true,
        num_nodes: vec![3],
        use_static_ip: true,
        ..fuji_options("dev")
    };
    let outcome = provision::create_cluster(&app, &c, &opts, CloudService::Aws)
        .await
        .unwrap();

    assert_eq!(outcome.network.kind, Kind::Devnet);
    assert_eq!(outcome.network.endpoint, "http://192.0.2.1:9650");
    assert!(!outcome.report.has_errors());
    for h in outcome.hosts.iter() {
        assert!(outcome.report.value(&h.node_id).unwrap().starts_with("NodeID-"));
    }
    for n in outcome.nodes.iter() {
        assert!(n.use_static_ip);
        assert!(n.elastic_ip.starts_with("192.0.2."));
    }

    // node config pushed once while bootstrapping and once with the peers
    let pushes = remote
        .calls()
        .into_iter()
        .filter(|c| c.ends_with("/configs/node.json"))
        .count();
    assert_eq!(pushes, 6);
}

/// Answers yes and remembers which thread asked.
#[derive(Default)]
struct ThreadRecorder {
    threads: std::sync::Mutex<Vec<std::thread::ThreadId>>,
}

impl avalanche_fleet::prompt::Prompter for ThreadRecorder {
    fn capture_index(&self, _: &str, _: &[String]) -> avalanche_fleet::errors::Result<usize> {
        Ok(0)
    }
    fn capture_string(&self, _: &str) -> avalanche_fleet::errors::Result<String> {
        Ok(String::new())
    }
    fn capture_u64(&self, _: &str) -> avalanche_fleet::errors::Result<u64> {
        Ok(0)
    }
    fn capture_yes_no(&self, _: &str) -> avalanche_fleet::errors::Result<bool> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        Ok(true)
    }
    fn info(&self, _: &str) {}
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test create -- test_authorization_prompt_leaves_runtime_thread --exact --show-output
#[tokio::test]
async fn test_authorization_prompt_leaves_runtime_thread() {
    common::init_logger();

    let recorder = Arc::new(ThreadRecorder::default());
    let prompter: Arc<dyn avalanche_fleet::prompt::Prompter> = recorder.clone();
    let mut opts = fuji_options("auth");
    opts.authorize_access = false;

    provision::ensure_authorized(&opts, &prompter).await.unwrap();

    let threads = recorder.threads.lock().unwrap().clone();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], std::thread::current().id());
}
