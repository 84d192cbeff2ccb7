mod common;

use std::fs;

use avalanche_fleet::{
    genesis::{evm, EWOQ_ADDRESS},
    prompt::{Answer, Scripted},
    sidecar::{Sidecar, VmType},
    subnet::{self, SubnetCreateOptions},
};

use common::StubVersions;

/// RUST_LOG=debug cargo test --package avalanche-fleet --test subnet -- test_create_subnet_evm_defaults --exact --show-output
#[tokio::test]
async fn test_create_subnet_evm_defaults() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let name = format!("s{}", random_manager::secure_string(6).to_lowercase());
    let opts = SubnetCreateOptions {
        name: name.clone(),
        use_evm: true,
        evm_defaults: true,
        ..Default::default()
    };
    // only the descriptors are asked for
    let prompter = Scripted::new(vec![
        Answer::Number(888),
        Answer::Text("TEST".to_string()),
    ]);
    let sc = subnet::create(&app, &opts, &prompter, &StubVersions, 1_700_000_000)
        .await
        .unwrap();
    assert_eq!(prompter.remaining(), 0);
    assert_eq!(prompter.asked().len(), 2);

    assert_eq!(sc.name, name);
    assert_eq!(sc.vm, VmType::SubnetEvm);
    assert_eq!(sc.token_symbol, "TEST");
    assert_eq!(sc.vm_version, "v1.10.11");
    assert!(sc.teleporter_ready);
    assert_eq!(Sidecar::load(&app.sidecar_path(&name)).unwrap(), sc);

    let bytes = fs::read(app.genesis_path(&name)).unwrap();
    assert_eq!(evm::chain_id(&bytes).unwrap(), 888);
    let g: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    let config = &g["config"];
    assert_eq!(config["feeConfig"]["gasLimit"], 8_000_000);
    assert!(config.get("warpConfig").is_some());
    for key in [
        "contractNativeMinterConfig",
        "feeManagerConfig",
        "rewardManagerConfig",
        "txAllowListConfig",
        "contractDeployerAllowListConfig",
    ] {
        assert!(config.get(key).is_none(), "{key}");
    }

    let ewoq = EWOQ_ADDRESS.trim_start_matches("0x").to_lowercase();
    assert!(g["alloc"].get(&ewoq).is_some());
    // teleporter deployer is prefunded as well
    assert_eq!(g["alloc"].as_object().unwrap().len(), 2);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --test subnet -- test_create_existing_needs_force --exact --show-output
#[tokio::test]
async fn test_create_existing_needs_force() {
    common::init_logger();
    let (_dir, app) = common::temp_app();

    let opts = SubnetCreateOptions {
        name: "dup".to_string(),
        use_evm: true,
        evm_chain_id: Some(1),
        evm_token: Some("DUP".to_string()),
        evm_defaults: true,
        ..Default::default()
    };
    subnet::create(&app, &opts, &Scripted::new(vec![]), &StubVersions, 0)
        .await
        .unwrap();
    assert!(subnet::create(&app, &opts, &Scripted::new(vec![]), &StubVersions, 0)
        .await
        .is_err());

    let forced = SubnetCreateOptions {
        force: true,
        evm_chain_id: Some(2),
        ..opts
    };
    subnet::create(&app, &forced, &Scripted::new(vec![]), &StubVersions, 0)
        .await
        .unwrap();
    let bytes = fs::read(app.genesis_path("dup")).unwrap();
    assert_eq!(evm::chain_id(&bytes).unwrap(), 2);
}
