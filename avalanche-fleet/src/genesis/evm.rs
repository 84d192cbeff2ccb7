use primitive_types::U256;
use serde_json::{json, Map, Value};

use crate::{
    errors::{Error, Result},
    genesis::{
        teleporter_prefund_amount, AllowList, GenesisParams, TELEPORTER_DEPLOYER_ADDRESS,
    },
};

/// Renders the bundle as a subnet-evm genesis document.
/// ref. https://github.com/ava-labs/subnet-evm/blob/master/core/genesis.go
pub fn to_genesis_json(params: &GenesisParams, timestamp: u64) -> Result<Vec<u8>> {
    let mut config = Map::new();
    config.insert("chainId".to_string(), json!(params.chain_id));
    config.insert(
        "feeConfig".to_string(),
        serde_json::to_value(&params.fee_config)?,
    );

    let p = &params.precompiles;
    if p.warp {
        config.insert(
            "warpConfig".to_string(),
            json!({ "blockTimestamp": timestamp, "quorumNumerator": 67 }),
        );
    }
    for (key, list) in [
        ("contractNativeMinterConfig", &p.native_minter),
        ("feeManagerConfig", &p.fee_manager),
        ("rewardManagerConfig", &p.reward_manager),
        ("txAllowListConfig", &p.tx_allow_list),
        ("contractDeployerAllowListConfig", &p.contract_deployer_allow_list),
    ] {
        if let Some(list) = list {
            config.insert(key.to_string(), precompile_config(list, timestamp)?);
        }
    }

    let mut alloc = Map::new();
    for (addr, balance) in params.allocation.iter() {
        alloc.insert(alloc_key(addr), json!({ "balance": format!("{:#x}", balance) }));
    }
    if params.teleporter {
        alloc
            .entry(alloc_key(TELEPORTER_DEPLOYER_ADDRESS))
            .or_insert_with(|| json!({ "balance": format!("{:#x}", teleporter_prefund_amount()) }));
    }

    let genesis = json!({
        "config": Value::Object(config),
        "nonce": "0x0",
        "timestamp": format!("{:#x}", timestamp),
        "extraData": "0x",
        "gasLimit": format!("{:#x}", params.fee_config.gas_limit),
        "difficulty": "0x0",
        "mixHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
        "coinbase": "0x0000000000000000000000000000000000000000",
        "alloc": Value::Object(alloc),
        "airdropHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
        "airdropAmount": null,
        "number": "0x0",
        "gasUsed": "0x0",
        "parentHash": "0x0000000000000000000000000000000000000000000000000000000000000000",
        "baseFeePerGas": null,
    });
    Ok(serde_json::to_vec_pretty(&genesis)?)
}

fn precompile_config(list: &AllowList, timestamp: u64) -> Result<Value> {
    let mut v = serde_json::to_value(list)?;
    if let Value::Object(m) = &mut v {
        m.insert("blockTimestamp".to_string(), json!(timestamp));
    }
    Ok(v)
}

fn alloc_key(addr: &str) -> String {
    addr.trim_start_matches("0x")
        .trim_start_matches("0X")
        .to_lowercase()
}

fn format_err(message: impl Into<String>) -> Error {
    Error::GenesisFormat {
        message: message.into(),
    }
}

fn parse_object(bytes: &[u8]) -> Result<Map<String, Value>> {
    let v: Value =
        serde_json::from_slice(bytes).map_err(|e| format_err(format!("not valid JSON: {e}")))?;
    match v {
        Value::Object(m) => Ok(m),
        _ => Err(format_err("top-level value must be an object")),
    }
}

/// Checks that the document looks like a subnet-evm genesis.
pub fn validate_evm_genesis(bytes: &[u8]) -> Result<()> {
    let m = parse_object(bytes)?;
    let config = match m.get("config") {
        Some(Value::Object(c)) => c,
        Some(_) => return Err(format_err("'config' must be an object")),
        None => return Err(format_err("missing 'config'")),
    };
    match config.get("chainId") {
        Some(v) if v.is_u64() => {}
        Some(_) => return Err(format_err("'config.chainId' must be a positive integer")),
        None => return Err(format_err("missing 'config.chainId'")),
    }
    match m.get("alloc") {
        None | Some(Value::Object(_)) => Ok(()),
        Some(_) => Err(format_err("'alloc' must be an object")),
    }
}

/// Returns the chain ID of a valid subnet-evm genesis.
pub fn chain_id(bytes: &[u8]) -> Result<u64> {
    validate_evm_genesis(bytes)?;
    let m = parse_object(bytes)?;
    m.get("config")
        .and_then(|c| c.get("chainId"))
        .and_then(Value::as_u64)
        .ok_or_else(|| format_err("missing 'config.chainId'"))
}

/// Sets the balance of one address in an existing genesis document.
pub fn add_prefunded_address(bytes: &[u8], address: &str, balance: U256) -> Result<Vec<u8>> {
    validate_evm_genesis(bytes)?;
    let mut m = parse_object(bytes)?;
    let alloc = m
        .entry("alloc".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(alloc) = alloc {
        alloc.insert(
            alloc_key(address),
            json!({ "balance": format!("{:#x}", balance) }),
        );
    }
    Ok(serde_json::to_vec_pretty(&Value::Object(m))?)
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::evm::test_to_genesis_json --exact --show-output
#[test]
fn test_to_genesis_json() {
    use crate::genesis::{default_airdrop_amount, FeeConfig, Precompiles, EWOQ_ADDRESS};

    let mut params = GenesisParams {
        chain_id: 12345,
        token_symbol: "TEST".to_string(),
        fee_config: FeeConfig::low(),
        precompiles: Precompiles {
            warp: true,
            native_minter: Some(AllowList {
                admin_addresses: vec![EWOQ_ADDRESS.to_string()],
                ..Default::default()
            }),
            ..Default::default()
        },
        teleporter: true,
        ..Default::default()
    };
    params
        .allocation
        .insert(EWOQ_ADDRESS.to_string(), default_airdrop_amount());

    let b = to_genesis_json(&params, 1_700_000_000).unwrap();
    validate_evm_genesis(&b).unwrap();
    assert_eq!(chain_id(&b).unwrap(), 12345);

    let v: Value = serde_json::from_slice(&b).unwrap();
    assert_eq!(v["config"]["feeConfig"]["gasLimit"], 8_000_000);
    assert_eq!(v["config"]["warpConfig"]["blockTimestamp"], 1_700_000_000_u64);
    assert_eq!(
        v["config"]["contractNativeMinterConfig"]["adminAddresses"][0],
        EWOQ_ADDRESS
    );
    assert!(v["config"].get("txAllowListConfig").is_none());
    assert_eq!(
        v["alloc"]["8db97c7cece249c2b98bdc0226cc4c2a57bf52fc"]["balance"],
        "0xd3c21bcecceda1000000"
    );
    assert!(v["alloc"]
        .get("618fedd9a45a8c456812ecaae70c671c6249dfac")
        .is_some());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::evm::test_validate_evm_genesis --exact --show-output
#[test]
fn test_validate_evm_genesis() {
    for bad in [
        &b"not json"[..],
        &b"[1, 2]"[..],
        &b"{\"alloc\": {}}"[..],
        &b"{\"config\": 1}"[..],
        &b"{\"config\": {}}"[..],
        &b"{\"config\": {\"chainId\": 1}, \"alloc\": []}"[..],
    ] {
        assert!(
            matches!(validate_evm_genesis(bad), Err(Error::GenesisFormat { .. })),
            "{}",
            String::from_utf8_lossy(bad)
        );
    }
    assert!(validate_evm_genesis(b"{\"config\": {\"chainId\": 1}}").is_ok());

    let b = add_prefunded_address(
        b"{\"config\": {\"chainId\": 1}}",
        TELEPORTER_DEPLOYER_ADDRESS,
        U256::from(255),
    )
    .unwrap();
    let v: Value = serde_json::from_slice(&b).unwrap();
    assert_eq!(
        v["alloc"]["618fedd9a45a8c456812ecaae70c671c6249dfac"]["balance"],
        "0xff"
    );
}
