//! Subnet-EVM genesis configuration: parameter bundle, interactive builder and serializer.
pub mod allowlist;
pub mod builder;
pub mod evm;
pub mod fees;

use std::collections::BTreeMap;

use primitive_types::U256;

use crate::prompt::one_token;

pub use allowlist::AllowList;
pub use builder::{Builder, BuilderOptions, Stage};
pub use fees::FeeConfig;

/// Well-known pre-funded test account ("ewoq").
pub const EWOQ_ADDRESS: &str = "0x8db97C7cEcE249c2b98bDC0226Cc4C2A57BF52FC";

/// Address that deploys the teleporter messenger contract.
pub const TELEPORTER_DEPLOYER_ADDRESS: &str = "0x618FEdD9A45a8C456812ecAAE70C671c6249DfaC";
pub const TELEPORTER_KEY_NAME: &str = "cli-teleporter-deployer";
pub const TELEPORTER_VERSION: &str = "v1.0.0";

/// Whole tokens airdropped to the default address.
pub const DEFAULT_AIRDROP_TOKENS: u64 = 1_000_000;

/// Whole tokens given to the teleporter deployer so it can pay for deployment.
pub const TELEPORTER_PREFUND_TOKENS: u64 = 600;

pub fn default_airdrop_amount() -> U256 {
    U256::from(DEFAULT_AIRDROP_TOKENS) * one_token()
}

pub fn teleporter_prefund_amount() -> U256 {
    U256::from(TELEPORTER_PREFUND_TOKENS) * one_token()
}

/// Precompiled contracts enabled at genesis.
/// Warp is on by default; the rest are optional and gated by an allow list.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Precompiles {
    pub warp: bool,
    pub native_minter: Option<AllowList>,
    pub fee_manager: Option<AllowList>,
    pub reward_manager: Option<AllowList>,
    pub tx_allow_list: Option<AllowList>,
    pub contract_deployer_allow_list: Option<AllowList>,
}

impl Precompiles {
    /// Number of enabled precompiles other than warp.
    pub fn enabled_optional(&self) -> usize {
        [
            &self.native_minter,
            &self.fee_manager,
            &self.reward_manager,
            &self.tx_allow_list,
            &self.contract_deployer_allow_list,
        ]
        .iter()
        .filter(|p| p.is_some())
        .count()
    }
}

/// Everything collected by the builder.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct GenesisParams {
    pub chain_id: u64,
    pub token_symbol: String,
    pub external_gas_token: bool,
    pub fee_config: FeeConfig,
    /// Address ("0x"-prefixed) to balance in wei.
    pub allocation: BTreeMap<String, U256>,
    pub precompiles: Precompiles,
    pub teleporter: bool,
}

impl GenesisParams {
    /// Sets the balance of the address and returns the one it replaces.
    /// Addresses that differ only in letter case share one entry.
    pub fn allocate(&mut self, address: &str, balance: U256) -> Option<U256> {
        self.allocation.insert(allocation_key(address), balance)
    }
}

/// Lowercase "0x"-prefixed key of an allocation entry.
pub fn allocation_key(address: &str) -> String {
    let hex = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    format!("0x{}", hex.to_lowercase())
}
