use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    errors::Result,
    prompt::{select, Prompter},
};

/// 25 gwei.
pub const DEFAULT_MIN_BASE_FEE: u64 = 25_000_000_000;

pub const LOW_GAS_LIMIT: u64 = 8_000_000;
pub const LOW_TARGET_GAS: u64 = 15_000_000;
pub const MEDIUM_GAS_LIMIT: u64 = 8_000_000;
pub const MEDIUM_TARGET_GAS: u64 = 20_000_000;
pub const HIGH_GAS_LIMIT: u64 = 15_000_000;
pub const HIGH_TARGET_GAS: u64 = 50_000_000;

/// Dynamic fee parameters of a subnet-evm chain.
/// ref. https://docs.avax.network/build/subnet/upgrade/customize-a-subnet#fee-config
#[derive(Debug, Serialize, Deserialize, Eq, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    pub gas_limit: u64,
    pub target_block_rate: u64,
    pub min_base_fee: u64,
    pub target_gas: u64,
    pub base_fee_change_denominator: u64,
    pub min_block_gas_cost: u64,
    pub max_block_gas_cost: u64,
    pub block_gas_cost_step: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self::low()
    }
}

impl FeeConfig {
    fn with_gas(gas_limit: u64, target_gas: u64) -> Self {
        Self {
            gas_limit,
            target_block_rate: 2,
            min_base_fee: DEFAULT_MIN_BASE_FEE,
            target_gas,
            base_fee_change_denominator: 36,
            min_block_gas_cost: 0,
            max_block_gas_cost: 1_000_000,
            block_gas_cost_step: 200_000,
        }
    }

    /// Same values as the C-chain.
    pub fn low() -> Self {
        Self::with_gas(LOW_GAS_LIMIT, LOW_TARGET_GAS)
    }

    pub fn medium() -> Self {
        Self::with_gas(MEDIUM_GAS_LIMIT, MEDIUM_TARGET_GAS)
    }

    pub fn high() -> Self {
        Self::with_gas(HIGH_GAS_LIMIT, HIGH_TARGET_GAS)
    }

    /// Prompts for every field.
    pub fn prompt_custom(prompter: &dyn Prompter) -> Result<Self> {
        Ok(Self {
            gas_limit: prompter.capture_u64("Set gas limit")?,
            target_block_rate: prompter.capture_u64("Set target block rate (seconds)")?,
            min_base_fee: prompter.capture_u64("Set min base fee (wei)")?,
            target_gas: prompter.capture_u64("Set target gas")?,
            base_fee_change_denominator: prompter
                .capture_u64("Set base fee change denominator")?,
            min_block_gas_cost: prompter.capture_u64("Set min block gas cost")?,
            max_block_gas_cost: prompter.capture_u64("Set max block gas cost")?,
            block_gas_cost_step: prompter.capture_u64("Set block gas cost step")?,
        })
    }
}

/// Choices offered by the fee stage.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FeeOption {
    Low,
    Medium,
    High,
    Customize,
    Explain,
    GoBack,
}

pub const FEE_OPTIONS: [FeeOption; 6] = [
    FeeOption::Low,
    FeeOption::Medium,
    FeeOption::High,
    FeeOption::Customize,
    FeeOption::Explain,
    FeeOption::GoBack,
];

impl fmt::Display for FeeOption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeeOption::Low => write!(f, "Low disk use    / Low Throughput    1.5 mil gas/s (C-Chain's setting)"),
            FeeOption::Medium => write!(f, "Medium disk use / Medium Throughput 2 mil   gas/s"),
            FeeOption::High => write!(f, "High disk use   / High Throughput   5 mil   gas/s"),
            FeeOption::Customize => write!(f, "Customize fee config"),
            FeeOption::Explain => write!(f, "Explain the difference"),
            FeeOption::GoBack => write!(f, "Go back to previous step"),
        }
    }
}

pub const FEE_EXPLANATION: &str = "The two gas used parameters determine how much gas the chain \
can process per second and how large blocks may get. Higher throughput needs more disk and \
bandwidth on every validator. When in doubt, keep the low-throughput setting, which matches the C-Chain.";

/// How collected fees are handled.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FeeHandling {
    Burn,
    Reward,
    Explain,
}

impl fmt::Display for FeeHandling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FeeHandling::Burn => write!(f, "No, I want to burn all fees"),
            FeeHandling::Reward => write!(f, "Yes, I want to customize fee distribution"),
            FeeHandling::Explain => write!(f, "Explain"),
        }
    }
}

pub const FEE_HANDLING_EXPLANATION: &str = "Fees are burned by default. Enabling the reward \
manager precompile lets its admins send fees to a reward address or to the block producer.";

pub const DYNAMIC_FEES_EXPLANATION: &str = "The fee manager precompile lets its admins change \
the fee configuration on a live network without a network upgrade.";

/// Asks for one of the presets or a custom config; None means "go back".
pub fn prompt_fee_config(prompter: &dyn Prompter) -> Result<Option<FeeConfig>> {
    loop {
        match select(prompter, "How would you like to set fees", &FEE_OPTIONS)? {
            FeeOption::Low => return Ok(Some(FeeConfig::low())),
            FeeOption::Medium => return Ok(Some(FeeConfig::medium())),
            FeeOption::High => return Ok(Some(FeeConfig::high())),
            FeeOption::Customize => return FeeConfig::prompt_custom(prompter).map(Some),
            FeeOption::Explain => prompter.info(FEE_EXPLANATION),
            FeeOption::GoBack => return Ok(None),
        }
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::fees::test_presets --exact --show-output
#[test]
fn test_presets() {
    let low = FeeConfig::low();
    assert_eq!(low.gas_limit, 8_000_000);
    assert_eq!(low.target_gas, 15_000_000);
    assert_eq!(FeeConfig::medium().target_gas, 20_000_000);
    assert_eq!(FeeConfig::high().gas_limit, 15_000_000);
    assert_eq!(FeeConfig::default(), low);

    let v = serde_json::to_value(&low).unwrap();
    assert_eq!(v["minBaseFee"], 25_000_000_000_u64);
    assert_eq!(v["baseFeeChangeDenominator"], 36);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::fees::test_prompt_explain_then_pick --exact --show-output
#[test]
fn test_prompt_explain_then_pick() {
    use crate::prompt::{Answer, Scripted};

    let p = Scripted::new(vec![
        Answer::choose(FeeOption::Explain),
        Answer::choose(FeeOption::High),
    ]);
    assert_eq!(prompt_fee_config(&p).unwrap(), Some(FeeConfig::high()));
    assert_eq!(p.printed(), vec![FEE_EXPLANATION.to_string()]);

    let p = Scripted::new(vec![Answer::choose(FeeOption::GoBack)]);
    assert_eq!(prompt_fee_config(&p).unwrap(), None);
}
