use std::{collections::BTreeMap, fmt};

use crate::{
    errors::{Error, Result},
    genesis::{
        allowlist::{ensure_admins_have_balance, prompt_allow_list},
        default_airdrop_amount,
        fees::{
            prompt_fee_config, FeeConfig, FeeHandling, DYNAMIC_FEES_EXPLANATION,
            FEE_HANDLING_EXPLANATION,
        },
        GenesisParams, Precompiles, EWOQ_ADDRESS,
    },
    prompt::{select, yes_no_explain, ListDecision, Prompter, LIST_DECISIONS},
    statemachine::{Direction, StateMachine},
};

/// Builder stages, in order.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Stage {
    Descriptors,
    Fee,
    Airdrop,
    Precompiles,
}

pub const STAGES: [Stage; 4] = [
    Stage::Descriptors,
    Stage::Fee,
    Stage::Airdrop,
    Stage::Precompiles,
];

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Stage::Descriptors => write!(f, "descriptors"),
            Stage::Fee => write!(f, "fee"),
            Stage::Airdrop => write!(f, "airdrop"),
            Stage::Precompiles => write!(f, "precompiles"),
        }
    }
}

/// Values fixed by flags before the builder runs.
#[derive(Debug, Clone, Default)]
pub struct BuilderOptions {
    pub chain_id: Option<u64>,
    pub token_symbol: Option<String>,
    /// Skips the fee, airdrop and precompile prompts.
    pub use_defaults: bool,
    pub use_warp: bool,
    /// None prompts, unless forced by an external gas token or defaults.
    pub teleporter: Option<bool>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum GasToken {
    Native,
    External,
    Explain,
}

impl fmt::Display for GasToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GasToken::Native => write!(f, "The blockchain's native token"),
            GasToken::External => write!(f, "A token from another blockchain (bridged)"),
            GasToken::Explain => write!(f, "Explain the difference"),
        }
    }
}

const GAS_TOKEN_EXPLANATION: &str = "A native token is minted by the blockchain itself. \
An external token lives on another blockchain and is bridged in through teleporter, \
so choosing it always enables interoperability.";

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum AirdropOption {
    Default,
    Customize,
    GoBack,
}

impl fmt::Display for AirdropOption {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AirdropOption::Default => {
                write!(f, "Airdrop 1 million tokens to the default address (do not use in production)")
            }
            AirdropOption::Customize => write!(f, "Customize your airdrop"),
            AirdropOption::GoBack => write!(f, "Go back to previous step"),
        }
    }
}

const NATIVE_MINTER_EXPLANATION: &str =
    "The native minter precompile lets allow-listed addresses mint new native tokens.";
const TX_ALLOW_LIST_EXPLANATION: &str =
    "The transaction allow list restricts which addresses may submit transactions.";
const DEPLOYER_ALLOW_LIST_EXPLANATION: &str =
    "The contract deployer allow list restricts which addresses may deploy smart contracts.";
const TELEPORTER_EXPLANATION: &str = "Teleporter lets this blockchain exchange messages \
with other blockchains. It requires warp and prefunds the teleporter deployer.";

/// Walks the genesis stages, letting the operator step back to change earlier answers.
pub struct Builder<'a> {
    prompter: &'a dyn Prompter,
    opts: BuilderOptions,
    params: GenesisParams,
}

impl<'a> Builder<'a> {
    pub fn new(prompter: &'a dyn Prompter, opts: BuilderOptions) -> Self {
        Self {
            prompter,
            opts,
            params: GenesisParams::default(),
        }
    }

    /// Runs every stage and returns the collected bundle.
    /// Any prompt failure aborts the whole build.
    pub fn build(mut self) -> Result<GenesisParams> {
        let mut sm = StateMachine::new(STAGES.to_vec())?;
        sm.run(|stage| match stage {
            Stage::Descriptors => self.descriptors(),
            Stage::Fee => self.fee(),
            Stage::Airdrop => self.airdrop(),
            Stage::Precompiles => self.precompiles(),
        })?;

        self.params.teleporter = self.resolve_teleporter()?;
        if self.params.teleporter && !self.params.precompiles.warp {
            return Err(Error::flag_conflict(
                "warp should be enabled for teleporter to work",
            ));
        }
        Ok(self.params)
    }

    fn descriptors(&mut self) -> Result<Direction> {
        self.params.chain_id = match self.opts.chain_id {
            Some(0) => return Err(Error::other("chain ID must be greater than zero")),
            Some(id) => id,
            None => loop {
                let id = self.prompter.capture_u64("Chain ID")?;
                if id > 0 {
                    break id;
                }
                self.prompter.info("chain ID must be greater than zero");
            },
        };

        self.params.external_gas_token = false;
        if !self.opts.use_defaults {
            loop {
                match select(
                    self.prompter,
                    "Which token will be used for transaction fee payments?",
                    &[GasToken::Native, GasToken::External, GasToken::Explain],
                )? {
                    GasToken::Native => break,
                    GasToken::External => {
                        self.params.external_gas_token = true;
                        break;
                    }
                    GasToken::Explain => self.prompter.info(GAS_TOKEN_EXPLANATION),
                }
            }
        }

        self.params.token_symbol = match &self.opts.token_symbol {
            Some(s) => s.clone(),
            None => loop {
                let s = self.prompter.capture_string("Token symbol")?;
                let s = s.trim().to_string();
                if !s.is_empty() {
                    break s;
                }
                self.prompter.info("token symbol must not be empty");
            },
        };

        // first stage: nothing to go back to
        Ok(Direction::Forward)
    }

    fn fee(&mut self) -> Result<Direction> {
        self.params.precompiles.fee_manager = None;
        self.params.precompiles.reward_manager = None;

        if self.opts.use_defaults {
            self.prompter
                .info("using the default fee configuration (low disk use, low throughput)");
            self.params.fee_config = FeeConfig::low();
            return Ok(Direction::Forward);
        }

        self.params.fee_config = match prompt_fee_config(self.prompter)? {
            Some(cfg) => cfg,
            None => return Ok(Direction::Backward),
        };

        if yes_no_explain(
            self.prompter,
            "Do you want dynamic fees (fee manager precompile)?",
            DYNAMIC_FEES_EXPLANATION,
        )? {
            match prompt_allow_list(self.prompter, "fee manager")? {
                Some(list) => self.params.precompiles.fee_manager = Some(list),
                None => return Ok(Direction::Backward),
            }
        }

        loop {
            match select(
                self.prompter,
                "Do you want the fees to be rewarded instead of burned?",
                &[FeeHandling::Burn, FeeHandling::Reward, FeeHandling::Explain],
            )? {
                FeeHandling::Burn => break,
                FeeHandling::Reward => {
                    match prompt_allow_list(self.prompter, "reward manager")? {
                        Some(list) => self.params.precompiles.reward_manager = Some(list),
                        None => return Ok(Direction::Backward),
                    }
                    break;
                }
                FeeHandling::Explain => self.prompter.info(FEE_HANDLING_EXPLANATION),
            }
        }

        Ok(Direction::Forward)
    }

    fn airdrop(&mut self) -> Result<Direction> {
        self.params.allocation = BTreeMap::new();

        if self.opts.use_defaults {
            self.prompter.info(&format!(
                "airdropping 1 million {} to the default address {}",
                self.params.token_symbol, EWOQ_ADDRESS
            ));
            self.params.allocate(EWOQ_ADDRESS, default_airdrop_amount());
            return Ok(Direction::Forward);
        }

        match select(
            self.prompter,
            "How would you like to distribute funds",
            &[
                AirdropOption::Default,
                AirdropOption::Customize,
                AirdropOption::GoBack,
            ],
        )? {
            AirdropOption::Default => {
                self.params.allocate(EWOQ_ADDRESS, default_airdrop_amount());
                Ok(Direction::Forward)
            }
            AirdropOption::Customize => self.custom_airdrop(),
            AirdropOption::GoBack => Ok(Direction::Backward),
        }
    }

    fn custom_airdrop(&mut self) -> Result<Direction> {
        let amount_prompt = format!(
            "Amount to airdrop (in {} units)",
            self.params.token_symbol
        );
        loop {
            match select(self.prompter, "Configure the airdrop", &LIST_DECISIONS)? {
                ListDecision::Add => {
                    let address = self.prompter.capture_address("Address to airdrop to")?;
                    let balance = self.prompter.capture_balance(&amount_prompt)?;
                    if let Some(prev) = self.params.allocate(&address, balance) {
                        self.prompter.info(&format!(
                            "replaced the {prev} wei already allocated to {address}"
                        ));
                    }
                }
                ListDecision::Remove => {
                    let addrs: Vec<String> = self.params.allocation.keys().cloned().collect();
                    if addrs.is_empty() {
                        self.prompter.info("no address to remove");
                        continue;
                    }
                    let idx = self
                        .prompter
                        .capture_index("Which address should be removed?", &addrs)?;
                    self.params.allocation.remove(&addrs[idx]);
                }
                ListDecision::Preview => {
                    let mut out = String::new();
                    for (addr, bal) in self.params.allocation.iter() {
                        out.push_str(&format!("{addr}: {bal} wei\n"));
                    }
                    self.prompter.info(&out);
                }
                ListDecision::Done => return Ok(Direction::Forward),
                ListDecision::Cancel => return Ok(Direction::Backward),
            }
        }
    }

    fn precompiles(&mut self) -> Result<Direction> {
        let fee_manager = self.params.precompiles.fee_manager.take();
        let reward_manager = self.params.precompiles.reward_manager.take();
        self.params.precompiles = Precompiles {
            warp: self.opts.use_warp,
            fee_manager,
            reward_manager,
            ..Default::default()
        };

        if self.opts.use_defaults {
            self.prompter
                .info("using the default precompiles (warp only, no allow lists)");
            return Ok(Direction::Forward);
        }

        if yes_no_explain(
            self.prompter,
            "Do you want to allow minting of new native tokens?",
            NATIVE_MINTER_EXPLANATION,
        )? {
            match prompt_allow_list(self.prompter, "native minter")? {
                Some(list) => self.params.precompiles.native_minter = Some(list),
                None => return Ok(Direction::Backward),
            }
        }

        if yes_no_explain(
            self.prompter,
            "Do you want to restrict who may submit transactions?",
            TX_ALLOW_LIST_EXPLANATION,
        )? {
            loop {
                let list = match prompt_allow_list(self.prompter, "transaction allow list")? {
                    Some(list) => list,
                    None => return Ok(Direction::Backward),
                };
                match ensure_admins_have_balance(&list.admin_addresses, &self.params.allocation)
                {
                    Ok(()) => {
                        self.params.precompiles.tx_allow_list = Some(list);
                        break;
                    }
                    Err(e) => self.prompter.info(&e.to_string()),
                }
            }
        }

        if yes_no_explain(
            self.prompter,
            "Do you want to restrict who may deploy smart contracts?",
            DEPLOYER_ALLOW_LIST_EXPLANATION,
        )? {
            match prompt_allow_list(self.prompter, "contract deployer allow list")? {
                Some(list) => self.params.precompiles.contract_deployer_allow_list = Some(list),
                None => return Ok(Direction::Backward),
            }
        }

        Ok(Direction::Forward)
    }

    fn resolve_teleporter(&self) -> Result<bool> {
        if self.params.external_gas_token {
            self.prompter
                .info("an external gas token requires interoperability, enabling teleporter");
            return Ok(true);
        }
        if let Some(t) = self.opts.teleporter {
            return Ok(t);
        }
        if self.opts.use_defaults {
            return Ok(true);
        }
        yes_no_explain(
            self.prompter,
            "Do you want to connect your blockchain with other blockchains (teleporter)?",
            TELEPORTER_EXPLANATION,
        )
    }
}

#[cfg(test)]
use crate::{
    genesis::{allocation_key, allowlist::Role, evm, fees::FeeOption, EWOQ_ADDRESS as EWOQ},
    prompt::{Answer, Scripted, YesNoExplain},
};

#[cfg(test)]
fn interactive_opts() -> BuilderOptions {
    BuilderOptions {
        use_warp: true,
        teleporter: Some(false),
        ..Default::default()
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::builder::test_defaults --exact --show-output
#[test]
fn test_defaults() {
    let _ = env_logger::builder().is_test(true).try_init();

    let p = Scripted::new(vec![Answer::Number(888), Answer::Text("TEST".to_string())]);
    let params = Builder::new(
        &p,
        BuilderOptions {
            use_defaults: true,
            use_warp: true,
            ..Default::default()
        },
    )
    .build()
    .unwrap();

    assert_eq!(params.chain_id, 888);
    assert_eq!(params.token_symbol, "TEST");
    assert_eq!(params.fee_config, FeeConfig::low());
    assert!(params.precompiles.warp);
    assert_eq!(params.precompiles.enabled_optional(), 0);
    assert_eq!(
        params.allocation.get(&allocation_key(EWOQ)),
        Some(&default_airdrop_amount())
    );
    assert!(params.teleporter);
    assert_eq!(p.remaining(), 0);
    // every skipped stage tells the operator which defaults were applied
    assert_eq!(p.printed().len(), 3);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::builder::test_go_back_from_fee --exact --show-output
#[test]
fn test_go_back_from_fee() {
    let _ = env_logger::builder().is_test(true).try_init();

    let p = Scripted::new(vec![
        // descriptors
        Answer::Number(1),
        Answer::choose(GasToken::Native),
        Answer::Text("AAA".to_string()),
        // fee: explain, then go back
        Answer::choose(FeeOption::Explain),
        Answer::choose(FeeOption::GoBack),
        // descriptors again
        Answer::Number(2),
        Answer::choose(GasToken::Native),
        Answer::Text("BBB".to_string()),
        // fee
        Answer::choose(FeeOption::Medium),
        Answer::choose(YesNoExplain::No),
        Answer::choose(FeeHandling::Burn),
        // airdrop
        Answer::choose(AirdropOption::Default),
        // precompiles
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::No),
    ]);
    let params = Builder::new(&p, interactive_opts()).build().unwrap();
    assert_eq!(params.chain_id, 2);
    assert_eq!(params.token_symbol, "BBB");
    assert_eq!(params.fee_config, FeeConfig::medium());
    assert_eq!(params.precompiles.enabled_optional(), 0);
    assert!(!params.teleporter);
    assert_eq!(p.remaining(), 0);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::builder::test_external_token_forces_teleporter --exact --show-output
#[test]
fn test_external_token_forces_teleporter() {
    let _ = env_logger::builder().is_test(true).try_init();

    let p = Scripted::new(vec![
        Answer::Number(99),
        Answer::choose(GasToken::Explain),
        Answer::choose(GasToken::External),
        Answer::Text("EXT".to_string()),
        Answer::choose(FeeOption::Low),
        Answer::choose(YesNoExplain::No),
        Answer::choose(FeeHandling::Burn),
        Answer::choose(AirdropOption::Default),
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::No),
    ]);
    // the teleporter flag says no, the external token wins
    let params = Builder::new(&p, interactive_opts()).build().unwrap();
    assert!(params.external_gas_token);
    assert!(params.teleporter);

    // without warp the forced teleporter is a conflict
    let p = Scripted::new(vec![
        Answer::Number(99),
        Answer::choose(GasToken::External),
        Answer::Text("EXT".to_string()),
        Answer::choose(FeeOption::Low),
        Answer::choose(YesNoExplain::No),
        Answer::choose(FeeHandling::Burn),
        Answer::choose(AirdropOption::Default),
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::No),
    ]);
    let res = Builder::new(
        &p,
        BuilderOptions {
            use_warp: false,
            ..interactive_opts()
        },
    )
    .build();
    assert!(matches!(res, Err(Error::FlagConflict { .. })));
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::builder::test_custom_airdrop_and_tx_allow_list --exact --show-output
#[test]
fn test_custom_airdrop_and_tx_allow_list() {
    let _ = env_logger::builder().is_test(true).try_init();

    let admin = "0x0000000000000000000000000000000000000aaa";
    let p = Scripted::new(vec![
        Answer::Number(5),
        Answer::choose(GasToken::Native),
        Answer::Text("TKN".to_string()),
        Answer::choose(FeeOption::Low),
        Answer::choose(YesNoExplain::Yes),
        Answer::choose(ListDecision::Add),
        Answer::choose(Role::Admin),
        Answer::Text(admin.to_string()),
        Answer::choose(ListDecision::Done),
        Answer::choose(FeeHandling::Burn),
        // airdrop 10 tokens to the admin
        Answer::choose(AirdropOption::Customize),
        Answer::choose(ListDecision::Add),
        Answer::Text(admin.to_string()),
        Answer::Number(10),
        Answer::choose(ListDecision::Done),
        // precompiles: no minter, tx allow list with the funded admin, no deployer list
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::Yes),
        Answer::choose(ListDecision::Add),
        Answer::choose(Role::Admin),
        Answer::Text(EWOQ.to_string()),
        Answer::choose(ListDecision::Done),
        // unfunded admin is refused, try again with the funded one
        Answer::choose(ListDecision::Add),
        Answer::choose(Role::Admin),
        Answer::Text(admin.to_string()),
        Answer::choose(ListDecision::Done),
        Answer::choose(YesNoExplain::No),
    ]);
    let params = Builder::new(&p, interactive_opts()).build().unwrap();
    assert_eq!(params.allocation.len(), 1);
    assert_eq!(
        params.allocation.get(admin),
        Some(&(primitive_types::U256::from(10) * crate::prompt::one_token()))
    );
    assert!(params.precompiles.fee_manager.is_some());
    assert_eq!(
        params.precompiles.tx_allow_list.as_ref().map(|l| l.admin_addresses.clone()),
        Some(vec![admin.to_string()])
    );
    assert_eq!(params.precompiles.enabled_optional(), 2);
    assert_eq!(p.remaining(), 0);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::builder::test_airdrop_address_case_and_typo --exact --show-output
#[test]
fn test_airdrop_address_case_and_typo() {
    let _ = env_logger::builder().is_test(true).try_init();

    let upper = "0x00000000000000000000000000000000000000AA";
    let lower = "0x00000000000000000000000000000000000000aa";
    let p = Scripted::new(vec![
        Answer::Number(5),
        Answer::choose(GasToken::Native),
        Answer::Text("TKN".to_string()),
        Answer::choose(FeeOption::Low),
        Answer::choose(YesNoExplain::No),
        Answer::choose(FeeHandling::Burn),
        Answer::choose(AirdropOption::Customize),
        // a mistyped address is asked again instead of ending the run
        Answer::choose(ListDecision::Add),
        Answer::Text("0x123".to_string()),
        Answer::Text(upper.to_string()),
        Answer::Number(10),
        // same address in another case replaces the entry
        Answer::choose(ListDecision::Add),
        Answer::Text(lower.to_string()),
        Answer::Number(7),
        Answer::choose(ListDecision::Done),
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::No),
        Answer::choose(YesNoExplain::No),
    ]);
    let params = Builder::new(&p, interactive_opts()).build().unwrap();
    assert_eq!(p.remaining(), 0);

    let seven = primitive_types::U256::from(7) * crate::prompt::one_token();
    assert_eq!(params.allocation.len(), 1);
    assert_eq!(params.allocation.get(lower), Some(&seven));
    assert!(p.printed().iter().any(|m| m.contains("0x123")));
    assert!(p.printed().iter().any(|m| m.contains("replaced")));

    let g: serde_json::Value =
        serde_json::from_slice(&evm::to_genesis_json(&params, 1_700_000_000).unwrap()).unwrap();
    let alloc = g["alloc"].as_object().unwrap();
    assert_eq!(alloc.len(), 1);
    assert_eq!(
        alloc[lower.trim_start_matches("0x")]["balance"],
        format!("{:#x}", seven)
    );
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- genesis::builder::test_cancelled_prompt_aborts --exact --show-output
#[test]
fn test_cancelled_prompt_aborts() {
    let p = Scripted::new(vec![Answer::Number(5), Answer::choose(GasToken::Native)]);
    let res = Builder::new(&p, interactive_opts()).build();
    assert!(matches!(res, Err(Error::Prompt { .. })));
}
