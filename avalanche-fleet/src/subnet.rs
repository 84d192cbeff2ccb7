//! "subnet create": validates flags, picks the VM, builds or imports the
//! genesis and writes it together with the sidecar.
use std::{
    fmt,
    fs::{self, File},
    io::Write,
    path::Path,
};

use crate::{
    app::App,
    errors::{Error, Result},
    genesis::{
        self, evm, Builder, BuilderOptions, TELEPORTER_DEPLOYER_ADDRESS, TELEPORTER_KEY_NAME,
        TELEPORTER_VERSION,
    },
    prompt::{self, Prompter},
    sidecar::{Sidecar, VmType},
    versions::{self, VersionSource},
};

pub const DEFAULT_TOKEN_SYMBOL: &str = "TEST";

/// Options for "subnet create", built by the CLI from its flags.
#[derive(Debug, Clone)]
pub struct SubnetCreateOptions {
    pub name: String,
    pub use_evm: bool,
    pub use_custom: bool,
    pub genesis_path: Option<String>,
    pub force: bool,
    pub custom_vm_path: Option<String>,
    pub vm_version: Option<String>,
    pub latest: bool,
    pub pre_release: bool,
    pub evm_chain_id: Option<u64>,
    pub evm_token: Option<String>,
    pub evm_defaults: bool,
    pub teleporter: Option<bool>,
    pub use_warp: bool,
}

impl Default for SubnetCreateOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            use_evm: false,
            use_custom: false,
            genesis_path: None,
            force: false,
            custom_vm_path: None,
            vm_version: None,
            latest: false,
            pre_release: false,
            evm_chain_id: None,
            evm_token: None,
            evm_defaults: false,
            teleporter: None,
            use_warp: true,
        }
    }
}

/// Subnet names may only hold ASCII letters, digits and spaces.
pub fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "name must not be empty".to_string(),
        });
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == ' '))
    {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: format!("illegal character '{}'", c),
        });
    }
    Ok(())
}

impl SubnetCreateOptions {
    fn has_evm_flags(&self) -> bool {
        self.evm_chain_id.is_some() || self.evm_token.is_some() || self.evm_defaults
    }

    /// Checks every flag before any prompt or network call.
    pub fn validate(&self, app: &App) -> Result<()> {
        validate_name(&self.name)?;
        if self.use_evm && self.use_custom {
            return Err(Error::flag_conflict("only one of --evm and --custom may be set"));
        }
        let version_flags = [self.latest, self.pre_release, self.vm_version.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if version_flags > 1 {
            return Err(Error::flag_conflict(
                "only one of --latest, --pre-release and --vm-version may be set",
            ));
        }
        if let Some(v) = &self.vm_version {
            versions::validate_version(v)?;
        }
        if self.genesis_path.is_some() && self.has_evm_flags() {
            return Err(Error::flag_conflict(
                "--genesis can not be used with --evm-chain-id, --evm-token or --evm-defaults",
            ));
        }
        if self.use_custom && self.has_evm_flags() {
            return Err(Error::flag_conflict(
                "--custom can not be used with --evm-chain-id, --evm-token or --evm-defaults",
            ));
        }
        if app.subnet_exists(&self.name) && !self.force {
            return Err(Error::other(format!(
                "subnet '{}' already exists, use --force to overwrite it",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum VmChoice {
    SubnetEvm,
    Custom,
    Explain,
}

impl fmt::Display for VmChoice {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VmChoice::SubnetEvm => write!(f, "{}", VmType::SubnetEvm),
            VmChoice::Custom => write!(f, "{}", VmType::CustomVm),
            VmChoice::Explain => write!(f, "Explain the difference"),
        }
    }
}

const VM_EXPLANATION: &str = "Subnet-EVM is an Ethereum-compatible VM maintained by Ava Labs. \
A custom VM is any other VM binary you provide, together with its genesis.";

fn select_vm(opts: &SubnetCreateOptions, prompter: &dyn Prompter) -> Result<VmType> {
    if opts.use_evm {
        return Ok(VmType::SubnetEvm);
    }
    if opts.use_custom {
        return Ok(VmType::CustomVm);
    }
    loop {
        match prompt::select(
            prompter,
            "Which Virtual Machine would you like to use?",
            &[VmChoice::SubnetEvm, VmChoice::Custom, VmChoice::Explain],
        )? {
            VmChoice::SubnetEvm => return Ok(VmType::SubnetEvm),
            VmChoice::Custom => return Ok(VmType::CustomVm),
            VmChoice::Explain => prompter.info(VM_EXPLANATION),
        }
    }
}

fn read_genesis(path: &str) -> Result<Vec<u8>> {
    if !Path::new(path).exists() {
        return Err(Error::NotFound {
            message: format!("genesis file '{}'", path),
        });
    }
    Ok(fs::read(path)?)
}

async fn resolve_vm_version(
    opts: &SubnetCreateOptions,
    versions: &dyn VersionSource,
) -> Result<String> {
    if let Some(v) = &opts.vm_version {
        return Ok(v.clone());
    }
    if opts.pre_release {
        return versions
            .latest_pre_release(versions::AVA_LABS_ORG, versions::SUBNET_EVM_REPO)
            .await;
    }
    versions
        .latest_release(versions::AVA_LABS_ORG, versions::SUBNET_EVM_REPO)
        .await
}

/// Genesis and sidecar ready to be written.
#[derive(Debug, Clone)]
pub struct SubnetArtifacts {
    pub genesis: Vec<u8>,
    pub sidecar: Sidecar,
}

async fn subnet_evm(
    opts: &SubnetCreateOptions,
    prompter: &dyn Prompter,
    versions: &dyn VersionSource,
    timestamp: u64,
) -> Result<SubnetArtifacts> {
    let (genesis, token_symbol, teleporter) = match &opts.genesis_path {
        Some(path) => {
            let bytes = read_genesis(path)?;
            evm::validate_evm_genesis(&bytes)?;
            let teleporter = opts.teleporter.unwrap_or(false);
            if teleporter && !opts.use_warp {
                return Err(Error::flag_conflict("teleporter requires warp"));
            }
            let bytes = if teleporter {
                evm::add_prefunded_address(
                    &bytes,
                    TELEPORTER_DEPLOYER_ADDRESS,
                    genesis::teleporter_prefund_amount(),
                )?
            } else {
                bytes
            };
            let symbol = opts
                .evm_token
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_SYMBOL.to_string());
            (bytes, symbol, teleporter)
        }
        None => {
            let params = Builder::new(
                prompter,
                BuilderOptions {
                    chain_id: opts.evm_chain_id,
                    token_symbol: opts.evm_token.clone(),
                    use_defaults: opts.evm_defaults,
                    use_warp: opts.use_warp,
                    teleporter: opts.teleporter,
                },
            )
            .build()?;
            let bytes = evm::to_genesis_json(&params, timestamp)?;
            (bytes, params.token_symbol, params.teleporter)
        }
    };

    let vm_version = resolve_vm_version(opts, versions).await?;
    let rpc_version = versions.rpc_version(&vm_version).await?;
    log::info!("subnet-evm {} speaks RPC protocol version {}", vm_version, rpc_version);

    let mut sc = Sidecar::new(&opts.name, VmType::SubnetEvm);
    sc.vm_version = vm_version;
    sc.rpc_version = rpc_version;
    sc.token_name = format!("{} Token", token_symbol);
    sc.token_symbol = token_symbol;
    if teleporter {
        sc.teleporter_ready = true;
        sc.teleporter_key = TELEPORTER_KEY_NAME.to_string();
        sc.teleporter_version = TELEPORTER_VERSION.to_string();
    }
    Ok(SubnetArtifacts {
        genesis,
        sidecar: sc,
    })
}

fn custom_vm(opts: &SubnetCreateOptions, prompter: &dyn Prompter) -> Result<SubnetArtifacts> {
    let genesis_path = match &opts.genesis_path {
        Some(p) => p.clone(),
        None => prompter.capture_string("Enter path to custom genesis")?,
    };
    let genesis = read_genesis(genesis_path.trim())?;

    let vm_path = match &opts.custom_vm_path {
        Some(p) => p.clone(),
        None => prompter.capture_string("Enter path to VM binary")?,
    };
    let vm_path = vm_path.trim().to_string();
    if !Path::new(&vm_path).exists() {
        return Err(Error::NotFound {
            message: format!("VM binary '{}'", vm_path),
        });
    }

    let mut sc = Sidecar::new(&opts.name, VmType::CustomVm);
    sc.custom_vm_path = vm_path;
    if opts.teleporter.unwrap_or(false) {
        sc.teleporter_ready = true;
        sc.teleporter_key = TELEPORTER_KEY_NAME.to_string();
        sc.teleporter_version = TELEPORTER_VERSION.to_string();
    }
    Ok(SubnetArtifacts {
        genesis,
        sidecar: sc,
    })
}

/// Builds everything for the subnet without touching its directory.
pub async fn prepare(
    app: &App,
    opts: &SubnetCreateOptions,
    prompter: &dyn Prompter,
    versions: &dyn VersionSource,
    timestamp: u64,
) -> Result<SubnetArtifacts> {
    opts.validate(app)?;
    match select_vm(opts, prompter)? {
        VmType::SubnetEvm => subnet_evm(opts, prompter, versions, timestamp).await,
        VmType::CustomVm => custom_vm(opts, prompter),
    }
}

/// Writes the genesis through a temporary file, then the sidecar.
pub fn write(app: &App, artifacts: &SubnetArtifacts) -> Result<()> {
    let name = &artifacts.sidecar.name;
    fs::create_dir_all(app.subnet_dir(name))?;

    let genesis_path = app.genesis_path(name);
    let tmp = format!("{}.tmp", genesis_path);
    let mut f = File::create(&tmp)?;
    f.write_all(&artifacts.genesis)?;
    f.sync_all()?;
    fs::rename(&tmp, &genesis_path)?;

    artifacts.sidecar.sync(&app.sidecar_path(name))
}

/// Runs the whole "subnet create". Nothing is written unless every step succeeded.
pub async fn create(
    app: &App,
    opts: &SubnetCreateOptions,
    prompter: &dyn Prompter,
    versions: &dyn VersionSource,
    timestamp: u64,
) -> Result<Sidecar> {
    let artifacts = prepare(app, opts, prompter, versions, timestamp).await?;
    write(app, &artifacts)?;
    log::info!("created subnet '{}' ({})", opts.name, artifacts.sidecar.vm);
    Ok(artifacts.sidecar)
}

#[cfg(test)]
struct FixedVersions;

#[cfg(test)]
#[async_trait::async_trait]
impl VersionSource for FixedVersions {
    async fn latest_release(&self, _org: &str, _repo: &str) -> Result<String> {
        Ok("v0.5.6".to_string())
    }
    async fn latest_pre_release(&self, _org: &str, _repo: &str) -> Result<String> {
        Ok("v0.5.7-rc.0".to_string())
    }
    async fn rpc_version(&self, _vm_version: &str) -> Result<u32> {
        Ok(28)
    }
    async fn avalanchego_for_rpc(&self, _rpc_version: u32) -> Result<String> {
        Ok("v1.10.11".to_string())
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- subnet::test_validate --exact --show-output
#[test]
fn test_validate() {
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(dir.path());

    let ok = SubnetCreateOptions {
        name: "my subnet 1".to_string(),
        use_evm: true,
        ..Default::default()
    };
    assert!(ok.validate(&app).is_ok());

    for name in ["my-subnet", "sub.net", "", "ünïcode"] {
        let o = SubnetCreateOptions {
            name: name.to_string(),
            ..ok.clone()
        };
        assert!(matches!(o.validate(&app), Err(Error::InvalidName { .. })), "{name}");
    }

    for bad in [
        SubnetCreateOptions { use_custom: true, ..ok.clone() },
        SubnetCreateOptions { latest: true, pre_release: true, ..ok.clone() },
        SubnetCreateOptions {
            latest: true,
            vm_version: Some("v0.5.6".to_string()),
            ..ok.clone()
        },
        SubnetCreateOptions {
            genesis_path: Some("/tmp/g.json".to_string()),
            evm_defaults: true,
            ..ok.clone()
        },
        SubnetCreateOptions {
            use_evm: false,
            use_custom: true,
            evm_chain_id: Some(1),
            ..ok.clone()
        },
    ] {
        assert!(matches!(bad.validate(&app), Err(Error::FlagConflict { .. })), "{bad:?}");
    }

    let o = SubnetCreateOptions {
        vm_version: Some("0.5.6".to_string()),
        ..ok.clone()
    };
    assert!(matches!(o.validate(&app), Err(Error::InvalidVersion { .. })));

    Sidecar::new("my subnet 1", VmType::SubnetEvm)
        .sync(&app.sidecar_path("my subnet 1"))
        .unwrap();
    assert!(ok.validate(&app).is_err());
    assert!(SubnetCreateOptions { force: true, ..ok }.validate(&app).is_ok());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- subnet::test_create_with_defaults --exact --show-output
#[tokio::test]
async fn test_create_with_defaults() {
    use crate::prompt::Scripted;

    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let app = App::new(dir.path());
    let opts = SubnetCreateOptions {
        name: "s1".to_string(),
        use_evm: true,
        evm_chain_id: Some(888),
        evm_token: Some("FLT".to_string()),
        evm_defaults: true,
        ..Default::default()
    };
    let p = Scripted::new(vec![]);
    let sc = create(&app, &opts, &p, &FixedVersions, 1_700_000_000).await.unwrap();

    assert_eq!(sc.vm, VmType::SubnetEvm);
    assert_eq!(sc.vm_version, "v0.5.6");
    assert_eq!(sc.rpc_version, 28);
    assert_eq!(sc.token_symbol, "FLT");
    assert!(sc.teleporter_ready);
    assert_eq!(sc.teleporter_key, TELEPORTER_KEY_NAME);

    let g = fs::read(app.genesis_path("s1")).unwrap();
    assert_eq!(evm::chain_id(&g).unwrap(), 888);
    assert_eq!(Sidecar::load(&app.sidecar_path("s1")).unwrap(), sc);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- subnet::test_invalid_import_writes_nothing --exact --show-output
#[tokio::test]
async fn test_invalid_import_writes_nothing() {
    use crate::prompt::Scripted;

    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let app = App::new(dir.path());
    let bad = dir.path().join("bad.json");
    let no_config = dir.path().join("no-config.json");
    fs::write(&bad, b"{not json").unwrap();
    fs::write(&no_config, br#"{"alloc": {}}"#).unwrap();

    for path in [&bad, &no_config] {
        let opts = SubnetCreateOptions {
            name: "s1".to_string(),
            use_evm: true,
            genesis_path: Some(path.display().to_string()),
            ..Default::default()
        };
        let res = create(&app, &opts, &Scripted::new(vec![]), &FixedVersions, 0).await;
        assert!(matches!(res, Err(Error::GenesisFormat { .. })));
        assert!(!Path::new(&app.genesis_path("s1")).exists());
        assert!(!Path::new(&app.sidecar_path("s1")).exists());
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- subnet::test_import_and_custom --exact --show-output
#[tokio::test]
async fn test_import_and_custom() {
    use crate::prompt::{Answer, Scripted};

    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let app = App::new(dir.path());
    let genesis_file = dir.path().join("genesis.json");
    fs::write(&genesis_file, br#"{"config": {"chainId": 99}, "alloc": {}}"#).unwrap();
    let vm_file = dir.path().join("vm");
    fs::write(&vm_file, b"binary").unwrap();

    // imported Subnet-EVM genesis with teleporter prefunds the deployer
    let opts = SubnetCreateOptions {
        name: "imported".to_string(),
        genesis_path: Some(genesis_file.display().to_string()),
        teleporter: Some(true),
        pre_release: true,
        ..Default::default()
    };
    let p = Scripted::new(vec![Answer::choose("Explain the difference"), Answer::choose("Subnet-EVM")]);
    let sc = create(&app, &opts, &p, &FixedVersions, 0).await.unwrap();
    assert_eq!(sc.vm_version, "v0.5.7-rc.0");
    assert_eq!(p.printed(), vec![VM_EXPLANATION.to_string()]);
    let g: serde_json::Value =
        serde_json::from_slice(&fs::read(app.genesis_path("imported")).unwrap()).unwrap();
    let key = TELEPORTER_DEPLOYER_ADDRESS.trim_start_matches("0x").to_lowercase();
    assert!(g["alloc"][key.as_str()]["balance"].is_string());

    // custom VM prompts for the binary path
    let opts = SubnetCreateOptions {
        name: "custom".to_string(),
        use_custom: true,
        genesis_path: Some(genesis_file.display().to_string()),
        ..Default::default()
    };
    let p = Scripted::new(vec![Answer::Text(vm_file.display().to_string())]);
    let sc = create(&app, &opts, &p, &FixedVersions, 0).await.unwrap();
    assert_eq!(sc.vm, VmType::CustomVm);
    assert_eq!(sc.custom_vm_path, vm_file.display().to_string());
    assert!(!sc.teleporter_ready);
}
