use std::{
    io::{self, stdout, Error, ErrorKind},
    path::PathBuf,
    time::{SystemTime, UNIX_EPOCH},
};

use avalanche_fleet::{
    app::App,
    prompt::Terminal,
    subnet::{self, SubnetCreateOptions},
    versions::GitHub,
};
use clap::{value_parser, Arg, ArgMatches, Command};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

pub const NAME: &str = "create";

pub fn command() -> Command {
    Command::new(NAME)
        .about("Creates a subnet configuration (genesis and sidecar)")
        .arg(
            Arg::new("SUBNET_NAME")
                .help("Name of the subnet (letters, digits and spaces)")
                .required(true)
                .index(1),
        )
        .arg(crate::log_level_arg())
        .arg(crate::base_dir_arg())
        .arg(
            Arg::new("EVM")
                .long("evm")
                .help("Uses Subnet-EVM as the VM")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("CUSTOM")
                .long("custom")
                .help("Uses a custom VM")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("GENESIS")
                .long("genesis")
                .help("Imports this genesis file instead of building one")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("FORCE")
                .long("force")
                .short('f')
                .help("Overwrites an existing subnet configuration")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("VM")
                .long("vm")
                .help("Custom VM binary")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("VM_VERSION")
                .long("vm-version")
                .help("Subnet-EVM version (e.g., v0.5.6)")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("LATEST")
                .long("latest")
                .help("Uses the latest Subnet-EVM release")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("PRE_RELEASE")
                .long("pre-release")
                .help("Uses the latest Subnet-EVM pre-release")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("EVM_CHAIN_ID")
                .long("evm-chain-id")
                .help("Chain ID of the Subnet-EVM chain")
                .required(false)
                .num_args(1)
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("EVM_TOKEN")
                .long("evm-token")
                .help("Native token symbol")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("EVM_DEFAULTS")
                .long("evm-defaults")
                .help("Uses the default fees, airdrop and precompiles")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("TELEPORTER")
                .long("teleporter")
                .help("Enables teleporter messaging")
                .required(false)
                .num_args(0)
                .conflicts_with("NO_TELEPORTER"),
        )
        .arg(
            Arg::new("NO_TELEPORTER")
                .long("no-teleporter")
                .help("Disables teleporter messaging")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("WARP")
                .long("warp")
                .help("Enables the warp precompile")
                .required(false)
                .num_args(1)
                .value_parser(value_parser!(bool))
                .default_value("true"),
        )
}

pub fn options(matches: &ArgMatches) -> SubnetCreateOptions {
    let teleporter = if matches.get_flag("TELEPORTER") {
        Some(true)
    } else if matches.get_flag("NO_TELEPORTER") {
        Some(false)
    } else {
        None
    };
    SubnetCreateOptions {
        name: matches
            .get_one::<String>("SUBNET_NAME")
            .cloned()
            .unwrap_or_default(),
        use_evm: matches.get_flag("EVM"),
        use_custom: matches.get_flag("CUSTOM"),
        genesis_path: matches.get_one::<String>("GENESIS").cloned(),
        force: matches.get_flag("FORCE"),
        custom_vm_path: matches.get_one::<String>("VM").cloned(),
        vm_version: matches.get_one::<String>("VM_VERSION").cloned(),
        latest: matches.get_flag("LATEST"),
        pre_release: matches.get_flag("PRE_RELEASE"),
        evm_chain_id: matches.get_one::<u64>("EVM_CHAIN_ID").copied(),
        evm_token: matches.get_one::<String>("EVM_TOKEN").cloned(),
        evm_defaults: matches.get_flag("EVM_DEFAULTS"),
        teleporter,
        use_warp: *matches.get_one::<bool>("WARP").unwrap_or(&true),
    }
}

pub async fn execute(
    log_level: &str,
    base_dir: PathBuf,
    opts: SubnetCreateOptions,
) -> io::Result<()> {
    crate::init_logger(log_level);

    let app = App::new(&base_dir);
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| Error::new(ErrorKind::Other, e.to_string()))?
        .as_secs();

    let sc = subnet::create(&app, &opts, &Terminal, &GitHub, timestamp).await?;
    execute!(
        stdout(),
        SetForegroundColor(Color::Green),
        Print(format!(
            "\nSuccessfully created subnet configuration '{}' ({} {}, RPC version {})\ngenesis: {}\n",
            sc.name,
            sc.vm,
            sc.vm_version,
            sc.rpc_version,
            app.genesis_path(&sc.name)
        )),
        ResetColor
    )?;
    Ok(())
}

/// RUST_LOG=debug cargo test --package fleetup --bin fleetup -- subnet::create::test_options --exact --show-output
#[test]
fn test_options() {
    let m = command().get_matches_from(vec!["create", "s1", "--evm", "--no-teleporter", "--warp", "false"]);
    let o = options(&m);
    assert_eq!(o.name, "s1");
    assert!(o.use_evm);
    assert_eq!(o.teleporter, Some(false));
    assert!(!o.use_warp);

    let m = command().get_matches_from(vec!["create", "s1", "--evm-chain-id", "888"]);
    let o = options(&m);
    assert_eq!(o.teleporter, None);
    assert!(o.use_warp);
    assert_eq!(o.evm_chain_id, Some(888));

    assert!(command()
        .try_get_matches_from(vec!["create", "s1", "--teleporter", "--no-teleporter"])
        .is_err());
}
