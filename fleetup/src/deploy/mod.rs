use std::{
    io::{self, stdout},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use avalanche_fleet::{
    app::App,
    deploy::{self, DeployOptions},
    remote::ssh,
};
use clap::{value_parser, Arg, ArgMatches, Command};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

pub const NAME: &str = "deploy";

pub fn command() -> Command {
    Command::new(NAME)
        .about("Deploys a subnet onto a Devnet cluster")
        .arg(
            Arg::new("CLUSTER_NAME")
                .help("Name of the Devnet cluster")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("SUBNET_NAME")
                .help("Name of the subnet to deploy")
                .required(true)
                .index(2),
        )
        .arg(crate::log_level_arg())
        .arg(crate::base_dir_arg())
        .arg(
            Arg::new("TIMEOUT_SECONDS")
                .long("timeout-seconds")
                .help("Timeout of the remote deployment")
                .required(false)
                .num_args(1)
                .value_parser(value_parser!(u64))
                .default_value("600"),
        )
}

pub fn options(matches: &ArgMatches) -> DeployOptions {
    DeployOptions {
        cluster_name: matches
            .get_one::<String>("CLUSTER_NAME")
            .cloned()
            .unwrap_or_default(),
        subnet_name: matches
            .get_one::<String>("SUBNET_NAME")
            .cloned()
            .unwrap_or_default(),
        timeout: Duration::from_secs(*matches.get_one::<u64>("TIMEOUT_SECONDS").unwrap_or(&600)),
    }
}

pub async fn execute(log_level: &str, base_dir: PathBuf, opts: DeployOptions) -> io::Result<()> {
    crate::init_logger(log_level);

    let app = App::new(&base_dir);
    execute!(
        stdout(),
        SetForegroundColor(Color::Green),
        Print(format!(
            "\n\n\nSTEP: deploying subnet '{}' to cluster '{}'\n",
            opts.subnet_name, opts.cluster_name
        )),
        ResetColor
    )?;

    let report = deploy::deploy(&app, Arc::new(ssh::Manager), &opts).await?;
    for node in report.succeeded_nodes() {
        execute!(
            stdout(),
            SetForegroundColor(Color::Green),
            Print(format!("{} DEPLOYED\n", node)),
            ResetColor
        )?;
    }
    for node in report.failed_nodes() {
        let msg = report
            .error(&node)
            .map(|e| e.to_string())
            .unwrap_or_default();
        execute!(
            stdout(),
            SetForegroundColor(Color::Red),
            Print(format!("{} ERROR: {}\n", node, msg)),
            ResetColor
        )?;
    }
    if let Some(e) = report.to_error() {
        return Err(e.into());
    }
    Ok(())
}
