use std::{
    io::{self, stdout},
    path::PathBuf,
    sync::Arc,
    time::Duration,
};

use avalanche_fleet::{
    app::App,
    remote::ssh,
    status::{self, StatusOptions, StatusReport},
};
use clap::{value_parser, Arg, ArgMatches, Command};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

pub const NAME: &str = "status";

pub fn command() -> Command {
    Command::new(NAME)
        .about("Shows the health of every node in a cluster")
        .arg(
            Arg::new("CLUSTER_NAME")
                .help("Name of the cluster")
                .required(true)
                .index(1),
        )
        .arg(crate::log_level_arg())
        .arg(crate::base_dir_arg())
        .arg(
            Arg::new("SUBNET")
                .long("subnet")
                .help("Also shows whether the nodes sync or validate this subnet")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("TIMEOUT_SECONDS")
                .long("timeout-seconds")
                .help("Timeout of each query")
                .required(false)
                .num_args(1)
                .value_parser(value_parser!(u64))
                .default_value("30"),
        )
}

pub fn options(matches: &ArgMatches) -> StatusOptions {
    StatusOptions {
        cluster_name: matches
            .get_one::<String>("CLUSTER_NAME")
            .cloned()
            .unwrap_or_default(),
        subnet: matches.get_one::<String>("SUBNET").cloned(),
        timeout: Duration::from_secs(*matches.get_one::<u64>("TIMEOUT_SECONDS").unwrap_or(&30)),
    }
}

pub async fn execute(log_level: &str, base_dir: PathBuf, opts: StatusOptions) -> io::Result<()> {
    crate::init_logger(log_level);

    let app = App::new(&base_dir);
    execute!(
        stdout(),
        SetForegroundColor(Color::Green),
        Print(format!("\n\n\nSTEP: checking cluster '{}'\n", opts.cluster_name)),
        ResetColor
    )?;
    let report = status::status(&app, Arc::new(ssh::Manager), &opts).await?;
    print_table(&report, opts.subnet.is_some());

    let not_bootstrapped = report.not_bootstrapped();
    if !not_bootstrapped.is_empty() {
        execute!(
            stdout(),
            SetForegroundColor(Color::Red),
            Print(format!(
                "\nnodes not bootstrapped: {}\n",
                not_bootstrapped.join(", ")
            )),
            ResetColor
        )?;
    }
    if let Some(subnet) = &opts.subnet {
        let not_validating = report.not_validating();
        if !not_validating.is_empty() {
            execute!(
                stdout(),
                SetForegroundColor(Color::Red),
                Print(format!(
                    "\nnodes not validating '{}': {}\n",
                    subnet,
                    not_validating.join(", ")
                )),
                ResetColor
            )?;
        }
    }

    if let Some(e) = report.queries.to_error() {
        for node in report.queries.failed_nodes() {
            if let Some(err) = report.queries.error(&node) {
                log::warn!("{}: {}", node, err);
            }
        }
        return Err(e.into());
    }
    Ok(())
}

fn print_table(report: &StatusReport, with_subnet: bool) {
    let mut header = format!(
        "{:<28} {:<22} {:<44} {:<16} {:<13}",
        "HOST", "INSTANCE", "NODE ID", "IP", "BOOTSTRAPPED"
    );
    if with_subnet {
        header.push_str(" SUBNET");
    }
    println!("\n{}", header);
    for r in report.rows.iter() {
        let mut line = format!(
            "{:<28} {:<22} {:<44} {:<16} {:<13}",
            r.alias,
            r.instance_id,
            if r.node_identity.is_empty() { "-" } else { r.node_identity.as_str() },
            r.ip,
            r.bootstrapped
        );
        if with_subnet {
            line.push(' ');
            line.push_str(r.subnet_status.as_deref().unwrap_or("-"));
        }
        println!("{}", line);
    }
}
