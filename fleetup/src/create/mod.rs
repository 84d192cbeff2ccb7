use std::{
    env,
    io::{self, stdout, Error, ErrorKind},
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use avalanche_fleet::{
    app::App,
    cloud::{aws, gcp, CloudProvider},
    infra::terraform,
    ip::Ipify,
    node::CloudService,
    prompt::{Prompter, Terminal},
    provision::{self, Collaborators, CreateOptions, CreateOutcome},
    remote::ssh,
    versions::GitHub,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use tokio::time::sleep;

pub const NAME: &str = "create";

pub fn command() -> Command {
    Command::new(NAME)
        .about("Creates a cluster of Avalanche nodes on AWS or GCP")
        .arg(
            Arg::new("CLUSTER_NAME")
                .help("Name of the cluster to create")
                .required(true)
                .index(1),
        )
        .arg(crate::log_level_arg())
        .arg(crate::base_dir_arg())
        .arg(
            Arg::new("AWS")
                .long("aws")
                .help("Creates the nodes on AWS")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("GCP")
                .long("gcp")
                .help("Creates the nodes on GCP")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("REGION")
                .long("region")
                .help("Region to create nodes in (repeat for more regions)")
                .required(false)
                .num_args(1)
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("NUM_NODES")
                .long("num-nodes")
                .help("Number of nodes per region, in the same order as --region")
                .required(false)
                .num_args(1)
                .value_parser(value_parser!(u32))
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("NODE_TYPE")
                .long("node-type")
                .help("Instance type ('default' picks c5.2xlarge on AWS, e2-standard-8 on GCP)")
                .required(false)
                .num_args(1)
                .default_value(provision::DEFAULT_NODE_TYPE),
        )
        .arg(
            Arg::new("USE_STATIC_IP")
                .long("use-static-ip")
                .help("Attaches a static public IP to every node")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("AUTHORIZE_ACCESS")
                .long("authorize-access")
                .help("Authorizes access to the cloud account and the nodes without asking")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("FUJI")
                .long("fuji")
                .help("Joins the nodes to Fuji (default)")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("DEVNET")
                .long("devnet")
                .help("Forms a private network out of the nodes")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("AWS_PROFILE")
                .long("aws-profile")
                .help("AWS credentials profile")
                .required(false)
                .num_args(1)
                .default_value(provision::DEFAULT_AWS_PROFILE),
        )
        .arg(
            Arg::new("GCP_PROJECT")
                .long("gcp-project")
                .help("GCP project to create the nodes in")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("GCP_CREDENTIALS")
                .long("gcp-credentials")
                .help("GCP service account credentials file")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("ALTERNATIVE_KEY_PAIR_NAME")
                .long("alternative-key-pair-name")
                .help("Key pair name to use instead of the generated one")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("LATEST_AVALANCHEGO_VERSION")
                .long("latest-avalanchego-version")
                .help("Installs the latest AvalancheGo release")
                .required(false)
                .num_args(0),
        )
        .arg(
            Arg::new("AVALANCHEGO_VERSION_FROM_SUBNET")
                .long("avalanchego-version-from-subnet")
                .help("Installs the AvalancheGo version compatible with the subnet's VM")
                .required(false)
                .num_args(1),
        )
        .arg(
            Arg::new("SSH_TIMEOUT_SECONDS")
                .long("ssh-timeout-seconds")
                .help("How long to wait for the nodes to accept SSH connections")
                .required(false)
                .num_args(1)
                .value_parser(value_parser!(u64))
                .default_value("300"),
        )
        .arg(
            Arg::new("REMOTE_CLI_VERSION")
                .long("remote-cli-version")
                .help("Git branch or tag of the CLI built on every node")
                .required(false)
                .num_args(1)
                .default_value(provision::DEFAULT_REMOTE_CLI_VERSION),
        )
}

fn string_or_empty(matches: &ArgMatches, id: &str) -> String {
    matches
        .get_one::<String>(id)
        .cloned()
        .unwrap_or_default()
}

pub fn options(matches: &ArgMatches) -> CreateOptions {
    CreateOptions {
        cluster_name: string_or_empty(matches, "CLUSTER_NAME"),
        use_aws: matches.get_flag("AWS"),
        use_gcp: matches.get_flag("GCP"),
        aws_profile: matches
            .get_one::<String>("AWS_PROFILE")
            .cloned()
            .unwrap_or_else(|| provision::DEFAULT_AWS_PROFILE.to_string()),
        gcp_project: string_or_empty(matches, "GCP_PROJECT"),
        gcp_credentials: string_or_empty(matches, "GCP_CREDENTIALS"),
        regions: matches
            .get_many::<String>("REGION")
            .map(|v| v.cloned().collect())
            .unwrap_or_default(),
        num_nodes: matches
            .get_many::<u32>("NUM_NODES")
            .map(|v| v.copied().collect())
            .unwrap_or_default(),
        node_type: matches
            .get_one::<String>("NODE_TYPE")
            .cloned()
            .unwrap_or_else(|| provision::DEFAULT_NODE_TYPE.to_string()),
        use_static_ip: matches.get_flag("USE_STATIC_IP"),
        authorize_access: matches.get_flag("AUTHORIZE_ACCESS"),
        fuji: matches.get_flag("FUJI"),
        devnet: matches.get_flag("DEVNET"),
        alternative_key_pair_name: matches
            .get_one::<String>("ALTERNATIVE_KEY_PAIR_NAME")
            .cloned(),
        latest_avalanchego_version: matches.get_flag("LATEST_AVALANCHEGO_VERSION"),
        avalanchego_version_from_subnet: matches
            .get_one::<String>("AVALANCHEGO_VERSION_FROM_SUBNET")
            .cloned(),
        ssh_timeout: Duration::from_secs(
            *matches.get_one::<u64>("SSH_TIMEOUT_SECONDS").unwrap_or(&300),
        ),
        remote_cli_version: matches
            .get_one::<String>("REMOTE_CLI_VERSION")
            .cloned()
            .unwrap_or_else(|| provision::DEFAULT_REMOTE_CLI_VERSION.to_string()),
        user: env::var("USER").unwrap_or_else(|_| String::from("user")),
    }
}

pub async fn execute(log_level: &str, base_dir: PathBuf, opts: CreateOptions) -> io::Result<()> {
    crate::init_logger(log_level);

    // flag errors surface before anything is asked or called
    opts.validate()?;

    let app = App::new(&base_dir);
    let prompter: Arc<dyn Prompter> = Arc::new(Terminal);
    let cloud = opts.cloud_service(prompter.as_ref())?;
    let cloud_provider: Arc<dyn CloudProvider> = match cloud {
        CloudService::Aws => Arc::new(aws::Manager::new(&opts.aws_profile)),
        CloudService::Gcp => Arc::new(gcp::Manager::new(&opts.gcp_project, &opts.gcp_credentials)),
    };
    let c = Collaborators {
        cloud: cloud_provider,
        infra: Arc::new(terraform::Manager::new(&app.terraform_dir(&opts.cluster_name))),
        ip: Arc::new(Ipify::default()),
        remote: Arc::new(ssh::Manager),
        versions: Arc::new(GitHub),
        prompter,
    };

    execute!(
        stdout(),
        SetForegroundColor(Color::Green),
        Print(format!(
            "\n\n\nSTEP: create cluster '{}' on {} ({} region(s))\n",
            opts.cluster_name,
            cloud,
            opts.regions.len()
        )),
        ResetColor
    )?;

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&term))?;

    let create = provision::create_cluster(&app, &c, &opts, cloud);
    tokio::pin!(create);
    let outcome = loop {
        tokio::select! {
            res = &mut create => break res?,
            _ = sleep(Duration::from_millis(500)) => {
                if term.load(Ordering::Relaxed) {
                    log::warn!("received signal {}", signal_hook::consts::SIGINT);
                    print_interrupted(&app, &opts.cluster_name)?;
                    return Err(Error::new(ErrorKind::Interrupted, "create interrupted"));
                }
            }
        }
    };

    print_outcome(&outcome)?;
    if let Some(e) = outcome.report.to_error() {
        return Err(e.into());
    }

    execute!(
        stdout(),
        SetForegroundColor(Color::Green),
        Print(format!(
            "\nCluster '{}' is ready on {} (inventory '{}')\n",
            opts.cluster_name,
            outcome.network.name(),
            app.inventory_path(&opts.cluster_name)
        )),
        ResetColor
    )?;
    Ok(())
}

fn print_outcome(outcome: &CreateOutcome) -> io::Result<()> {
    println!();
    for h in outcome.hosts.iter() {
        let identity = outcome.report.value(&h.node_id).unwrap_or("-");
        match outcome.report.error(&h.node_id) {
            None => execute!(
                stdout(),
                SetForegroundColor(Color::Green),
                Print(format!("{} ({}) {} CREATED\n", h.node_id, h.ip, identity)),
                ResetColor
            )?,
            Some(e) => execute!(
                stdout(),
                SetForegroundColor(Color::Red),
                Print(format!("{} ({}) {} ERROR: {}\n", h.node_id, h.ip, identity, e)),
                ResetColor
            )?,
        }
    }
    Ok(())
}

/// Tells the operator what may be left running.
fn print_interrupted(app: &App, cluster_name: &str) -> io::Result<()> {
    let instances = app
        .load_clusters_config()
        .ok()
        .and_then(|cfg| cfg.clusters.get(cluster_name).map(|c| c.nodes.clone()))
        .unwrap_or_default();

    println!();
    println!("# interrupted while creating cluster '{}'", cluster_name);
    execute!(
        stdout(),
        SetForegroundColor(Color::Red),
        Print(format!(
            "instances registered so far: {}\nterraform state: {}\nstop any remaining instances manually to avoid further charges\n\n",
            if instances.is_empty() {
                String::from("none")
            } else {
                instances.join(", ")
            },
            app.terraform_dir(cluster_name)
        )),
        ResetColor
    )?;
    Ok(())
}

/// RUST_LOG=debug cargo test --package fleetup --bin fleetup -- create::test_options --exact --show-output
#[test]
fn test_options() {
    let m = command().get_matches_from(vec![
        "create",
        "c1",
        "--aws",
        "--region",
        "us-east-1",
        "--region",
        "us-west-2",
        "--num-nodes",
        "2",
        "--num-nodes",
        "1",
        "--devnet",
        "--ssh-timeout-seconds",
        "60",
    ]);
    let o = options(&m);
    assert_eq!(o.cluster_name, "c1");
    assert!(o.use_aws);
    assert!(!o.use_gcp);
    assert_eq!(o.regions, vec!["us-east-1".to_string(), "us-west-2".to_string()]);
    assert_eq!(o.num_nodes, vec![2, 1]);
    assert!(o.devnet);
    assert_eq!(o.ssh_timeout, Duration::from_secs(60));
    assert_eq!(o.node_type, provision::DEFAULT_NODE_TYPE);
    assert_eq!(o.remote_cli_version, "main");
    assert!(o.validate().is_ok());
}
