//! Cluster provisioning: cloud resources for every region, then the cluster record.
use std::{
    collections::BTreeMap,
    fs,
    net::IpAddr,
    path::Path,
    sync::Arc,
    time::Duration,
};

use crate::{
    app::App,
    bootstrap::{self, BootstrapOptions},
    cloud::{
        CloudProvider, IngressRule, SecurityGroup, ANY_CIDR, AVALANCHEGO_API_PORT,
        AVALANCHEGO_P2P_PORT, SSH_PORT,
    },
    cluster::GcpConfig,
    errors::{Error, Result},
    infra::{ApplyOutput, InfraApplier, InfraSpec, KeyPairPlan, RegionSpec, SecurityGroupPlan},
    inventory,
    ip::IpLookup,
    network::{Kind, Network},
    node::{CloudService, NodeConfig, Role},
    prompt::{self, Prompter},
    remote::{Host, Remote},
    results::Report,
    sidecar::Sidecar,
    versions::{self, VersionSource},
    waiter,
};

pub const DEFAULT_NODE_TYPE: &str = "default";
pub const DEFAULT_AWS_PROFILE: &str = "default";
pub const DEFAULT_REMOTE_CLI_VERSION: &str = "main";
pub const DEFAULT_SSH_TIMEOUT: Duration = Duration::from_secs(300);

/// Options for "create", built by the CLI from its flags.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub cluster_name: String,
    pub use_aws: bool,
    pub use_gcp: bool,
    pub aws_profile: String,
    pub gcp_project: String,
    pub gcp_credentials: String,
    pub regions: Vec<String>,
    pub num_nodes: Vec<u32>,
    pub node_type: String,
    pub use_static_ip: bool,
    pub authorize_access: bool,
    pub fuji: bool,
    pub devnet: bool,
    pub alternative_key_pair_name: Option<String>,
    pub latest_avalanchego_version: bool,
    pub avalanchego_version_from_subnet: Option<String>,
    pub ssh_timeout: Duration,
    pub remote_cli_version: String,
    /// Owner name used to prefix every cloud resource.
    pub user: String,
}

impl Default for CreateOptions {
    fn default() -> Self {
        Self {
            cluster_name: String::new(),
            use_aws: false,
            use_gcp: false,
            aws_profile: DEFAULT_AWS_PROFILE.to_string(),
            gcp_project: String::new(),
            gcp_credentials: String::new(),
            regions: Vec::new(),
            num_nodes: Vec::new(),
            node_type: DEFAULT_NODE_TYPE.to_string(),
            use_static_ip: false,
            authorize_access: false,
            fuji: false,
            devnet: false,
            alternative_key_pair_name: None,
            latest_avalanchego_version: false,
            avalanchego_version_from_subnet: None,
            ssh_timeout: DEFAULT_SSH_TIMEOUT,
            remote_cli_version: DEFAULT_REMOTE_CLI_VERSION.to_string(),
            user: String::from("user"),
        }
    }
}

impl CreateOptions {
    /// Checks every flag combination. Nothing has been touched when this fails.
    pub fn validate(&self) -> Result<()> {
        if self.cluster_name.is_empty() {
            return Err(Error::InvalidName {
                name: self.cluster_name.clone(),
                reason: "cluster name must not be empty".to_string(),
            });
        }
        if self.use_aws && self.use_gcp {
            return Err(Error::flag_conflict("only one of --aws and --gcp may be set"));
        }
        if self.use_gcp && self.aws_profile != DEFAULT_AWS_PROFILE {
            return Err(Error::flag_conflict("--aws-profile can not be used with --gcp"));
        }
        if self.use_aws && !self.gcp_credentials.is_empty() {
            return Err(Error::flag_conflict(
                "--gcp-credentials can not be used with --aws",
            ));
        }
        if self.latest_avalanchego_version && self.avalanchego_version_from_subnet.is_some() {
            return Err(Error::flag_conflict(
                "--latest-avalanchego-version and --avalanchego-version-from-subnet are mutually exclusive",
            ));
        }
        if self.fuji && self.devnet {
            return Err(Error::flag_conflict("only one of --fuji and --devnet may be set"));
        }
        if self.regions.len() != self.num_nodes.len() {
            return Err(Error::RegionNodeCountMismatch {
                regions: self.regions.len(),
                num_nodes: self.num_nodes.len(),
            });
        }
        if self.regions.is_empty() {
            return Err(Error::flag_conflict("at least one --region is required"));
        }
        if let Some(i) = self.num_nodes.iter().position(|n| *n == 0) {
            return Err(Error::flag_conflict(format!(
                "--num-nodes for region {} must be at least 1",
                self.regions[i]
            )));
        }
        Ok(())
    }

    /// Provider from the flags, or asked for.
    pub fn cloud_service(&self, prompter: &dyn Prompter) -> Result<CloudService> {
        if self.use_aws {
            return Ok(CloudService::Aws);
        }
        if self.use_gcp {
            return Ok(CloudService::Gcp);
        }
        prompt::select(
            prompter,
            "Which cloud service would you like to launch your Avalanche Node(s) in?",
            &[CloudService::Aws, CloudService::Gcp],
        )
    }

    pub fn network_kind(&self) -> Kind {
        if self.devnet {
            Kind::Devnet
        } else {
            Kind::Fuji
        }
    }

    pub fn node_type_for(&self, cloud: CloudService) -> String {
        if self.node_type == DEFAULT_NODE_TYPE || self.node_type.is_empty() {
            cloud.default_node_type().to_string()
        } else {
            self.node_type.clone()
        }
    }
}

/// Asks for access authorization unless it was given by flag.
pub async fn ensure_authorized(opts: &CreateOptions, prompter: &Arc<dyn Prompter>) -> Result<()> {
    if opts.authorize_access {
        return Ok(());
    }
    let ok = prompt::blocking(prompter, |p| {
        p.capture_yes_no(
            "Do you authorize this tool to access your cloud account and the created nodes over SSH?",
        )
    })
    .await?;
    if !ok {
        return Err(Error::other("access authorization was not given"));
    }
    Ok(())
}

/// Names of every per-region resource.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RegionNames {
    pub prefix: String,
    pub key_pair: String,
    pub cert_name: String,
    pub security_group: String,
}

pub fn region_names(user: &str, region: &str, alternative_key_pair_name: Option<&str>) -> RegionNames {
    let prefix = format!("{user}-{region}-avalanche-cli");
    let key_pair = match alternative_key_pair_name {
        Some(n) if !n.is_empty() => n.to_string(),
        _ => format!("{prefix}-{region}"),
    };
    RegionNames {
        cert_name: cert_name(&key_pair),
        security_group: format!("{prefix}-{region}-sg"),
        key_pair,
        prefix,
    }
}

pub fn cert_name(key_pair: &str) -> String {
    format!("{key_pair}-kp.pem")
}

/// Outcome of the cloud × local key pair check.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum KeyPairAction {
    Create,
    Reuse,
    /// Cloud has the name but the private key is gone; pick another name.
    Rename,
    Import,
}

pub fn decide_key_pair(in_cloud: bool, local: bool) -> KeyPairAction {
    match (in_cloud, local) {
        (false, false) => KeyPairAction::Create,
        (true, true) => KeyPairAction::Reuse,
        (true, false) => KeyPairAction::Rename,
        (false, true) => KeyPairAction::Import,
    }
}

fn operator_cidr(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{v4}/32"),
        IpAddr::V6(v6) => format!("{v6}/128"),
    }
}

/// Rules scoped to the operator: SSH and the node API.
pub fn operator_ingress(operator_ip: IpAddr) -> Vec<IngressRule> {
    let cidr = operator_cidr(operator_ip);
    vec![
        IngressRule::new(SSH_PORT, &cidr),
        IngressRule::new(AVALANCHEGO_API_PORT, &cidr),
    ]
}

/// Creates the group with every rule, or adds the operator rules it lacks.
pub fn security_group_plan(
    existing: Option<&SecurityGroup>,
    name: &str,
    operator_ip: IpAddr,
) -> SecurityGroupPlan {
    let operator = operator_ingress(operator_ip);
    match existing {
        None => {
            let mut ingress = operator;
            ingress.push(IngressRule::new(AVALANCHEGO_API_PORT, ANY_CIDR));
            ingress.push(IngressRule::new(AVALANCHEGO_P2P_PORT, ANY_CIDR));
            SecurityGroupPlan::Create {
                name: name.to_string(),
                ingress,
            }
        }
        Some(sg) => SecurityGroupPlan::Extend {
            id: sg.id.clone(),
            name: sg.name.clone(),
            ingress: operator.into_iter().filter(|r| !sg.allows(r)).collect(),
        },
    }
}

/// One instance after a successful apply.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProvisionedNode {
    pub instance_id: String,
    pub region: String,
    pub ip: String,
    pub image_id: String,
    pub key_pair: String,
    pub cert_path: String,
    pub security_group: String,
    pub static_ip: bool,
}

/// Drives cloud and infra collaborators for one "create".
pub struct Orchestrator<'a> {
    pub app: &'a App,
    pub cloud: &'a dyn CloudProvider,
    pub infra: &'a dyn InfraApplier,
    pub ip: &'a dyn IpLookup,
    pub prompter: Arc<dyn Prompter>,
}

impl<'a> Orchestrator<'a> {
    /// Reserves or reuses the region's key pair.
    pub async fn key_pair_plan(&self, region: &str, key_pair: &str) -> Result<KeyPairPlan> {
        let mut name = key_pair.to_string();
        loop {
            let cert_path = self.app.ssh_cert_path(&cert_name(&name));
            let in_cloud = self.cloud.key_pair_exists(region, &name).await?;
            let local = Path::new(&cert_path).exists();
            log::info!(
                "key pair '{}' in {}: in cloud {}, local {}",
                name,
                region,
                in_cloud,
                local
            );
            match decide_key_pair(in_cloud, local) {
                KeyPairAction::Create => return Ok(KeyPairPlan::Create { name, cert_path }),
                KeyPairAction::Reuse => return Ok(KeyPairPlan::Reuse { name, cert_path }),
                KeyPairAction::Import => return Ok(KeyPairPlan::Import { name, cert_path }),
                KeyPairAction::Rename => {
                    let msg = format!(
                        "Key pair '{}' exists in {} but its private key is not in '{}'",
                        name,
                        region,
                        self.app.ssh_dir()
                    );
                    let new_name = prompt::blocking(&self.prompter, move |p| {
                        p.info(&msg);
                        p.capture_string("Enter a new name for the key pair to create")
                    })
                    .await?;
                    let new_name = new_name.trim().to_string();
                    if new_name.is_empty() {
                        return Err(Error::Prompt {
                            message: "key pair name must not be empty".to_string(),
                        });
                    }
                    name = new_name;
                }
            }
        }
    }

    /// Builds the full infra spec. Only reads from the cloud.
    pub async fn plan(
        &self,
        opts: &CreateOptions,
        cloud: CloudService,
        operator_ip: IpAddr,
    ) -> Result<InfraSpec> {
        let mut regions = Vec::new();
        for (region, count) in opts.regions.iter().zip(opts.num_nodes.iter()) {
            log::info!("planning {} node(s) in {}", count, region);
            let names = region_names(&opts.user, region, opts.alternative_key_pair_name.as_deref());
            let image_id = self.cloud.image_id(region).await?;
            let key_pair = self.key_pair_plan(region, &names.key_pair).await?;
            let existing = self.cloud.security_group(region, &names.security_group).await?;
            let security_group =
                security_group_plan(existing.as_ref(), &names.security_group, operator_ip);
            regions.push(RegionSpec {
                region: region.clone(),
                image_id,
                node_type: opts.node_type_for(cloud),
                count: *count,
                key_pair,
                security_group,
                static_ip: opts.use_static_ip,
                instance_prefix: names.prefix,
            });
        }
        Ok(InfraSpec {
            cloud,
            aws_profile: opts.aws_profile.clone(),
            gcp_project: opts.gcp_project.clone(),
            gcp_credentials: opts.gcp_credentials.clone(),
            regions,
        })
    }

    /// Plans, applies and resolves public IPs. Cleans up after a failed apply.
    pub async fn provision(
        &self,
        opts: &CreateOptions,
        cloud: CloudService,
    ) -> Result<Vec<ProvisionedNode>> {
        opts.validate()?;

        let operator_ip = self.ip.public_ip().await?;
        let spec = self.plan(opts, cloud, operator_ip).await?;

        fs::create_dir_all(self.app.ssh_dir())?;
        let out = match self.infra.apply(&spec).await {
            Ok(out) => out,
            Err(e) => return Err(self.teardown(e).await),
        };

        let ips = resolve_public_ips(self.cloud, &spec, &out).await?;
        let mut nodes = Vec::new();
        for r in spec.regions.iter() {
            for id in out.instance_ids.get(&r.region).into_iter().flatten() {
                let ip = ips.get(id).cloned().ok_or_else(|| Error::Cloud {
                    region: r.region.clone(),
                    message: format!("no public IP for instance {}", id),
                })?;
                nodes.push(ProvisionedNode {
                    instance_id: id.clone(),
                    region: r.region.clone(),
                    ip,
                    image_id: r.image_id.clone(),
                    key_pair: r.key_pair.name().to_string(),
                    cert_path: r.key_pair.cert_path().to_string(),
                    security_group: r.security_group.name().to_string(),
                    static_ip: r.static_ip,
                });
            }
        }
        Ok(nodes)
    }

    /// Stops every instance the failed apply left behind.
    /// Returns the error to surface: the instances that could not be stopped,
    /// or the original cause when all of them were.
    pub async fn teardown(&self, cause: Error) -> Error {
        log::warn!("infra apply failed ({}), stopping created instances", cause);
        let created = match self.infra.created_instances().await {
            Ok(c) => c,
            Err(e) => {
                return Error::Infra {
                    message: format!(
                        "{}; also failed to list the created instances, check the cloud console ({})",
                        cause, e
                    ),
                }
            }
        };

        let mut failed = BTreeMap::new();
        for (region, ids) in created.iter() {
            for id in ids {
                if let Err(e) = self.cloud.stop_instance(region, id).await {
                    log::warn!("failed to stop {} in {}: {}", id, region, e);
                    failed.insert(id.clone(), e.to_string());
                }
            }
        }
        if failed.is_empty() {
            return cause;
        }
        Error::TeardownIncomplete {
            failed,
            cause: cause.to_string(),
        }
    }
}

/// Static IPs come from the apply outputs; dynamic ones from the cloud.
pub async fn resolve_public_ips(
    cloud: &dyn CloudProvider,
    spec: &InfraSpec,
    out: &ApplyOutput,
) -> Result<BTreeMap<String, String>> {
    let mut ips = BTreeMap::new();
    for r in spec.regions.iter() {
        let ids = out.instance_ids.get(&r.region).cloned().unwrap_or_default();
        if r.static_ip {
            let static_ips = out.static_ips.get(&r.region).cloned().unwrap_or_default();
            if static_ips.len() != ids.len() {
                return Err(Error::Infra {
                    message: format!(
                        "{} has {} instance(s) but {} static IP(s)",
                        r.region,
                        ids.len(),
                        static_ips.len()
                    ),
                });
            }
            ips.extend(ids.into_iter().zip(static_ips));
        } else {
            ips.extend(cloud.public_ips(&r.region, &ids).await?);
        }
    }
    Ok(ips)
}

/// Persists the Node Records, cluster entry, key pairs and inventory.
/// Each store is written right after it changes.
/// Instances the cluster already has are left alone; the returned
/// records and hosts cover only the ones added by this run.
pub fn register_cluster(
    app: &App,
    opts: &CreateOptions,
    cloud: CloudService,
    nodes: &[ProvisionedNode],
) -> Result<(Network, Vec<NodeConfig>, Vec<Host>)> {
    let mut clusters = app.load_clusters_config()?;
    let existing = clusters.clusters.get(&opts.cluster_name).cloned();
    let nodes: Vec<&ProvisionedNode> = nodes
        .iter()
        .filter(|n| {
            let known = existing
                .as_ref()
                .map_or(false, |c| c.nodes.iter().any(|id| *id == n.instance_id));
            if known {
                log::info!(
                    "instance {} is already in cluster '{}', skipping",
                    n.instance_id,
                    opts.cluster_name
                );
            }
            !known
        })
        .collect();

    let network = match (&existing, opts.network_kind()) {
        (Some(c), _) => c.network.clone(),
        (None, Kind::Devnet) => {
            let first = nodes
                .first()
                .ok_or_else(|| Error::other("no node was provisioned"))?;
            Network::devnet(&format!("http://{}:{}", first.ip, AVALANCHEGO_API_PORT))
        }
        (None, _) => Network::fuji(),
    };
    if cloud == CloudService::Gcp {
        clusters.gcp = Some(GcpConfig {
            project_name: opts.gcp_project.clone(),
            service_account_file_path: opts.gcp_credentials.clone(),
        });
    }

    let mut configs = Vec::new();
    let mut hosts = Vec::new();
    for n in nodes {
        let cert_path = clusters.register_key_pair(&n.key_pair, &n.cert_path);
        let cfg = NodeConfig {
            node_id: n.instance_id.clone(),
            region: n.region.clone(),
            ami: n.image_id.clone(),
            key_pair: n.key_pair.clone(),
            cert_path: cert_path.clone(),
            security_group: n.security_group.clone(),
            elastic_ip: if n.static_ip { n.ip.clone() } else { String::new() },
            cloud_service: cloud,
            use_static_ip: n.static_ip,
            node_identity: None,
            roles: vec![Role::Validator],
        };
        app.write_node_config(&cfg)?;

        clusters.add_node(&opts.cluster_name, &network, &n.instance_id);
        app.write_clusters_config(&clusters)?;

        hosts.push(Host::new(cloud, &n.instance_id, &n.ip, &cert_path));
        configs.push(cfg);
    }

    let inventory_path = app.inventory_path(&opts.cluster_name);
    let mut all_hosts: Vec<Host> = if existing.is_some() && Path::new(&inventory_path).exists() {
        inventory::read(&inventory_path)?
    } else {
        Vec::new()
    };
    all_hosts.retain(|h| !hosts.iter().any(|n| n.node_id == h.node_id));
    all_hosts.extend(hosts.iter().cloned());
    inventory::write(&inventory_path, &all_hosts)?;

    Ok((network, configs, hosts))
}

/// AvalancheGo version to install: latest release, the one matching a subnet, or the default.
pub async fn resolve_avalanchego_version(
    app: &App,
    versions: &dyn VersionSource,
    opts: &CreateOptions,
) -> Result<String> {
    if opts.latest_avalanchego_version {
        return versions
            .latest_release(versions::AVA_LABS_ORG, versions::AVALANCHEGO_REPO)
            .await;
    }
    if let Some(subnet) = &opts.avalanchego_version_from_subnet {
        let sc = Sidecar::load(&app.sidecar_path(subnet))?;
        return versions.avalanchego_for_rpc(sc.rpc_version).await;
    }
    Ok(versions::DEFAULT_AVALANCHEGO_VERSION.to_string())
}

/// Everything "create" talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub cloud: Arc<dyn CloudProvider>,
    pub infra: Arc<dyn InfraApplier>,
    pub ip: Arc<dyn IpLookup>,
    pub remote: Arc<dyn Remote>,
    pub versions: Arc<dyn VersionSource>,
    pub prompter: Arc<dyn Prompter>,
}

/// Result of a "create" that got as far as bootstrapping.
#[derive(Debug)]
pub struct CreateOutcome {
    pub network: Network,
    pub nodes: Vec<NodeConfig>,
    pub hosts: Vec<Host>,
    /// Per-host outcome keyed by host alias; values are node identities.
    pub report: Report,
}

/// Provisions the cluster, waits for it, bootstraps every node and, for
/// Devnet, wires the nodes to each other.
pub async fn create_cluster(
    app: &App,
    c: &Collaborators,
    opts: &CreateOptions,
    cloud: CloudService,
) -> Result<CreateOutcome> {
    opts.validate()?;
    ensure_authorized(opts, &c.prompter).await?;

    let orchestrator = Orchestrator {
        app,
        cloud: c.cloud.as_ref(),
        infra: c.infra.as_ref(),
        ip: c.ip.as_ref(),
        prompter: Arc::clone(&c.prompter),
    };
    let provisioned = orchestrator.provision(opts, cloud).await?;
    let (network, nodes, hosts) = register_cluster(app, opts, cloud, &provisioned)?;
    log::info!(
        "cluster '{}' has {} node(s) on {}",
        opts.cluster_name,
        nodes.len(),
        network.name()
    );

    let reachable = waiter::wait_for_hosts(
        Arc::clone(&c.remote),
        hosts.clone(),
        opts.ssh_timeout,
        waiter::DEFAULT_POLL_INTERVAL,
    )
    .await;
    if let Some(e) = reachable.to_error() {
        log::warn!("unreachable hosts: {:?}", reachable.failed_nodes());
        return Err(e);
    }

    let avalanchego_version = resolve_avalanchego_version(app, c.versions.as_ref(), opts).await?;
    let bopts = BootstrapOptions {
        avalanchego_version,
        cli_version: opts.remote_cli_version.clone(),
        network: network.clone(),
        step_timeout: bootstrap::DEFAULT_STEP_TIMEOUT,
    };
    let mut report = bootstrap::bootstrap(app, Arc::clone(&c.remote), hosts.clone(), &bopts).await;

    if network.kind == Kind::Devnet {
        if report.has_errors() {
            log::warn!("skipping devnet configuration, some nodes failed to bootstrap");
        } else {
            report = bootstrap::configure_devnet(
                app,
                Arc::clone(&c.remote),
                hosts.clone(),
                &report,
                &bopts,
            )
            .await;
        }
    }

    let nodes = nodes
        .iter()
        .map(|n| app.load_node_config(&n.node_id).unwrap_or_else(|_| n.clone()))
        .collect();
    Ok(CreateOutcome {
        network,
        nodes,
        hosts,
        report,
    })
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- provision::test_validate --exact --show-output
#[test]
fn test_validate() {
    let ok = CreateOptions {
        cluster_name: "c1".to_string(),
        use_aws: true,
        regions: vec!["us-east-1".to_string()],
        num_nodes: vec![2],
        fuji: true,
        ..Default::default()
    };
    assert!(ok.validate().is_ok());

    let e = CreateOptions {
        regions: vec!["us-east-1".to_string(), "us-west-2".to_string()],
        ..ok.clone()
    }
    .validate()
    .unwrap_err();
    assert!(matches!(
        e,
        Error::RegionNodeCountMismatch {
            regions: 2,
            num_nodes: 1
        }
    ));

    for bad in [
        CreateOptions { use_gcp: true, ..ok.clone() },
        CreateOptions { devnet: true, ..ok.clone() },
        CreateOptions { gcp_credentials: "/tmp/c.json".to_string(), ..ok.clone() },
        CreateOptions {
            latest_avalanchego_version: true,
            avalanchego_version_from_subnet: Some("s".to_string()),
            ..ok.clone()
        },
        CreateOptions {
            use_aws: false,
            use_gcp: true,
            aws_profile: "prod".to_string(),
            ..ok.clone()
        },
        CreateOptions { num_nodes: vec![0], ..ok.clone() },
    ] {
        assert!(matches!(bad.validate(), Err(Error::FlagConflict { .. })), "{bad:?}");
    }

    assert_eq!(ok.node_type_for(CloudService::Aws), "c5.2xlarge");
    assert_eq!(ok.node_type_for(CloudService::Gcp), "e2-standard-8");
    assert_eq!(ok.network_kind(), Kind::Fuji);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- provision::test_region_names --exact --show-output
#[test]
fn test_region_names() {
    let n = region_names("alice", "us-east-1", None);
    assert_eq!(n.prefix, "alice-us-east-1-avalanche-cli");
    assert_eq!(n.key_pair, "alice-us-east-1-avalanche-cli-us-east-1");
    assert_eq!(n.cert_name, "alice-us-east-1-avalanche-cli-us-east-1-kp.pem");
    assert_eq!(n.security_group, "alice-us-east-1-avalanche-cli-us-east-1-sg");

    let n = region_names("alice", "us-east-1", Some("mine"));
    assert_eq!(n.key_pair, "mine");
    assert_eq!(n.cert_name, "mine-kp.pem");
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- provision::test_decide_key_pair --exact --show-output
#[test]
fn test_decide_key_pair() {
    assert_eq!(decide_key_pair(false, false), KeyPairAction::Create);
    assert_eq!(decide_key_pair(true, true), KeyPairAction::Reuse);
    assert_eq!(decide_key_pair(true, false), KeyPairAction::Rename);
    assert_eq!(decide_key_pair(false, true), KeyPairAction::Import);
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- provision::test_security_group_plan --exact --show-output
#[test]
fn test_security_group_plan() {
    use crate::cloud::IngressPermission;

    let ip: IpAddr = "203.0.113.7".parse().unwrap();

    match security_group_plan(None, "sg", ip) {
        SecurityGroupPlan::Create { name, ingress } => {
            assert_eq!(name, "sg");
            assert_eq!(
                ingress,
                vec![
                    IngressRule::new(22, "203.0.113.7/32"),
                    IngressRule::new(9650, "203.0.113.7/32"),
                    IngressRule::new(9650, ANY_CIDR),
                    IngressRule::new(9651, ANY_CIDR),
                ]
            );
        }
        other => panic!("unexpected {other:?}"),
    }

    // existing group already allows SSH from the operator
    let existing = SecurityGroup {
        id: "sg-1".to_string(),
        name: "sg".to_string(),
        ingress: vec![
            IngressPermission::new(22, 22, "203.0.113.7/32"),
            IngressPermission::new(9650, 9651, ANY_CIDR),
        ],
    };
    match security_group_plan(Some(&existing), "sg", ip) {
        SecurityGroupPlan::Extend { id, ingress, .. } => {
            assert_eq!(id, "sg-1");
            assert_eq!(ingress, vec![IngressRule::new(9650, "203.0.113.7/32")]);
        }
        other => panic!("unexpected {other:?}"),
    }
}
