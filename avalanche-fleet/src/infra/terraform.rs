use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    os::unix::fs::PermissionsExt,
    path::Path,
    time::Duration,
};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::{
    cloud::ANY_CIDR,
    errors::{Error, Result},
    exec,
    infra::{ApplyOutput, InfraApplier, InfraSpec, KeyPairPlan, RegionSpec, SecurityGroupPlan},
    node::CloudService,
};

pub const MAIN_FILE: &str = "main.tf.json";

pub const ROOT_VOLUME_SIZE_GB: u32 = 1000;

const INIT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const APPLY_TIMEOUT: Duration = Duration::from_secs(30 * 60);
const QUERY_TIMEOUT: Duration = Duration::from_secs(2 * 60);

pub fn output_instance_ids(region: &str) -> String {
    format!("instance_ids_{region}")
}

pub fn output_instance_ips(region: &str) -> String {
    format!("instance_ips_{region}")
}

pub fn output_instance_regions(region: &str) -> String {
    format!("instance_regions_{region}")
}

/// Terraform identifiers can't have dashes in resource names we reference with "aws.<alias>".
fn ident(region: &str) -> String {
    region.replace('-', "_")
}

/// Private key generated for the region, relative to the working directory.
pub fn generated_key_file(region: &str) -> String {
    format!("kp_{}.pem", ident(region))
}

/// Accumulates "resource", "data" and "output" blocks.
#[derive(Default)]
struct Doc {
    resource: Map<String, Value>,
    data: Map<String, Value>,
    output: Map<String, Value>,
}

impl Doc {
    fn resource(&mut self, kind: &str, name: &str, body: Value) {
        insert_nested(&mut self.resource, kind, name, body);
    }

    fn data(&mut self, kind: &str, name: &str, body: Value) {
        insert_nested(&mut self.data, kind, name, body);
    }

    fn output(&mut self, name: String, value: Value) {
        self.output.insert(name, json!({ "value": value }));
    }
}

fn insert_nested(m: &mut Map<String, Value>, kind: &str, name: &str, body: Value) {
    let entry = m
        .entry(kind.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(inner) = entry {
        inner.insert(name.to_string(), body);
    }
}

/// Declares the key material; returns the public key expression, if one is needed.
fn render_key(doc: &mut Doc, id: &str, plan: &KeyPairPlan) -> Option<String> {
    let kp = format!("kp_{id}");
    match plan {
        KeyPairPlan::Create { .. } => {
            doc.resource(
                "tls_private_key",
                &kp,
                json!({ "algorithm": "RSA", "rsa_bits": 4096 }),
            );
            doc.resource(
                "local_sensitive_file",
                &kp,
                json!({
                    "content": format!("${{tls_private_key.{kp}.private_key_pem}}"),
                    "filename": format!("{kp}.pem"),
                    "file_permission": "0400",
                }),
            );
            Some(format!("${{tls_private_key.{kp}.public_key_openssh}}"))
        }
        KeyPairPlan::Import { cert_path, .. } => {
            doc.data(
                "tls_public_key",
                &kp,
                json!({ "private_key_pem": format!("${{file(\"{cert_path}\")}}") }),
            );
            Some(format!("${{data.tls_public_key.{kp}.public_key_openssh}}"))
        }
        KeyPairPlan::Reuse { .. } => None,
    }
}

fn render_aws_region(doc: &mut Doc, r: &RegionSpec) {
    let id = ident(&r.region);
    let provider = format!("aws.{id}");
    let kp = format!("kp_{id}");
    let sg = format!("sg_{id}");
    let node = format!("node_{id}");
    let eip = format!("eip_{id}");

    let key_name = match render_key(doc, &id, &r.key_pair) {
        Some(public_key) => {
            doc.resource(
                "aws_key_pair",
                &kp,
                json!({
                    "provider": provider,
                    "key_name": r.key_pair.name(),
                    "public_key": public_key,
                }),
            );
            format!("${{aws_key_pair.{kp}.key_name}}")
        }
        None => r.key_pair.name().to_string(),
    };

    let sg_id = match &r.security_group {
        SecurityGroupPlan::Create { name, .. } => {
            doc.resource(
                "aws_security_group",
                &sg,
                json!({
                    "provider": provider,
                    "name": name,
                    "description": "avalanche validator nodes",
                }),
            );
            doc.resource(
                "aws_security_group_rule",
                &format!("{sg}_egress"),
                json!({
                    "provider": provider,
                    "type": "egress",
                    "from_port": 0,
                    "to_port": 0,
                    "protocol": "-1",
                    "cidr_blocks": [ANY_CIDR],
                    "security_group_id": format!("${{aws_security_group.{sg}.id}}"),
                }),
            );
            format!("${{aws_security_group.{sg}.id}}")
        }
        SecurityGroupPlan::Extend { id, .. } => id.clone(),
    };
    for (i, rule) in r.security_group.ingress().iter().enumerate() {
        doc.resource(
            "aws_security_group_rule",
            &format!("{sg}_ingress_{i}"),
            json!({
                "provider": provider,
                "type": "ingress",
                "from_port": rule.port,
                "to_port": rule.port,
                "protocol": "tcp",
                "cidr_blocks": [rule.cidr],
                "security_group_id": sg_id,
            }),
        );
    }

    doc.resource(
        "aws_instance",
        &node,
        json!({
            "provider": provider,
            "count": r.count,
            "ami": r.image_id,
            "instance_type": r.node_type,
            "key_name": key_name,
            "vpc_security_group_ids": [sg_id],
            "root_block_device": { "volume_size": ROOT_VOLUME_SIZE_GB, "volume_type": "gp3" },
            "tags": {
                "Name": format!("${{format(\"{}-%d\", count.index)}}", r.instance_prefix),
                "Region": r.region,
                "Managed-By": "avalanche-fleet",
            },
        }),
    );

    doc.output(
        output_instance_ids(&r.region),
        json!(format!("${{aws_instance.{node}[*].id}}")),
    );
    doc.output(
        output_instance_regions(&r.region),
        json!(vec![r.region.clone(); r.count as usize]),
    );

    if r.static_ip {
        doc.resource(
            "aws_eip",
            &eip,
            json!({
                "provider": provider,
                "count": r.count,
                "domain": "vpc",
                "tags": { "Region": r.region, "Managed-By": "avalanche-fleet" },
            }),
        );
        doc.resource(
            "aws_eip_association",
            &eip,
            json!({
                "provider": provider,
                "count": r.count,
                "instance_id": format!("${{aws_instance.{node}[count.index].id}}"),
                "allocation_id": format!("${{aws_eip.{eip}[count.index].id}}"),
            }),
        );
        doc.output(
            output_instance_ips(&r.region),
            json!(format!("${{aws_eip.{eip}[*].public_ip}}")),
        );
    }
}

/// "us-east1-b" is in region "us-east1".
fn gcp_region_of_zone(zone: &str) -> &str {
    match zone.rfind('-') {
        Some(i) if zone[..i].contains('-') => &zone[..i],
        _ => zone,
    }
}

fn render_gcp_region(doc: &mut Doc, r: &RegionSpec) {
    let id = ident(&r.region);
    let provider = format!("google.{id}");
    let sg = format!("sg_{id}");
    let node = format!("node_{id}");
    let eip = format!("eip_{id}");

    let ssh_keys = render_key(doc, &id, &r.key_pair)
        .map(|public_key| format!("ubuntu:{public_key} {}", r.key_pair.name()));

    // one firewall per source range
    let mut by_cidr: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for rule in r.security_group.ingress() {
        by_cidr
            .entry(rule.cidr.as_str())
            .or_default()
            .push(rule.port.to_string());
    }
    for (i, (cidr, ports)) in by_cidr.into_iter().enumerate() {
        let name = match (&r.security_group, cidr == ANY_CIDR) {
            (SecurityGroupPlan::Create { name, .. }, false) => name.clone(),
            (SecurityGroupPlan::Create { name, .. }, true) => format!("{name}-public"),
            (SecurityGroupPlan::Extend { name, .. }, _) => format!("{name}-ext-{i}"),
        };
        doc.resource(
            "google_compute_firewall",
            &format!("{sg}_{i}"),
            json!({
                "provider": provider,
                "name": name,
                "network": "default",
                "allow": [{ "protocol": "tcp", "ports": ports }],
                "source_ranges": [cidr],
            }),
        );
    }

    let access_config = if r.static_ip {
        doc.resource(
            "google_compute_address",
            &eip,
            json!({
                "provider": provider,
                "count": r.count,
                "name": format!("${{format(\"{}-ip-%d\", count.index)}}", r.instance_prefix),
                "region": gcp_region_of_zone(&r.region),
            }),
        );
        doc.output(
            output_instance_ips(&r.region),
            json!(format!("${{google_compute_address.{eip}[*].address}}")),
        );
        json!({ "nat_ip": format!("${{google_compute_address.{eip}[count.index].address}}") })
    } else {
        json!({})
    };

    let mut instance = json!({
        "provider": provider,
        "count": r.count,
        "name": format!("${{format(\"{}-%d\", count.index)}}", r.instance_prefix),
        "machine_type": r.node_type,
        "zone": r.region,
        "boot_disk": {
            "initialize_params": { "image": r.image_id, "size": ROOT_VOLUME_SIZE_GB },
        },
        "network_interface": { "network": "default", "access_config": access_config },
        "labels": { "region": r.region, "managed-by": "avalanche-fleet" },
    });
    if let (Some(keys), Value::Object(m)) = (ssh_keys, &mut instance) {
        m.insert("metadata".to_string(), json!({ "ssh-keys": keys }));
    }
    doc.resource("google_compute_instance", &node, instance);

    doc.output(
        output_instance_ids(&r.region),
        json!(format!("${{google_compute_instance.{node}[*].name}}")),
    );
    doc.output(
        output_instance_regions(&r.region),
        json!(vec![r.region.clone(); r.count as usize]),
    );
}

/// Renders the infra spec in Terraform's JSON syntax.
/// ref. https://developer.hashicorp.com/terraform/language/syntax/json
pub fn render(spec: &InfraSpec) -> Value {
    let mut doc = Doc::default();
    let mut providers = Vec::new();
    for r in spec.regions.iter() {
        match spec.cloud {
            CloudService::Aws => {
                providers.push(json!({
                    "alias": ident(&r.region),
                    "region": r.region,
                    "profile": spec.aws_profile,
                }));
                render_aws_region(&mut doc, r);
            }
            CloudService::Gcp => {
                let mut p = json!({
                    "alias": ident(&r.region),
                    "project": spec.gcp_project,
                    "zone": r.region,
                });
                if !spec.gcp_credentials.is_empty() {
                    if let Value::Object(m) = &mut p {
                        m.insert(
                            "credentials".to_string(),
                            json!(format!("${{file(\"{}\")}}", spec.gcp_credentials)),
                        );
                    }
                }
                providers.push(p);
                render_gcp_region(&mut doc, r);
            }
        }
    }

    let (provider_name, source) = match spec.cloud {
        CloudService::Aws => ("aws", "hashicorp/aws"),
        CloudService::Gcp => ("google", "hashicorp/google"),
    };
    let mut root = json!({
        "terraform": {
            "required_providers": {
                provider_name: { "source": source },
                "tls": { "source": "hashicorp/tls" },
                "local": { "source": "hashicorp/local" },
            }
        },
        "provider": { provider_name: providers },
        "resource": Value::Object(doc.resource),
        "output": Value::Object(doc.output),
    });
    if !doc.data.is_empty() {
        if let Value::Object(m) = &mut root {
            m.insert("data".to_string(), Value::Object(doc.data));
        }
    }
    root
}

fn string_list(v: &Value) -> Vec<String> {
    v.as_array()
        .into_iter()
        .flatten()
        .filter_map(|s| s.as_str().map(String::from))
        .collect()
}

/// Parses "terraform output -json" for the given regions.
pub fn parse_outputs(v: &Value, regions: &[String]) -> Result<ApplyOutput> {
    let mut out = ApplyOutput::default();
    for region in regions {
        let ids = &v[output_instance_ids(region)]["value"];
        if !ids.is_array() {
            return Err(Error::Infra {
                message: format!("missing output {}", output_instance_ids(region)),
            });
        }
        out.instance_ids.insert(region.clone(), string_list(ids));

        let ips = &v[output_instance_ips(region)]["value"];
        if ips.is_array() {
            out.static_ips.insert(region.clone(), string_list(ips));
        }
    }
    Ok(out)
}

/// Parses "terraform show -json" into instance IDs per region.
pub fn parse_state_instances(v: &Value) -> BTreeMap<String, Vec<String>> {
    let mut found: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let resources = v["values"]["root_module"]["resources"].as_array();
    for res in resources.into_iter().flatten() {
        let values = &res["values"];
        let (id, region) = match res["type"].as_str() {
            Some("aws_instance") => (values["id"].as_str(), values["tags"]["Region"].as_str()),
            Some("google_compute_instance") => {
                (values["name"].as_str(), values["labels"]["region"].as_str())
            }
            _ => continue,
        };
        if let (Some(id), Some(region)) = (id, region) {
            found
                .entry(region.to_string())
                .or_default()
                .push(id.to_string());
        }
    }
    found
}

/// Runs the "terraform" CLI in a per-cluster working directory.
/// Every apply starts from an empty directory, so resources of earlier
/// runs are never in the state and never planned for destruction.
#[derive(Debug, Clone)]
pub struct Manager {
    pub dir: String,
}

impl Manager {
    pub fn new(dir: &str) -> Self {
        Self {
            dir: dir.to_string(),
        }
    }

    async fn terraform(&self, args: &[&str], limit: Duration) -> Result<String> {
        let mut full = exec::args(args);
        full.push("-no-color".to_string());
        let out = exec::run("terraform", &full, Some(&self.dir), None, limit)
            .await
            .map_err(|e| Error::Infra {
                message: e.to_string(),
            })?;
        Ok(out.stdout)
    }

    /// Clears the state of any earlier run and writes the configuration.
    pub fn prepare(&self, spec: &InfraSpec) -> Result<String> {
        if Path::new(&self.dir).exists() {
            log::info!("removing previous terraform working directory '{}'", self.dir);
            fs::remove_dir_all(&self.dir)?;
        }
        fs::create_dir_all(&self.dir)?;
        let p = Path::new(&self.dir).join(MAIN_FILE);
        let d = serde_json::to_vec_pretty(&render(spec))?;
        let mut f = File::create(&p)?;
        f.write_all(&d)?;
        Ok(p.display().to_string())
    }

    /// Copies each generated private key to its key pair's cert path.
    /// An existing cert is never replaced.
    pub fn install_generated_keys(&self, spec: &InfraSpec) -> Result<()> {
        for r in spec.regions.iter() {
            let cert_path = match &r.key_pair {
                KeyPairPlan::Create { cert_path, .. } => cert_path,
                _ => continue,
            };
            let generated = Path::new(&self.dir).join(generated_key_file(&r.region));
            if !generated.exists() {
                continue;
            }
            if Path::new(cert_path).exists() {
                return Err(Error::Infra {
                    message: format!(
                        "'{}' already exists, generated key left at '{}'",
                        cert_path,
                        generated.display()
                    ),
                });
            }
            if let Some(parent_dir) = Path::new(cert_path).parent() {
                fs::create_dir_all(parent_dir)?;
            }
            log::info!("installing key pair '{}' to '{}'", r.key_pair.name(), cert_path);
            fs::copy(&generated, cert_path)?;
            fs::set_permissions(cert_path, PermissionsExt::from_mode(0o400))?;
        }
        Ok(())
    }
}

#[async_trait]
impl InfraApplier for Manager {
    async fn apply(&self, spec: &InfraSpec) -> Result<ApplyOutput> {
        let p = self.prepare(spec)?;
        log::info!("applying {}", p);

        self.terraform(&["init", "-input=false"], INIT_TIMEOUT).await?;
        let applied = self
            .terraform(&["apply", "-auto-approve", "-input=false"], APPLY_TIMEOUT)
            .await;
        // a key pair may exist in the cloud even when the apply failed later
        self.install_generated_keys(spec)?;
        applied?;

        let out = self.terraform(&["output", "-json"], QUERY_TIMEOUT).await?;
        let v: Value = serde_json::from_str(&out).map_err(|e| Error::Infra {
            message: format!("failed to decode terraform output: {e}"),
        })?;
        let regions: Vec<String> = spec.regions.iter().map(|r| r.region.clone()).collect();
        parse_outputs(&v, &regions)
    }

    async fn created_instances(&self) -> Result<BTreeMap<String, Vec<String>>> {
        let out = self.terraform(&["show", "-json"], QUERY_TIMEOUT).await?;
        if out.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let v: Value = serde_json::from_str(&out).map_err(|e| Error::Infra {
            message: format!("failed to decode terraform state: {e}"),
        })?;
        Ok(parse_state_instances(&v))
    }
}

#[cfg(test)]
fn test_region(static_ip: bool, key_pair: KeyPairPlan, security_group: SecurityGroupPlan) -> RegionSpec {
    RegionSpec {
        region: "us-east-1".to_string(),
        image_id: "ami-123".to_string(),
        node_type: "c5.2xlarge".to_string(),
        count: 2,
        key_pair,
        security_group,
        static_ip,
        instance_prefix: "user-us-east-1-avalanche-cli".to_string(),
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- infra::terraform::test_render_aws --exact --show-output
#[test]
fn test_render_aws() {
    use crate::cloud::IngressRule;

    let spec = InfraSpec {
        cloud: CloudService::Aws,
        aws_profile: "default".to_string(),
        gcp_project: String::new(),
        gcp_credentials: String::new(),
        regions: vec![test_region(
            true,
            KeyPairPlan::Create {
                name: "kp".to_string(),
                cert_path: "/tmp/kp.pem".to_string(),
            },
            SecurityGroupPlan::Create {
                name: "sg".to_string(),
                ingress: vec![
                    IngressRule::new(22, "1.2.3.4/32"),
                    IngressRule::new(9651, ANY_CIDR),
                ],
            },
        )],
    };
    let v = render(&spec);
    assert_eq!(v["provider"]["aws"][0]["alias"], "us_east_1");
    assert_eq!(v["provider"]["aws"][0]["region"], "us-east-1");
    assert_eq!(v["resource"]["aws_instance"]["node_us_east_1"]["count"], 2);
    assert_eq!(
        v["resource"]["aws_instance"]["node_us_east_1"]["key_name"],
        "${aws_key_pair.kp_us_east_1.key_name}"
    );
    assert_eq!(
        v["resource"]["local_sensitive_file"]["kp_us_east_1"]["filename"],
        generated_key_file("us-east-1")
    );
    assert_eq!(
        v["resource"]["aws_security_group_rule"]["sg_us_east_1_ingress_0"]["cidr_blocks"][0],
        "1.2.3.4/32"
    );
    assert!(v["resource"]["aws_eip"]["eip_us_east_1"].is_object());
    for output in [
        "instance_ids_us-east-1",
        "instance_ips_us-east-1",
        "instance_regions_us-east-1",
    ] {
        assert!(v["output"][output]["value"].is_string() || v["output"][output]["value"].is_array(), "{output}");
    }
    assert!(v.get("data").is_none());

    // reused key pair and extended group
    let spec = InfraSpec {
        regions: vec![test_region(
            false,
            KeyPairPlan::Reuse {
                name: "kp".to_string(),
                cert_path: "/tmp/kp.pem".to_string(),
            },
            SecurityGroupPlan::Extend {
                id: "sg-0123".to_string(),
                name: "sg".to_string(),
                ingress: vec![IngressRule::new(9650, "1.2.3.4/32")],
            },
        )],
        ..spec
    };
    let v = render(&spec);
    assert_eq!(v["resource"]["aws_instance"]["node_us_east_1"]["key_name"], "kp");
    assert!(v["resource"].get("aws_key_pair").is_none());
    assert!(v["resource"].get("aws_security_group").is_none());
    assert_eq!(
        v["resource"]["aws_security_group_rule"]["sg_us_east_1_ingress_0"]["security_group_id"],
        "sg-0123"
    );
    assert!(v["output"].get("instance_ips_us-east-1").is_none());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- infra::terraform::test_prepare_and_install_keys --exact --show-output
#[test]
fn test_prepare_and_install_keys() {
    use crate::cloud::IngressRule;

    let _ = env_logger::builder().is_test(true).try_init();

    let base = tempfile::tempdir().unwrap();
    let work_dir = base.path().join("terraform").join("c1");
    let cert_path = base.path().join("ssh").join("kp-kp.pem");
    let m = Manager::new(&work_dir.display().to_string());

    let spec = InfraSpec {
        cloud: CloudService::Aws,
        aws_profile: "default".to_string(),
        gcp_project: String::new(),
        gcp_credentials: String::new(),
        regions: vec![test_region(
            false,
            KeyPairPlan::Create {
                name: "kp".to_string(),
                cert_path: cert_path.display().to_string(),
            },
            SecurityGroupPlan::Create {
                name: "sg".to_string(),
                ingress: vec![IngressRule::new(22, "1.2.3.4/32")],
            },
        )],
    };

    // state left by an earlier run is gone before the next apply
    fs::create_dir_all(&work_dir).unwrap();
    fs::write(work_dir.join("terraform.tfstate"), b"{}").unwrap();
    m.prepare(&spec).unwrap();
    assert!(!work_dir.join("terraform.tfstate").exists());
    assert!(work_dir.join(MAIN_FILE).exists());

    // no generated key yet, nothing to install
    m.install_generated_keys(&spec).unwrap();
    assert!(!cert_path.exists());

    let generated = work_dir.join(generated_key_file("us-east-1"));
    fs::write(&generated, b"PRIVATE KEY").unwrap();
    m.install_generated_keys(&spec).unwrap();
    assert_eq!(fs::read(&cert_path).unwrap(), b"PRIVATE KEY");
    assert_eq!(
        fs::metadata(&cert_path).unwrap().permissions().mode() & 0o777,
        0o400
    );

    // the installed copy survives the next run's reset
    m.prepare(&spec).unwrap();
    assert!(!generated.exists());
    assert!(cert_path.exists());

    // never replaces a cert on record
    fs::write(&generated, b"OTHER KEY").unwrap();
    assert!(m.install_generated_keys(&spec).is_err());
    assert_eq!(fs::read(&cert_path).unwrap(), b"PRIVATE KEY");
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- infra::terraform::test_render_gcp --exact --show-output
#[test]
fn test_render_gcp() {
    use crate::cloud::IngressRule;

    let mut region = test_region(
        true,
        KeyPairPlan::Import {
            name: "kp".to_string(),
            cert_path: "/tmp/kp.pem".to_string(),
        },
        SecurityGroupPlan::Create {
            name: "fw".to_string(),
            ingress: vec![
                IngressRule::new(22, "1.2.3.4/32"),
                IngressRule::new(9650, "1.2.3.4/32"),
                IngressRule::new(9650, ANY_CIDR),
                IngressRule::new(9651, ANY_CIDR),
            ],
        },
    );
    region.region = "us-east1-b".to_string();
    let spec = InfraSpec {
        cloud: CloudService::Gcp,
        aws_profile: String::new(),
        gcp_project: "proj".to_string(),
        gcp_credentials: "/tmp/creds.json".to_string(),
        regions: vec![region],
    };
    let v = render(&spec);
    assert_eq!(v["provider"]["google"][0]["project"], "proj");
    let fws = v["resource"]["google_compute_firewall"].as_object().unwrap();
    assert_eq!(fws.len(), 2);
    assert_eq!(
        v["resource"]["google_compute_address"]["eip_us_east1_b"]["region"],
        "us-east1"
    );
    assert!(v["data"]["tls_public_key"]["kp_us_east1_b"].is_object());
    assert!(v["output"]["instance_ids_us-east1-b"].is_object());
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- infra::terraform::test_parse --exact --show-output
#[test]
fn test_parse() {
    let v = json!({
        "instance_ids_us-east-1": {"sensitive": false, "value": ["i-1", "i-2"]},
        "instance_ips_us-east-1": {"sensitive": false, "value": ["1.1.1.1", "2.2.2.2"]},
        "instance_ids_us-west-2": {"sensitive": false, "value": ["i-3"]},
    });
    let out = parse_outputs(&v, &["us-east-1".to_string(), "us-west-2".to_string()]).unwrap();
    assert_eq!(out.instance_ids["us-east-1"], vec!["i-1", "i-2"]);
    assert_eq!(out.static_ips["us-east-1"], vec!["1.1.1.1", "2.2.2.2"]);
    assert!(out.static_ips.get("us-west-2").is_none());
    assert!(parse_outputs(&v, &["eu-west-1".to_string()]).is_err());

    let state = json!({"values": {"root_module": {"resources": [
        {"type": "aws_instance", "values": {"id": "i-1", "tags": {"Region": "us-east-1"}}},
        {"type": "aws_instance", "values": {"id": "i-2", "tags": {"Region": "us-east-1"}}},
        {"type": "aws_security_group", "values": {"id": "sg-1"}},
        {"type": "google_compute_instance", "values": {"name": "n-1", "labels": {"region": "us-east1-b"}}}
    ]}}});
    let found = parse_state_instances(&state);
    assert_eq!(found["us-east-1"], vec!["i-1", "i-2"]);
    assert_eq!(found["us-east1-b"], vec!["n-1"]);
    assert!(parse_state_instances(&json!({})).is_empty());
}
