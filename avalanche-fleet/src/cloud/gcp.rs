use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    cloud::{CloudProvider, IngressPermission, SecurityGroup},
    errors::{Error, Result},
    exec,
    node::CloudService,
};

pub const UBUNTU_IMAGE_PROJECT: &str = "ubuntu-os-cloud";
pub const UBUNTU_IMAGE_FAMILY: &str = "ubuntu-2004-lts";

const CLI_TIMEOUT: Duration = Duration::from_secs(120);

/// GCP calls through the "gcloud" CLI.
/// Regions passed to this provider are compute zones (e.g., "us-east1-b").
#[derive(Debug, Clone)]
pub struct Manager {
    pub project: String,
    pub credentials_file: String,
}

impl Manager {
    pub fn new(project: &str, credentials_file: &str) -> Self {
        Self {
            project: project.to_string(),
            credentials_file: credentials_file.to_string(),
        }
    }

    async fn call(&self, zone: &str, args: &[&str]) -> Result<Value> {
        let mut full = exec::args(args);
        full.extend(exec::args(&[
            "--project",
            self.project.as_str(),
            "--format",
            "json",
        ]));
        if !self.credentials_file.is_empty() {
            full.push(format!("--credential-file-override={}", self.credentials_file));
        }
        exec::run_json("gcloud", &full, CLI_TIMEOUT)
            .await
            .map_err(|e| Error::Cloud {
                region: zone.to_string(),
                message: e.to_string(),
            })
    }
}

/// Parses a firewall port spec: "22", "9650-9651".
fn port_range(spec: &str) -> Option<(u16, u16)> {
    match spec.split_once('-') {
        Some((from, to)) => Some((from.parse().ok()?, to.parse().ok()?)),
        None => {
            let p = spec.parse().ok()?;
            Some((p, p))
        }
    }
}

/// Parses "firewall-rules describe" output.
/// An "allowed" entry without ports allows every port.
pub fn parse_firewall(v: &Value) -> Option<SecurityGroup> {
    let name = v["name"].as_str()?;
    let mut ingress = Vec::new();
    let ranges: Vec<&str> = v["sourceRanges"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .collect();
    for allowed in v["allowed"].as_array().into_iter().flatten() {
        let ports: Vec<(u16, u16)> = match allowed["ports"].as_array() {
            Some(ports) => ports
                .iter()
                .filter_map(Value::as_str)
                .filter_map(port_range)
                .collect(),
            None => vec![(0, u16::MAX)],
        };
        for (from, to) in ports {
            for cidr in ranges.iter() {
                ingress.push(IngressPermission::new(from, to, cidr));
            }
        }
    }
    Some(SecurityGroup {
        id: v["id"].as_str().unwrap_or(name).to_string(),
        name: name.to_string(),
        ingress,
    })
}

/// True if the project-wide "ssh-keys" metadata has a key for the name.
pub fn metadata_has_ssh_key(v: &Value, name: &str) -> bool {
    v["commonInstanceMetadata"]["items"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|item| item["key"].as_str() == Some("ssh-keys"))
        .filter_map(|item| item["value"].as_str())
        .any(|keys| keys.lines().any(|l| l.trim_end().ends_with(name)))
}

fn is_not_found(e: &Error) -> bool {
    let s = e.to_string();
    s.contains("was not found") || s.contains("notFound")
}

#[async_trait]
impl CloudProvider for Manager {
    fn service(&self) -> CloudService {
        CloudService::Gcp
    }

    async fn image_id(&self, zone: &str) -> Result<String> {
        let v = self
            .call(
                zone,
                &[
                    "compute",
                    "images",
                    "describe-from-family",
                    UBUNTU_IMAGE_FAMILY,
                    "--project",
                    UBUNTU_IMAGE_PROJECT,
                ],
            )
            .await?;
        v["name"]
            .as_str()
            .map(|n| format!("projects/{UBUNTU_IMAGE_PROJECT}/global/images/{n}"))
            .ok_or_else(|| Error::Cloud {
                region: zone.to_string(),
                message: "no Ubuntu image found".to_string(),
            })
    }

    async fn key_pair_exists(&self, zone: &str, name: &str) -> Result<bool> {
        let v = self
            .call(zone, &["compute", "project-info", "describe"])
            .await?;
        Ok(metadata_has_ssh_key(&v, name))
    }

    async fn security_group(&self, zone: &str, name: &str) -> Result<Option<SecurityGroup>> {
        match self
            .call(zone, &["compute", "firewall-rules", "describe", name])
            .await
        {
            Ok(v) => Ok(parse_firewall(&v)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn stop_instance(&self, zone: &str, instance_id: &str) -> Result<()> {
        log::info!("stopping instance {} in {}", instance_id, zone);
        let zone_flag = format!("--zone={zone}");
        self.call(
            zone,
            &["compute", "instances", "stop", instance_id, zone_flag.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn public_ips(
        &self,
        zone: &str,
        instance_ids: &[String],
    ) -> Result<BTreeMap<String, String>> {
        let zone_flag = format!("--zone={zone}");
        let mut ips = BTreeMap::new();
        for id in instance_ids {
            let v = self
                .call(
                    zone,
                    &["compute", "instances", "describe", id.as_str(), zone_flag.as_str()],
                )
                .await?;
            if let Some(ip) = v["networkInterfaces"][0]["accessConfigs"][0]["natIP"].as_str() {
                ips.insert(id.clone(), ip.to_string());
            }
        }
        Ok(ips)
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- cloud::gcp::test_parse --exact --show-output
#[test]
fn test_parse() {
    use crate::cloud::IngressRule;

    let v = serde_json::json!({
        "id": "123",
        "name": "user-us-east1-b-avalanche-cli-us-east1-b-sg",
        "allowed": [{"IPProtocol": "tcp", "ports": ["22", "9650"]}],
        "sourceRanges": ["1.2.3.4/32"]
    });
    let fw = parse_firewall(&v).unwrap();
    assert_eq!(fw.id, "123");
    assert!(fw.allows(&IngressRule::new(22, "1.2.3.4/32")));
    assert!(fw.allows(&IngressRule::new(9650, "1.2.3.4/32")));
    assert!(!fw.allows(&IngressRule::new(9651, "0.0.0.0/0")));

    let v = serde_json::json!({
        "name": "open",
        "allowed": [{"IPProtocol": "tcp", "ports": ["9000-9700"]}, {"IPProtocol": "all"}],
        "sourceRanges": ["0.0.0.0/0"]
    });
    let fw = parse_firewall(&v).unwrap();
    assert_eq!(fw.id, "open");
    assert!(fw.allows(&IngressRule::new(9651, "0.0.0.0/0")));
    assert!(fw.allows(&IngressRule::new(22, "0.0.0.0/0")));

    let v = serde_json::json!({
        "commonInstanceMetadata": {"items": [
            {"key": "ssh-keys", "value": "ubuntu:ssh-rsa AAAA kp-1\nubuntu:ssh-rsa BBBB kp-2"}
        ]}
    });
    assert!(metadata_has_ssh_key(&v, "kp-2"));
    assert!(!metadata_has_ssh_key(&v, "kp-3"));
}
