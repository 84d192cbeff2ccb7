use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use aws_sdk_ec2::types::{Filter, Reservation, SecurityGroup as Ec2SecurityGroup};

use crate::{
    cloud::{CloudProvider, IngressPermission, SecurityGroup},
    errors::{Error, Result},
    node::CloudService,
};

/// Ubuntu 20.04 AMI published by Canonical.
/// ref. https://ubuntu.com/server/docs/cloud-images/amazon-ec2
pub const UBUNTU_AMI_PARAMETER: &str =
    "/aws/service/canonical/ubuntu/server/20.04/stable/current/amd64/hvm/ebs-gp2/ami-id";

const OPERATION_TIMEOUT: Duration = Duration::from_secs(60);

/// AWS calls through the SDK, using the named credentials profile.
#[derive(Debug, Clone)]
pub struct Manager {
    pub profile: String,
}

/// Regional SDK clients sharing one loaded config.
struct Clients {
    ec2: aws_sdk_ec2::Client,
    ssm: aws_sdk_ssm::Client,
}

impl Manager {
    pub fn new(profile: &str) -> Self {
        Self {
            profile: profile.to_string(),
        }
    }

    async fn clients(&self, region: &str) -> Clients {
        let shared_config = aws_manager::load_config(
            Some(region.to_string()),
            Some(self.profile.clone()),
            Some(OPERATION_TIMEOUT),
        )
        .await;
        Clients {
            ec2: aws_sdk_ec2::Client::new(&shared_config),
            ssm: aws_sdk_ssm::Client::new(&shared_config),
        }
    }
}

fn cloud_error(region: &str, op: &str, e: impl std::fmt::Display) -> Error {
    Error::Cloud {
        region: region.to_string(),
        message: format!("failed {} {}", op, e),
    }
}

fn filter(name: &str, value: &str) -> Filter {
    Filter::builder()
        .set_name(Some(name.to_string()))
        .set_values(Some(vec![value.to_string()]))
        .build()
}

fn port(p: Option<i32>, default: u16) -> u16 {
    p.and_then(|p| u16::try_from(p).ok()).unwrap_or(default)
}

/// Converts a described group, keeping each permission's full port range.
/// A permission with no ports (protocol "-1") allows every port.
pub fn security_group_from(sg: &Ec2SecurityGroup) -> SecurityGroup {
    let mut ingress = Vec::new();
    for perm in sg.ip_permissions().unwrap_or_default() {
        let (from_port, to_port) = match perm.ip_protocol() {
            Some("-1") => (0, u16::MAX),
            _ => (port(perm.from_port(), 0), port(perm.to_port(), u16::MAX)),
        };
        for range in perm.ip_ranges().unwrap_or_default() {
            if let Some(cidr) = range.cidr_ip() {
                ingress.push(IngressPermission::new(from_port, to_port, cidr));
            }
        }
    }
    SecurityGroup {
        id: sg.group_id().unwrap_or_default().to_string(),
        name: sg.group_name().unwrap_or_default().to_string(),
        ingress,
    }
}

/// Instance ID to public IP, skipping instances without one.
pub fn public_ips_from(reservations: &[Reservation]) -> BTreeMap<String, String> {
    let mut ips = BTreeMap::new();
    for reservation in reservations {
        for instance in reservation.instances().unwrap_or_default() {
            if let (Some(id), Some(ip)) = (instance.instance_id(), instance.public_ip_address()) {
                ips.insert(id.to_string(), ip.to_string());
            }
        }
    }
    ips
}

#[async_trait]
impl CloudProvider for Manager {
    fn service(&self) -> CloudService {
        CloudService::Aws
    }

    async fn image_id(&self, region: &str) -> Result<String> {
        let out = self
            .clients(region)
            .await
            .ssm
            .get_parameter()
            .name(UBUNTU_AMI_PARAMETER)
            .send()
            .await
            .map_err(|e| cloud_error(region, "get_parameter", e))?;
        out.parameter()
            .and_then(|p| p.value())
            .map(|s| s.to_string())
            .ok_or_else(|| cloud_error(region, "get_parameter", "no Ubuntu AMI found"))
    }

    async fn key_pair_exists(&self, region: &str, name: &str) -> Result<bool> {
        let out = self
            .clients(region)
            .await
            .ec2
            .describe_key_pairs()
            .filters(filter("key-name", name))
            .send()
            .await
            .map_err(|e| cloud_error(region, "describe_key_pairs", e))?;
        Ok(out.key_pairs().map_or(false, |kps| !kps.is_empty()))
    }

    async fn security_group(&self, region: &str, name: &str) -> Result<Option<SecurityGroup>> {
        let out = self
            .clients(region)
            .await
            .ec2
            .describe_security_groups()
            .filters(filter("group-name", name))
            .send()
            .await
            .map_err(|e| cloud_error(region, "describe_security_groups", e))?;
        Ok(out
            .security_groups()
            .and_then(|sgs| sgs.first())
            .map(security_group_from))
    }

    async fn stop_instance(&self, region: &str, instance_id: &str) -> Result<()> {
        log::info!("stopping instance {} in {}", instance_id, region);
        self.clients(region)
            .await
            .ec2
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| cloud_error(region, "stop_instances", e))?;
        Ok(())
    }

    async fn public_ips(
        &self,
        region: &str,
        instance_ids: &[String],
    ) -> Result<BTreeMap<String, String>> {
        if instance_ids.is_empty() {
            return Ok(BTreeMap::new());
        }
        let out = self
            .clients(region)
            .await
            .ec2
            .describe_instances()
            .set_instance_ids(Some(instance_ids.to_vec()))
            .send()
            .await
            .map_err(|e| cloud_error(region, "describe_instances", e))?;
        Ok(public_ips_from(out.reservations().unwrap_or_default()))
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- cloud::aws::test_security_group_from --exact --show-output
#[test]
fn test_security_group_from() {
    use aws_sdk_ec2::types::{IpPermission, IpRange};

    use crate::cloud::{IngressRule, ANY_CIDR};

    let _ = env_logger::builder().is_test(true).try_init();

    let sg = Ec2SecurityGroup::builder()
        .group_id("sg-0123")
        .group_name("user-us-east-1-avalanche-cli-us-east-1-sg")
        .ip_permissions(
            IpPermission::builder()
                .ip_protocol("tcp")
                .from_port(22)
                .to_port(22)
                .ip_ranges(IpRange::builder().cidr_ip("1.2.3.4/32").build())
                .build(),
        )
        .ip_permissions(
            IpPermission::builder()
                .ip_protocol("tcp")
                .from_port(0)
                .to_port(65535)
                .ip_ranges(IpRange::builder().cidr_ip(ANY_CIDR).build())
                .build(),
        )
        .ip_permissions(
            IpPermission::builder()
                .ip_protocol("-1")
                .ip_ranges(IpRange::builder().cidr_ip("5.6.7.8/32").build())
                .build(),
        )
        .build();

    let sg = security_group_from(&sg);
    assert_eq!(sg.id, "sg-0123");
    assert_eq!(sg.ingress.len(), 3);
    assert!(sg.allows(&IngressRule::new(22, "1.2.3.4/32")));
    assert!(!sg.allows(&IngressRule::new(9650, "1.2.3.4/32")));

    // a 0-65535 permission is not cut short
    assert!(sg.allows(&IngressRule::new(9650, ANY_CIDR)));
    assert!(sg.allows(&IngressRule::new(9651, ANY_CIDR)));
    assert!(sg.allows(&IngressRule::new(9650, "5.6.7.8/32")));
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- cloud::aws::test_public_ips_from --exact --show-output
#[test]
fn test_public_ips_from() {
    use aws_sdk_ec2::types::Instance;

    let _ = env_logger::builder().is_test(true).try_init();

    let reservations = vec![Reservation::builder()
        .instances(
            Instance::builder()
                .instance_id("i-1")
                .public_ip_address("10.0.0.1")
                .build(),
        )
        .instances(Instance::builder().instance_id("i-2").build())
        .build()];
    let ips = public_ips_from(&reservations);
    assert_eq!(ips.len(), 1);
    assert_eq!(ips.get("i-1").map(String::as_str), Some("10.0.0.1"));
}
