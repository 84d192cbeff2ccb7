#![allow(dead_code)]

use std::{
    collections::{BTreeMap, BTreeSet},
    net::IpAddr,
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use avalanche_fleet::{
    app::App,
    cloud::{CloudProvider, SecurityGroup},
    errors::{Error, Result},
    infra::{ApplyOutput, InfraApplier, InfraSpec},
    ip::IpLookup,
    node::CloudService,
    remote::{Host, Remote},
    versions::VersionSource,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn temp_app() -> (tempfile::TempDir, App) {
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(dir.path());
    (dir, app)
}

fn record(calls: &Mutex<Vec<String>>, call: String) {
    calls.lock().unwrap().push(call);
}

#[derive(Default)]
pub struct StubCloud {
    pub calls: Mutex<Vec<String>>,
    pub key_pairs: BTreeSet<String>,
    pub security_groups: BTreeMap<String, SecurityGroup>,
    /// Instance IDs whose stop call fails.
    pub fail_stop: BTreeSet<String>,
}

impl StubCloud {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CloudProvider for StubCloud {
    fn service(&self) -> CloudService {
        CloudService::Aws
    }

    async fn image_id(&self, region: &str) -> Result<String> {
        record(&self.calls, format!("image_id:{region}"));
        Ok("ami-test".to_string())
    }

    async fn key_pair_exists(&self, region: &str, name: &str) -> Result<bool> {
        record(&self.calls, format!("key_pair_exists:{region}:{name}"));
        Ok(self.key_pairs.contains(name))
    }

    async fn security_group(&self, region: &str, name: &str) -> Result<Option<SecurityGroup>> {
        record(&self.calls, format!("security_group:{region}:{name}"));
        Ok(self.security_groups.get(name).cloned())
    }

    async fn stop_instance(&self, region: &str, instance_id: &str) -> Result<()> {
        record(&self.calls, format!("stop:{region}:{instance_id}"));
        if self.fail_stop.contains(instance_id) {
            return Err(Error::Cloud {
                region: region.to_string(),
                message: format!("could not stop {instance_id}"),
            });
        }
        Ok(())
    }

    async fn public_ips(
        &self,
        region: &str,
        instance_ids: &[String],
    ) -> Result<BTreeMap<String, String>> {
        record(&self.calls, format!("public_ips:{region}"));
        Ok(instance_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), format!("10.0.0.{}", i + 1)))
            .collect())
    }
}

#[derive(Default)]
pub struct StubInfra {
    pub calls: Mutex<Vec<String>>,
    pub applied: Mutex<Vec<InfraSpec>>,
    /// When set, apply fails and these instances are left in the state.
    pub fail_with_created: Option<BTreeMap<String, Vec<String>>>,
    /// Instances of an earlier run still listed in the outputs, per region.
    pub earlier: BTreeMap<String, Vec<String>>,
    /// First index of the instance IDs this stub makes up.
    pub id_offset: u32,
}

impl StubInfra {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl InfraApplier for StubInfra {
    async fn apply(&self, spec: &InfraSpec) -> Result<ApplyOutput> {
        record(&self.calls, "apply".to_string());
        self.applied.lock().unwrap().push(spec.clone());
        if self.fail_with_created.is_some() {
            return Err(Error::Infra {
                message: "quota exceeded".to_string(),
            });
        }
        let mut out = ApplyOutput::default();
        for r in spec.regions.iter() {
            let mut ids = self.earlier.get(&r.region).cloned().unwrap_or_default();
            ids.extend((0..r.count).map(|i| format!("i-{}-{}", r.region, i + self.id_offset)));
            if r.static_ip {
                out.static_ips.insert(
                    r.region.clone(),
                    (0..r.count).map(|i| format!("192.0.2.{}", i + 1)).collect(),
                );
            }
            out.instance_ids.insert(r.region.clone(), ids);
        }
        Ok(out)
    }

    async fn created_instances(&self) -> Result<BTreeMap<String, Vec<String>>> {
        record(&self.calls, "created_instances".to_string());
        Ok(self.fail_with_created.clone().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct StubIp {
    pub calls: Mutex<Vec<String>>,
}

#[async_trait]
impl IpLookup for StubIp {
    async fn public_ip(&self) -> Result<IpAddr> {
        record(&self.calls, "public_ip".to_string());
        Ok("203.0.113.7".parse().unwrap())
    }
}

#[derive(Default)]
pub struct StubRemote {
    pub calls: Mutex<Vec<String>>,
    /// Host aliases that never accept a connection.
    pub unreachable: BTreeSet<String>,
    /// Host aliases whose uploads fail.
    pub fail_upload: BTreeSet<String>,
}

impl StubRemote {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Remote for StubRemote {
    async fn connect(&self, host: &Host) -> Result<()> {
        record(&self.calls, format!("connect:{}", host.node_id));
        if self.unreachable.contains(&host.node_id) {
            return Err(Error::remote(&host.node_id, "connection refused"));
        }
        Ok(())
    }

    async fn run(&self, host: &Host, _script: &str, _timeout: Duration) -> Result<String> {
        record(&self.calls, format!("run:{}", host.node_id));
        Ok(String::new())
    }

    async fn upload(
        &self,
        host: &Host,
        _local_path: &str,
        remote_path: &str,
        _timeout: Duration,
    ) -> Result<()> {
        record(&self.calls, format!("upload:{}:{}", host.node_id, remote_path));
        if self.fail_upload.contains(&host.node_id) {
            return Err(Error::remote(&host.node_id, "scp: permission denied"));
        }
        Ok(())
    }
}

pub struct StubVersions;

#[async_trait]
impl VersionSource for StubVersions {
    async fn latest_release(&self, _org: &str, _repo: &str) -> Result<String> {
        Ok("v1.10.11".to_string())
    }

    async fn latest_pre_release(&self, _org: &str, _repo: &str) -> Result<String> {
        Ok("v1.10.12-rc.0".to_string())
    }

    async fn rpc_version(&self, _vm_version: &str) -> Result<u32> {
        Ok(28)
    }

    async fn avalanchego_for_rpc(&self, _rpc_version: u32) -> Result<String> {
        Ok("v1.10.11".to_string())
    }
}
