use std::time::Duration;

use async_trait::async_trait;

use crate::{
    errors::{Error, Result},
    exec,
    remote::{Host, Remote},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote execution over the OpenSSH "ssh" and "scp" binaries.
#[derive(Debug, Clone, Default)]
pub struct Manager;

impl Manager {
    fn base_args(host: &Host) -> Vec<String> {
        let mut args = host.ssh_common_args.clone();
        args.push("-i".to_string());
        args.push(host.ssh_private_key_path.clone());
        args
    }
}

#[async_trait]
impl Remote for Manager {
    async fn connect(&self, host: &Host) -> Result<()> {
        let mut args = Self::base_args(host);
        args.push(host.destination());
        args.push("true".to_string());
        exec::run("ssh", &args, None, None, CONNECT_TIMEOUT)
            .await
            .map_err(|e| Error::remote(&host.node_id, e.to_string()))?;
        Ok(())
    }

    async fn run(&self, host: &Host, script: &str, timeout: Duration) -> Result<String> {
        log::debug!("running script on {}", host.node_id);
        let mut args = Self::base_args(host);
        args.push(host.destination());
        args.push("bash -s".to_string());
        let out = exec::run("ssh", &args, None, Some(script), timeout)
            .await
            .map_err(|e| Error::remote(&host.node_id, e.to_string()))?;
        Ok(out.stdout)
    }

    async fn upload(
        &self,
        host: &Host,
        local_path: &str,
        remote_path: &str,
        timeout: Duration,
    ) -> Result<()> {
        log::info!("uploading {} to {}:{}", local_path, host.node_id, remote_path);
        let mut args = Self::base_args(host);
        args.push(local_path.to_string());
        args.push(format!("{}:{}", host.destination(), remote_path));
        exec::run("scp", &args, None, None, timeout)
            .await
            .map_err(|e| Error::remote(&host.node_id, e.to_string()))?;
        Ok(())
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- remote::ssh::test_base_args --exact --show-output
#[test]
fn test_base_args() {
    use crate::node::CloudService;

    let h = Host::new(CloudService::Aws, "i-1", "10.0.0.1", "/tmp/kp.pem");
    let args = Manager::base_args(&h);
    assert!(args.contains(&"StrictHostKeyChecking=no".to_string()));
    assert_eq!(&args[args.len() - 2..], &["-i".to_string(), "/tmp/kp.pem".to_string()]);
}
