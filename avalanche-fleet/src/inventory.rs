//! Fleet inventory file: one line per host alias with its connection parameters.
use std::{
    fs::{self, File},
    io::{self, ErrorKind, Write},
    path::Path,
};

use crate::{
    errors::{Error, Result},
    remote::Host,
};

fn render_line(h: &Host) -> String {
    format!(
        "{} ansible_host={} ansible_user={} ansible_ssh_private_key_file={} ansible_ssh_common_args='{}'",
        h.node_id,
        h.ip,
        h.ssh_user,
        h.ssh_private_key_path,
        h.ssh_common_args.join(" ")
    )
}

fn parse_line(line: &str) -> Option<Host> {
    let (alias, rest) = line.split_once(' ')?;
    let mut host = Host {
        node_id: alias.to_string(),
        ip: String::new(),
        ssh_user: String::new(),
        ssh_private_key_path: String::new(),
        ssh_common_args: Vec::new(),
    };

    // common args are quoted and come last
    let (kvs, common) = match rest.split_once("ansible_ssh_common_args='") {
        Some((kvs, common)) => (kvs, common.trim_end().trim_end_matches('\'')),
        None => (rest, ""),
    };
    host.ssh_common_args = common.split_whitespace().map(String::from).collect();
    for kv in kvs.split_whitespace() {
        match kv.split_once('=') {
            Some(("ansible_host", v)) => host.ip = v.to_string(),
            Some(("ansible_user", v)) => host.ssh_user = v.to_string(),
            Some(("ansible_ssh_private_key_file", v)) => {
                host.ssh_private_key_path = v.to_string()
            }
            _ => {}
        }
    }
    if host.ip.is_empty() {
        return None;
    }
    Some(host)
}

/// Writes the inventory, replacing any existing file.
pub fn write(file_path: &str, hosts: &[Host]) -> Result<()> {
    log::info!("writing inventory of {} host(s) to '{}'", hosts.len(), file_path);

    let path = Path::new(file_path);
    if let Some(parent_dir) = path.parent() {
        fs::create_dir_all(parent_dir)?;
    }
    let mut contents = String::new();
    for h in hosts {
        contents.push_str(&render_line(h));
        contents.push('\n');
    }
    let mut f = File::create(file_path)?;
    f.write_all(contents.as_bytes())?;
    Ok(())
}

pub fn read(file_path: &str) -> Result<Vec<Host>> {
    if !Path::new(file_path).exists() {
        return Err(Error::NotFound {
            message: format!("inventory '{}'", file_path),
        });
    }
    let contents = fs::read_to_string(file_path)?;
    let mut hosts = Vec::new();
    for line in contents.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let h = parse_line(line).ok_or_else(|| {
            Error::Io(io::Error::new(
                ErrorKind::InvalidData,
                format!("malformed inventory line '{}'", line),
            ))
        })?;
        hosts.push(h);
    }
    Ok(hosts)
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- inventory::test_inventory --exact --show-output
#[test]
fn test_inventory() {
    use crate::node::CloudService;

    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("inventories").join("c1").join("hosts");
    let p = p.display().to_string();

    let hosts = vec![
        Host::new(CloudService::Aws, "i-1", "10.0.0.1", "/tmp/kp.pem"),
        Host::new(CloudService::Aws, "i-2", "10.0.0.2", "/tmp/kp.pem"),
    ];
    write(&p, &hosts).unwrap();

    let loaded = read(&p).unwrap();
    assert_eq!(loaded, hosts);
    assert_eq!(loaded[1].instance_id(), "i-2");

    assert!(matches!(
        read("/nonexistent/hosts"),
        Err(Error::NotFound { .. })
    ));
}
