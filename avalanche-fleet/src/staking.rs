use std::{fs, path::Path};

use avalanche_types::{ids, key::bls};

use crate::{
    app::{SIGNER_KEY_FILE, STAKER_CERT_FILE, STAKER_KEY_FILE},
    errors::Result,
};

/// Staking identity of one node, as files on local disk.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Identity {
    /// "NodeID-..." fingerprint of the staking certificate.
    pub node_id: String,
    pub cert_path: String,
    pub key_path: String,
    pub signer_key_path: String,
}

impl Identity {
    /// (local path, remote file name) of each file to upload.
    pub fn files(&self) -> [(&str, &str); 3] {
        [
            (self.cert_path.as_str(), STAKER_CERT_FILE),
            (self.key_path.as_str(), STAKER_KEY_FILE),
            (self.signer_key_path.as_str(), SIGNER_KEY_FILE),
        ]
    }
}

/// Generates a fresh staking TLS certificate/key and BLS signer key in the directory.
/// Files left over from an earlier run are replaced, never reused.
pub fn generate(dir: &str) -> Result<Identity> {
    fs::create_dir_all(dir)?;
    let path = |name: &str| Path::new(dir).join(name).display().to_string();
    let cert_path = path(STAKER_CERT_FILE);
    let key_path = path(STAKER_KEY_FILE);
    let signer_key_path = path(SIGNER_KEY_FILE);
    for p in [&cert_path, &key_path, &signer_key_path] {
        if Path::new(p).exists() {
            log::warn!("removing stale staking file '{}'", p);
            fs::remove_file(p)?;
        }
    }

    let (node_id, _) = ids::node::Id::load_or_generate_pem(&key_path, &cert_path)?;
    log::info!("generated node ID {} in '{}'", node_id, dir);

    let (_signer_key, _) = bls::private_key::Key::load_or_generate(&signer_key_path)?;

    Ok(Identity {
        node_id: node_id.to_string(),
        cert_path,
        key_path,
        signer_key_path,
    })
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- staking::test_generate --exact --show-output
#[test]
fn test_generate() {
    let _ = env_logger::builder().is_test(true).try_init();

    let dir = tempfile::tempdir().unwrap();
    let d = dir.path().join("nodes").join("i-1").display().to_string();

    let first = generate(&d).unwrap();
    assert!(first.node_id.starts_with("NodeID-"));
    for (p, _) in first.files() {
        assert!(Path::new(p).exists());
    }

    // regenerating in the same directory never reuses the old identity
    let second = generate(&d).unwrap();
    assert_ne!(first.node_id, second.node_id);
}
