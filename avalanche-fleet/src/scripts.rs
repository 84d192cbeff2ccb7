//! Remote setup scripts embedded in the binary.
use rust_embed::RustEmbed;

use crate::errors::{Error, Result};

#[derive(RustEmbed)]
#[folder = "scripts/"]
struct Asset;

pub const SETUP_NODE: &str = "setup-node.sh";
pub const SETUP_BUILD_ENV: &str = "setup-build-env.sh";
pub const SETUP_CLI_FROM_SOURCE: &str = "setup-cli-from-source.sh";
pub const DEPLOY_SUBNET: &str = "deploy-subnet.sh";

pub const GO_VERSION: &str = "1.21.1";

/// Loads the script and replaces each "{{KEY}}" with its value.
/// Fails if the script is unknown or a placeholder is left unset.
pub fn render(name: &str, vars: &[(&str, &str)]) -> Result<String> {
    let raw = Asset::get(name).ok_or_else(|| Error::NotFound {
        message: format!("embedded script '{}'", name),
    })?;
    let mut s = std::str::from_utf8(raw.data.as_ref())
        .map_err(|e| Error::other(format!("script '{}' is not UTF-8: {}", name, e)))?
        .to_string();
    for (k, v) in vars {
        s = s.replace(&format!("{{{{{k}}}}}"), v);
    }
    if let Some(i) = s.find("{{") {
        let rest = &s[i..];
        let end = rest.find("}}").map_or(rest.len(), |j| j + 2);
        return Err(Error::other(format!(
            "script '{}' has unset placeholder {}",
            name,
            &rest[..end]
        )));
    }
    Ok(s)
}

pub fn setup_node(avalanchego_version: &str, network_flag: &str) -> Result<String> {
    render(
        SETUP_NODE,
        &[
            ("AVALANCHEGO_VERSION", avalanchego_version),
            ("NETWORK_FLAG", network_flag),
        ],
    )
}

pub fn setup_build_env() -> Result<String> {
    render(SETUP_BUILD_ENV, &[("GO_VERSION", GO_VERSION)])
}

/// Single-quotes the value for a POSIX shell.
pub fn shell_quote(v: &str) -> String {
    format!("'{}'", v.replace('\'', "'\\''"))
}

pub fn setup_cli_from_source(branch: &str) -> Result<String> {
    render(
        SETUP_CLI_FROM_SOURCE,
        &[("CLI_BRANCH", shell_quote(branch).as_str())],
    )
}

pub fn deploy_subnet(subnet_name: &str, export_path: &str, endpoint: &str) -> Result<String> {
    render(
        DEPLOY_SUBNET,
        &[
            ("SUBNET_NAME", subnet_name),
            ("EXPORT_PATH", export_path),
            ("ENDPOINT", endpoint),
        ],
    )
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- scripts::test_render --exact --show-output
#[test]
fn test_render() {
    let _ = env_logger::builder().is_test(true).try_init();

    let s = setup_node("v1.10.11", "fuji").unwrap();
    assert!(s.contains("VERSION=v1.10.11"));
    assert!(s.contains("\"network-id\": \"fuji\""));
    assert!(!s.contains("{{"));

    let s = setup_cli_from_source("main").unwrap();
    assert!(s.contains("BRANCH='main'"));
    assert!(s.contains("--branch \"${BRANCH}\""));

    let s = setup_cli_from_source("release v1; $(reboot) it's").unwrap();
    assert!(s.contains(r#"BRANCH='release v1; $(reboot) it'\''s'"#));
    assert!(setup_build_env().unwrap().contains(GO_VERSION));

    // unset placeholder
    assert!(render(SETUP_NODE, &[("AVALANCHEGO_VERSION", "v1.10.11")]).is_err());
    assert!(render("missing.sh", &[]).is_err());
}
