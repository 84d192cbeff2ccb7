use std::{net::IpAddr, time::Duration};

use async_trait::async_trait;
use reqwest::ClientBuilder;
use serde::Deserialize;

use crate::errors::{Error, Result};

pub const IPIFY_URL: &str = "https://api.ipify.org?format=json";

/// Discovers the operator's public IP.
#[async_trait]
pub trait IpLookup: Send + Sync {
    async fn public_ip(&self) -> Result<IpAddr>;
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Parses the `{"ip": "<dotted-quad>"}` response body.
pub fn parse_ip_response(body: &[u8]) -> Result<IpAddr> {
    let resp: IpResponse = serde_json::from_slice(body).map_err(|e| Error::Other {
        message: format!("failed to decode IP lookup response: {}", e),
    })?;
    resp.ip.trim().parse::<IpAddr>().map_err(|e| Error::Other {
        message: format!("IP lookup returned invalid address '{}': {}", resp.ip, e),
    })
}

/// Looks the IP up via ipify.
#[derive(Debug, Clone)]
pub struct Ipify {
    pub url: String,
}

impl Default for Ipify {
    fn default() -> Self {
        Self {
            url: IPIFY_URL.to_string(),
        }
    }
}

#[async_trait]
impl IpLookup for Ipify {
    async fn public_ip(&self) -> Result<IpAddr> {
        log::info!("fetching operator public IP from {}", self.url);
        let cli = ClientBuilder::new()
            .user_agent(env!("CARGO_PKG_NAME"))
            .danger_accept_invalid_certs(false)
            .timeout(Duration::from_secs(15))
            .connection_verbose(true)
            .build()
            .map_err(|e| Error::other(format!("failed ClientBuilder build {}", e)))?;
        let resp = cli
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::other(format!("failed ClientBuilder send {}", e)))?;
        let out = resp
            .bytes()
            .await
            .map_err(|e| Error::other(format!("failed ClientBuilder bytes {}", e)))?;
        let ip = parse_ip_response(&out)?;
        log::info!("operator public IP {}", ip);
        Ok(ip)
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- ip::test_parse_ip_response --exact --show-output
#[test]
fn test_parse_ip_response() {
    let _ = env_logger::builder().is_test(true).try_init();

    let ip = parse_ip_response(br#"{"ip": "203.0.113.7"}"#).unwrap();
    assert_eq!(ip.to_string(), "203.0.113.7");
    assert!(parse_ip_response(br#"{"ip": "not-an-ip"}"#).is_err());
    assert!(parse_ip_response(b"<html>").is_err());
}
