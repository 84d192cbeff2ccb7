use std::{
    collections::BTreeMap,
    io::{self, ErrorKind},
};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Backing errors for all fleet and subnet operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("duplicate stage '{name}'")]
    DuplicateStage { name: String },
    #[error("state machine needs at least one stage")]
    EmptyStages,
    #[error("can not go back from the first stage")]
    InvalidBacktrack,

    #[error("number of regions ({regions}) and number of node counts ({num_nodes}) must match")]
    RegionNodeCountMismatch { regions: usize, num_nodes: usize },
    #[error("conflicting flags: {message}")]
    FlagConflict { message: String },
    #[error("invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
    #[error("invalid version '{version}'")]
    InvalidVersion { version: String },
    #[error("invalid genesis: {message}")]
    GenesisFormat { message: String },
    #[error("prompt failed: {message}")]
    Prompt { message: String },

    #[error("cloud API failed ({region}): {message}")]
    Cloud { region: String, message: String },
    #[error("infra apply failed: {message}")]
    Infra { message: String },
    #[error("failed to stop node(s) {}, stop them manually to avoid further charges (cause: {cause})", failed_ids(.failed))]
    TeardownIncomplete {
        failed: BTreeMap<String, String>,
        cause: String,
    },
    #[error("host '{host}': {message}")]
    Remote { host: String, message: String },
    #[error("failed node(s): {}", .nodes.join(", "))]
    NodesFailed { nodes: Vec<String> },

    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("{message}")]
    Other { message: String },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn failed_ids(failed: &BTreeMap<String, String>) -> String {
    failed.keys().cloned().collect::<Vec<_>>().join(", ")
}

impl Error {
    /// Returns true for errors raised before any collaborator was invoked.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::DuplicateStage { .. }
                | Error::EmptyStages
                | Error::RegionNodeCountMismatch { .. }
                | Error::FlagConflict { .. }
                | Error::InvalidName { .. }
                | Error::InvalidVersion { .. }
                | Error::GenesisFormat { .. }
        )
    }

    pub fn remote(host: &str, message: impl Into<String>) -> Self {
        Error::Remote {
            host: host.to_string(),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Error::Other {
            message: message.into(),
        }
    }

    pub fn flag_conflict(message: impl Into<String>) -> Self {
        Error::FlagConflict {
            message: message.into(),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Io(io::Error::new(ErrorKind::InvalidInput, e.to_string()))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Io(io::Error::new(ErrorKind::InvalidData, e.to_string()))
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            e if e.is_configuration() => io::Error::new(ErrorKind::InvalidInput, e.to_string()),
            e => io::Error::new(ErrorKind::Other, e.to_string()),
        }
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- errors::test_teardown_message --exact --show-output
#[test]
fn test_teardown_message() {
    let mut failed = BTreeMap::new();
    failed.insert("i-b".to_string(), "throttled".to_string());
    failed.insert("i-a".to_string(), "denied".to_string());
    let e = Error::TeardownIncomplete {
        failed,
        cause: "apply failed".to_string(),
    };
    let msg = e.to_string();
    assert!(msg.contains("i-a, i-b"));
    assert!(!e.is_configuration());

    let e: io::Error = Error::RegionNodeCountMismatch {
        regions: 2,
        num_nodes: 1,
    }
    .into();
    assert_eq!(e.kind(), ErrorKind::InvalidInput);
}
