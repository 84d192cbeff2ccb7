//! Per-node outcome collection for fleet-wide operations.
use std::{
    collections::BTreeMap,
    future::Future,
    sync::{Arc, Mutex},
};

use crate::errors::{Error, Result};

/// Outcome of one node's task.
/// "value" carries whatever the task learned before it stopped (e.g., the node identity),
/// so it can be reported even when "err" is set.
#[derive(Debug, Default)]
pub struct NodeResult {
    pub value: Option<String>,
    pub err: Option<Error>,
}

/// Concurrency-safe map from node identifier to its outcome.
/// Each node is written at most once; read only after every writer finished.
#[derive(Debug, Default)]
pub struct NodeResults {
    inner: Mutex<BTreeMap<String, NodeResult>>,
}

impl NodeResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome for the node.
    /// Returns false (and keeps the first entry) if the node was already recorded.
    pub fn add_result(&self, node: &str, value: Option<String>, err: Option<Error>) -> bool {
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.contains_key(node) {
            log::warn!("result for node '{}' already recorded, ignoring", node);
            return false;
        }
        guard.insert(node.to_string(), NodeResult { value, err });
        true
    }

    fn take_all(&self) -> BTreeMap<String, NodeResult> {
        let mut guard = match self.inner.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *guard)
    }

    /// Consumes the collector once all writers are done.
    pub fn into_inner(self) -> BTreeMap<String, NodeResult> {
        match self.inner.into_inner() {
            Ok(m) => m,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Read-only view of a finished fan-out.
#[derive(Debug, Default)]
pub struct Report {
    pub results: BTreeMap<String, NodeResult>,
}

impl Report {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.results.values().any(|r| r.err.is_some())
    }

    pub fn failed_nodes(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|(_, r)| r.err.is_some())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn succeeded_nodes(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|(_, r)| r.err.is_none())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn value(&self, node: &str) -> Option<&str> {
        self.results.get(node).and_then(|r| r.value.as_deref())
    }

    pub fn error(&self, node: &str) -> Option<&Error> {
        self.results.get(node).and_then(|r| r.err.as_ref())
    }

    /// Returns the aggregate error naming every failed node, if any failed.
    pub fn to_error(&self) -> Option<Error> {
        let nodes = self.failed_nodes();
        if nodes.is_empty() {
            None
        } else {
            Some(Error::NodesFailed { nodes })
        }
    }
}

/// Task outcome handed back to the fan-out: the optional value survives a failure.
pub type TaskOutcome = (Option<String>, Result<()>);

/// Spawns one task per key, all at once, and waits for every one of them.
/// A panicking task is recorded as that key's error; siblings are unaffected.
pub async fn fan_out<K, F, Fut>(keys: Vec<K>, node_id: impl Fn(&K) -> String, task: F) -> Report
where
    K: Send + 'static,
    F: Fn(K) -> Fut,
    Fut: Future<Output = TaskOutcome> + Send + 'static,
{
    let results = Arc::new(NodeResults::new());

    let mut handles = Vec::new();
    for key in keys {
        let id = node_id(&key);
        let fut = task(key);
        let shared = Arc::clone(&results);
        let task_id = id.clone();
        let handle = tokio::spawn(async move {
            let (value, res) = fut.await;
            shared.add_result(&task_id, value, res.err());
        });
        handles.push((id, handle));
    }

    for (id, handle) in handles {
        if let Err(e) = handle.await {
            log::warn!("task for '{}' failed to join: {}", id, e);
            results.add_result(&id, None, Some(Error::other(format!("task failed: {e}"))));
        }
    }

    // every spawned task has been joined, so no other reference is left
    let results = match Arc::try_unwrap(results) {
        Ok(r) => r.into_inner(),
        Err(shared) => shared.take_all(),
    };
    Report { results }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- results::test_add_result_once --exact --show-output
#[test]
fn test_add_result_once() {
    let _ = env_logger::builder().is_test(true).try_init();

    let results = NodeResults::new();
    assert!(results.add_result("node-1", Some("NodeID-a".to_string()), None));
    assert!(!results.add_result("node-1", None, Some(Error::other("late"))));
    assert!(results.add_result("node-2", None, Some(Error::other("boom"))));

    let report = Report {
        results: results.into_inner(),
    };
    assert_eq!(report.len(), 2);
    assert_eq!(report.value("node-1"), Some("NodeID-a"));
    assert!(report.error("node-1").is_none());
    assert_eq!(report.failed_nodes(), vec!["node-2".to_string()]);
    assert_eq!(report.succeeded_nodes(), vec!["node-1".to_string()]);
    assert!(matches!(
        report.to_error(),
        Some(Error::NodesFailed { nodes }) if nodes == vec!["node-2".to_string()]
    ));
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- results::test_fan_out_concurrent_writers --exact --show-output
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_fan_out_concurrent_writers() {
    let _ = env_logger::builder().is_test(true).try_init();

    for _ in 0..5 {
        let n = 32_u64;
        let keys: Vec<u64> = (0..n).collect();
        let report = fan_out(
            keys,
            |k| format!("node-{k}"),
            |k| async move {
                let delay = random_manager::u64() % 20;
                tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
                if k % 5 == 0 {
                    (Some(format!("id-{k}")), Err(Error::other("failed")))
                } else {
                    (Some(format!("id-{k}")), Ok(()))
                }
            },
        )
        .await;

        assert_eq!(report.len(), n as usize);
        for k in 0..n {
            let key = format!("node-{k}");
            assert_eq!(report.value(&key), Some(format!("id-{k}").as_str()));
            assert_eq!(report.error(&key).is_some(), k % 5 == 0);
        }
        assert_eq!(report.failed_nodes().len(), 7);
    }
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- results::test_fan_out_panic --exact --show-output
#[tokio::test]
async fn test_fan_out_panic() {
    let report = fan_out(
        vec![1_u32, 2, 3],
        |k| format!("node-{k}"),
        |k| async move {
            if k == 2 {
                panic!("node 2 exploded");
            }
            (None, Ok(()))
        },
    )
    .await;
    assert_eq!(report.len(), 3);
    assert_eq!(report.failed_nodes(), vec!["node-2".to_string()]);
}
