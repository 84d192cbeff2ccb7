use std::{process::Stdio, time::Duration};

use tokio::{io::AsyncWriteExt, process::Command, time::timeout};

use crate::errors::{Error, Result};

/// Output of a finished external command.
#[derive(Debug, Clone, Default)]
pub struct Output {
    pub stdout: String,
    pub stderr: String,
}

/// Runs the program with the arguments and returns its output.
/// Fails on a non-zero exit, a signal, or when "limit" elapses (the child is killed).
pub async fn run(
    program: &str,
    args: &[String],
    cwd: Option<&str>,
    stdin: Option<&str>,
    limit: Duration,
) -> Result<Output> {
    log::info!("running {} {}", program, args.join(" "));

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd
        .spawn()
        .map_err(|e| Error::other(format!("failed to spawn {}: {}", program, e)))?;
    if let Some(input) = stdin {
        if let Some(mut pipe) = child.stdin.take() {
            pipe.write_all(input.as_bytes()).await?;
            // closing stdin lets the child see EOF
            drop(pipe);
        }
    }

    let o = match timeout(limit, child.wait_with_output()).await {
        Ok(res) => res?,
        Err(_) => {
            log::warn!("{} timed out after {:?}", program, limit);
            return Err(Error::other(format!(
                "{} timed out after {:?}",
                program, limit
            )));
        }
    };

    let stdout = String::from_utf8_lossy(&o.stdout).to_string();
    let stderr = String::from_utf8_lossy(&o.stderr).to_string();
    if o.status.success() {
        log::debug!("{} succeeded", program);
        return Ok(Output { stdout, stderr });
    }
    match o.status.code() {
        Some(code) => {
            log::warn!("{} failed with status code {}: {}", program, code, stderr.trim());
            Err(Error::other(format!(
                "{} failed with status code {}: {}",
                program,
                code,
                stderr.trim()
            )))
        }
        None => {
            log::warn!("{} terminated by signal: {}", program, stderr.trim());
            Err(Error::other(format!(
                "{} terminated by signal with no status code: {}",
                program,
                stderr.trim()
            )))
        }
    }
}

/// Runs the program and decodes its stdout as JSON.
pub async fn run_json(program: &str, args: &[String], limit: Duration) -> Result<serde_json::Value> {
    let out = run(program, args, None, None, limit).await?;
    if out.stdout.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&out.stdout).map_err(|e| {
        Error::other(format!(
            "failed to decode {} output as JSON: {}",
            program, e
        ))
    })
}

pub fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// RUST_LOG=debug cargo test --package avalanche-fleet --lib -- exec::test_run --exact --show-output
#[tokio::test]
async fn test_run() {
    let _ = env_logger::builder().is_test(true).try_init();

    let out = run(
        "sh",
        &args(&["-c", "echo hello; echo oops 1>&2"]),
        None,
        None,
        Duration::from_secs(10),
    )
    .await
    .unwrap();
    assert_eq!(out.stdout.trim(), "hello");
    assert_eq!(out.stderr.trim(), "oops");

    let out = run("cat", &[], None, Some("from stdin"), Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(out.stdout, "from stdin");

    let err = run("sh", &args(&["-c", "exit 3"]), None, None, Duration::from_secs(10))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("status code 3"));

    assert!(run("sleep", &args(&["5"]), None, None, Duration::from_millis(100))
        .await
        .is_err());

    let v = run_json("echo", &args(&["{\"ip\": \"1.2.3.4\"}"]), Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(v["ip"], "1.2.3.4");
}
