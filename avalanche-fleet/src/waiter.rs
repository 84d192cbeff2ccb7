use std::{sync::Arc, time::Duration};

use tokio::time::{sleep, Instant};

use crate::{
    errors::Error,
    remote::{Host, Remote},
    results::{self, Report},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls every host in parallel until it accepts a connection or "timeout" elapses.
/// The report is keyed by host alias; unreachable hosts carry the last connection error.
pub async fn wait_for_hosts(
    remote: Arc<dyn Remote>,
    hosts: Vec<Host>,
    timeout: Duration,
    interval: Duration,
) -> Report {
    log::info!("waiting up to {:?} for {} host(s)", timeout, hosts.len());
    results::fan_out(
        hosts,
        |h| h.node_id.clone(),
        move |host| {
            let remote = Arc::clone(&remote);
            async move {
                let deadline = Instant::now() + timeout;
                let mut attempt = 0;
                loop {
                    attempt += 1;
                    let last = match remote.connect(&host).await {
                        Ok(()) => {
                            log::info!("{} reachable after {} attempt(s)", host.node_id, attempt);
                            return (None, Ok(()));
                        }
                        Err(e) => e,
                    };
                    if Instant::now() + interval > deadline {
                        return (
                            None,
                            Err(Error::remote(
                                &host.node_id,
                                format!("not reachable after {:?} ({})", timeout, last),
                            )),
                        );
                    }
                    log::debug!("{} not reachable yet ({}), retrying", host.node_id, last);
                    sleep(interval).await;
                }
            }
        },
    )
    .await
}
