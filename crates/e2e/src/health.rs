//! Reachability check for the application under test

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{E2eError, E2eResult};

const RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Poll `base_url` until it answers with a non-5xx status.
///
/// Returns the status code of the first acceptable response. Redirects are
/// followed, so the demo's root landing on the login screen counts as up.
pub async fn wait_for_reachable(base_url: &str, limit: Duration) -> E2eResult<u16> {
    let mut builder = reqwest::Client::builder().timeout(Duration::from_secs(5));
    if is_loopback(base_url) {
        builder = builder.no_proxy();
    }
    let client = builder.build()?;

    let start = std::time::Instant::now();
    let mut attempts = 0u32;
    let mut last_error = String::from("no response");

    while start.elapsed() < limit {
        attempts += 1;

        match client.get(base_url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                let status = resp.status().as_u16();
                debug!(%base_url, status, attempts, "application reachable");
                return Ok(status);
            }
            Ok(resp) => {
                warn!("Reachability check returned {}", resp.status());
                last_error = format!("status {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for {} to respond...", base_url);
                }
                if !e.is_connect() {
                    warn!("Reachability check error: {}", e);
                }
                last_error = e.to_string();
            }
        }

        sleep(RETRY_INTERVAL).await;
    }

    Err(E2eError::Environment(format!(
        "{} not reachable after {} attempt(s): {}",
        base_url, attempts, last_error
    )))
}

/// Local targets never go through a configured HTTP proxy
fn is_loopback(url: &str) -> bool {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str().map(|host| {
                host == "localhost"
                    || host
                        .trim_matches(|c| c == '[' || c == ']')
                        .parse::<std::net::IpAddr>()
                        .map_or(false, |ip| ip.is_loopback())
            })
        })
        .unwrap_or(false)
}
