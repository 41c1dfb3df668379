//! SSH readiness probing with exponential backoff, per §4.1 step 5: base
//! 1s, cap 10s, jitter ±20%, max 20 attempts.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use crate::error::{CyrisError, Result};
use crate::ssh::channel::{SshAuth, SshChannel};

const BASE: Duration = Duration::from_secs(1);
const CAP: Duration = Duration::from_secs(10);
const MAX_ATTEMPTS: u32 = 20;
const JITTER_FRACTION: f64 = 0.20;

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BASE.as_secs_f64() * 2f64.powi(attempt as i32);
    let capped = exp.min(CAP.as_secs_f64());
    let jitter = rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
    let jittered = (capped * (1.0 + jitter)).max(0.0);
    Duration::from_secs_f64(jittered)
}

/// Waits until `host:port` accepts and authenticates an SSH connection, or
/// gives up after `MAX_ATTEMPTS` attempts with kind=`discovery-timeout`.
#[instrument(skip(auth))]
pub async fn wait_for_ssh_ready(host: &str, port: u16, username: &str, auth: &SshAuth) -> Result<()> {
    for attempt in 0..MAX_ATTEMPTS {
        match SshChannel::connect(host, port, username, auth, Duration::from_secs(5)).await {
            Ok(_session) => {
                debug!(attempt, "ssh reachable");
                return Ok(());
            }
            Err(e) if e.is_transient() || matches!(e, CyrisError::Permission(_)) => {
                let delay = backoff_delay(attempt);
                debug!(attempt, ?delay, error = %e, "ssh not yet ready, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
    Err(CyrisError::DiscoveryTimeout(format!(
        "ssh to {host}:{port} not reachable after {MAX_ATTEMPTS} attempts"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_never_exceeds_cap_by_more_than_jitter() {
        for attempt in 0..20 {
            let d = backoff_delay(attempt);
            assert!(d.as_secs_f64() <= CAP.as_secs_f64() * (1.0 + JITTER_FRACTION) + 0.01);
        }
    }

    #[test]
    fn backoff_grows_with_attempt_number_before_capping() {
        let early = backoff_delay(0).as_secs_f64();
        let later = backoff_delay(2).as_secs_f64();
        assert!(later > early * 0.5);
    }
}
