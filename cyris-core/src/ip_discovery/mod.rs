//! Component G: IP discovery — layered probes plus a freshness-aware,
//! coalescing cache, per §4.4.

pub mod cache;
pub mod probes;

use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::time::Instant;
use tracing::instrument;

use crate::error::{CyrisError, Result};
use crate::model::IpCacheEntry;
use crate::virt::cli::VirtCli;

pub use cache::IpCache;
pub use probes::DiscoveryMethod;

const PROBE_INTERVAL: Duration = Duration::from_secs(2);

/// Static context a single discovery call needs: the domain and network
/// identity, and any IP the topology manager already assigned.
pub struct DiscoveryTarget {
    pub domain_name: String,
    pub mac_addresses: Vec<String>,
    pub network_name: String,
    pub topology_assigned_ip: Option<String>,
}

/// Runs the five probes in priority order, returning the first success.
#[instrument(skip(virt, target))]
async fn probe_once(virt: &VirtCli, target: &DiscoveryTarget) -> Result<Option<(DiscoveryMethod, Vec<String>)>> {
    if let Some(r) = probes::topology_allocated(target.topology_assigned_ip.as_deref()) {
        return Ok(Some((r.method, r.ip_addresses)));
    }
    if let Some(r) = probes::libvirt_lease(virt, &target.network_name, &target.mac_addresses).await? {
        return Ok(Some((r.method, r.ip_addresses)));
    }
    for source in ["lease", "agent", "arp"] {
        if let Some(r) = probes::domifaddr(virt, &target.domain_name, source).await? {
            return Ok(Some((r.method, r.ip_addresses)));
        }
    }
    if let Some(r) = probes::arp_table(&target.mac_addresses).await? {
        return Ok(Some((r.method, r.ip_addresses)));
    }
    if let Some(r) = probes::bridge_fdb(&target.mac_addresses).await? {
        return Ok(Some((r.method, r.ip_addresses)));
    }
    Ok(None)
}

/// Resolves one VM's IP, honoring the cache's `max_age` and an optional
/// deadline: on deadline, loops re-probing every 2s until it elapses, then
/// returns `discovery-timeout`.
pub async fn resolve(
    cache: &IpCache,
    virt: &VirtCli,
    target: DiscoveryTarget,
    max_age: Option<ChronoDuration>,
    deadline: Option<Duration>,
) -> Result<Option<IpCacheEntry>> {
    let vm_name = target.domain_name.clone();
    let macs = target.mac_addresses.clone();

    let probe = || async {
        let result = probe_once(virt, &target).await.ok().flatten();
        result.map(|(method, ips)| {
            let now = Utc::now();
            IpCacheEntry {
                vm_name: vm_name.clone(),
                ip_addresses: ips,
                mac_addresses: macs.clone(),
                interfaces: vec![],
                discovery_method: method.as_str().to_string(),
                cached_at: now,
                expires_at: now + ChronoDuration::seconds(120),
                status: "ok".to_string(),
            }
        })
    };

    match deadline {
        None => Ok(cache.resolve_coalesced(&target_name(&target), max_age, probe).await),
        Some(deadline) => {
            let started = Instant::now();
            loop {
                if let Some(entry) = cache.resolve_coalesced(&target_name_static(&target.domain_name), max_age, probe).await {
                    return Ok(Some(entry));
                }
                if started.elapsed() >= deadline {
                    return Err(CyrisError::DiscoveryTimeout(format!(
                        "no IP discovered for '{}' within {:?}",
                        target.domain_name, deadline
                    )));
                }
                tokio::time::sleep(PROBE_INTERVAL).await;
            }
        }
    }
}

fn target_name(target: &DiscoveryTarget) -> String {
    target.domain_name.clone()
}
fn target_name_static(domain_name: &str) -> String {
    domain_name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn topology_assigned_ip_short_circuits_other_probes() {
        let cache = IpCache::new();
        let virt = VirtCli::new("qemu:///session");
        let target = DiscoveryTarget {
            domain_name: "vm1".to_string(),
            mac_addresses: vec![],
            network_name: "n1".to_string(),
            topology_assigned_ip: Some("10.64.3.5".to_string()),
        };
        let entry = resolve(&cache, &virt, target, None, None).await.unwrap().unwrap();
        assert_eq!(entry.ip_addresses, vec!["10.64.3.5".to_string()]);
        assert_eq!(entry.discovery_method, "topology-allocated");
    }
}
