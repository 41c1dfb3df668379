//! The five layered IP-discovery probes from §4.4, tried in priority order
//! until one yields an IPv4 address.
//!
//! Probe semantics (argument shapes, `virsh` subcommands) are grounded on
//! `examples/original_source/.../virsh_client.py` and
//! `limiquantix-hypervisor::libvirt::backend`'s output-parsing idiom.

use tokio::process::Command;

use crate::error::Result;
use crate::virt::cli::VirtCli;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMethod {
    TopologyAllocated,
    LibvirtLease,
    Domifaddr,
    Arp,
    BridgeFdb,
}

impl DiscoveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscoveryMethod::TopologyAllocated => "topology-allocated",
            DiscoveryMethod::LibvirtLease => "libvirt-lease",
            DiscoveryMethod::Domifaddr => "domifaddr",
            DiscoveryMethod::Arp => "arp",
            DiscoveryMethod::BridgeFdb => "bridge-fdb",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub method: DiscoveryMethod,
    pub ip_addresses: Vec<String>,
}

/// Probe 1: the address the topology manager assigned deterministically
/// when it created the bridge/network. Authoritative when present — the
/// caller supplies it, no external process is run.
pub fn topology_allocated(assigned_ip: Option<&str>) -> Option<ProbeResult> {
    assigned_ip.map(|ip| ProbeResult { method: DiscoveryMethod::TopologyAllocated, ip_addresses: vec![ip.to_string()] })
}

/// Probe 2: `virsh net-dhcp-leases <network>`, matched against the
/// domain's known MAC addresses.
pub async fn libvirt_lease(virt: &VirtCli, network: &str, macs: &[String]) -> Result<Option<ProbeResult>> {
    let raw = virt.net_dhcp_leases(network).await?;
    Ok(parse_dhcp_leases(&raw, macs))
}

fn parse_dhcp_leases(raw: &str, macs: &[String]) -> Option<ProbeResult> {
    let macs_lower: Vec<String> = macs.iter().map(|m| m.to_lowercase()).collect();
    for line in raw.lines().skip(2) {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 5 {
            continue;
        }
        let mac = cols[2].to_lowercase();
        if macs_lower.iter().any(|m| m == &mac) {
            let ip_with_prefix = cols[4];
            let ip = ip_with_prefix.split('/').next().unwrap_or(ip_with_prefix);
            return Some(ProbeResult { method: DiscoveryMethod::LibvirtLease, ip_addresses: vec![ip.to_string()] });
        }
    }
    None
}

/// Probe 3: `virsh domifaddr --source lease|agent|arp`.
pub async fn domifaddr(virt: &VirtCli, domain: &str, source: &str) -> Result<Option<ProbeResult>> {
    let raw = virt.domifaddr(domain, source).await?;
    Ok(parse_domifaddr(&raw))
}

fn parse_domifaddr(raw: &str) -> Option<ProbeResult> {
    let mut ips = Vec::new();
    for line in raw.lines().skip(2) {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 {
            continue;
        }
        if let Some(addr) = cols.get(3) {
            let ip = addr.split('/').next().unwrap_or(addr);
            if ip.parse::<std::net::Ipv4Addr>().is_ok() {
                ips.push(ip.to_string());
            }
        }
    }
    if ips.is_empty() {
        None
    } else {
        Some(ProbeResult { method: DiscoveryMethod::Domifaddr, ip_addresses: ips })
    }
}

/// Probe 4: `/proc/net/arp` filtered by the domain's MACs.
pub async fn arp_table(macs: &[String]) -> Result<Option<ProbeResult>> {
    let text = tokio::fs::read_to_string("/proc/net/arp").await.unwrap_or_default();
    Ok(parse_proc_net_arp(&text, macs))
}

fn parse_proc_net_arp(text: &str, macs: &[String]) -> Option<ProbeResult> {
    let macs_lower: Vec<String> = macs.iter().map(|m| m.to_lowercase()).collect();
    let mut ips = Vec::new();
    for line in text.lines().skip(1) {
        let cols: Vec<&str> = line.split_whitespace().collect();
        if cols.len() < 4 {
            continue;
        }
        let mac = cols[3].to_lowercase();
        if macs_lower.iter().any(|m| m == &mac) {
            ips.push(cols[0].to_string());
        }
    }
    if ips.is_empty() {
        None
    } else {
        Some(ProbeResult { method: DiscoveryMethod::Arp, ip_addresses: ips })
    }
}

/// Probe 5: `bridge fdb show` cross-referenced with the ARP table, for the
/// case where a guest hasn't yet issued traffic that populates ARP on its
/// own but its MAC is visible on the bridge.
pub async fn bridge_fdb(macs: &[String]) -> Result<Option<ProbeResult>> {
    let output = Command::new("bridge").args(["fdb", "show"]).output().await;
    let Ok(output) = output else { return Ok(None) };
    if !output.status.success() {
        return Ok(None);
    }
    let fdb_text = String::from_utf8_lossy(&output.stdout);
    let macs_lower: std::collections::HashSet<String> = macs.iter().map(|m| m.to_lowercase()).collect();
    let seen_on_bridge = fdb_text.lines().any(|line| {
        line.split_whitespace().next().map(|m| macs_lower.contains(&m.to_lowercase())).unwrap_or(false)
    });
    if !seen_on_bridge {
        return Ok(None);
    }
    // Presence on the bridge only confirms liveness; the address itself
    // still comes from ARP.
    arp_table(macs).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dhcp_leases_matching_mac() {
        let raw = " Expiry Time           MAC address        Protocol   IP address                Hostname        Client ID or DUID\n-------------------------------------------------------------------------------------------------------------------------\n 2026-07-26 10:00:00   52:54:00:aa:bb:cc  ipv4       192.168.122.50/24         g1              *\n";
        let result = parse_dhcp_leases(raw, &["52:54:00:aa:bb:cc".to_string()]).unwrap();
        assert_eq!(result.ip_addresses, vec!["192.168.122.50"]);
    }

    #[test]
    fn parses_domifaddr_output() {
        let raw = " Name       MAC address          Protocol     Address\n-------------------------------------------------------------------------------\n vnet0      52:54:00:aa:bb:cc     ipv4         192.168.122.77/24\n";
        let result = parse_domifaddr(raw).unwrap();
        assert_eq!(result.ip_addresses, vec!["192.168.122.77"]);
    }

    #[test]
    fn parses_proc_net_arp() {
        let text = "IP address       HW type     Flags       HW address            Mask     Device\n192.168.122.99    0x1         0x2         52:54:00:aa:bb:cc     *        virbr0\n";
        let result = parse_proc_net_arp(text, &["52:54:00:AA:BB:CC".to_string()]).unwrap();
        assert_eq!(result.ip_addresses, vec!["192.168.122.99"]);
    }
}
