//! Component F: Linux bridge + iptables NAT topology manager.
//!
//! Grounded on `limiquantix-hypervisor::network::ovs::OvsPortManager`'s
//! CLI-wrapping shape (`Command::new`, `#[instrument]`, typed status
//! probing), re-targeted from `ovs-vsctl` to `ip`/`bridge`/`iptables`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use tokio::process::Command;
use tracing::{instrument, warn};

use crate::error::{CyrisError, Result};
use crate::network::cidr::CidrAllocator;

/// Derives the `cy-{range_hash6}-{net_hash4}` bridge name, kept at or
/// under the 15-byte Linux interface-name limit.
pub fn bridge_name(range_id: &str, network_name: &str) -> String {
    let range_hash = short_hash(range_id, 6);
    let net_hash = short_hash(network_name, 4);
    format!("cy-{range_hash}-{net_hash}")
}

fn short_hash(s: &str, len: usize) -> String {
    let mut hasher = DefaultHasher::new();
    s.hash(&mut hasher);
    format!("{:x}", hasher.finish())[..len].to_string()
}

/// Manages bridges and NAT rules for one or more ranges on the local host.
pub struct NetworkTopologyManager {
    cidr: CidrAllocator,
    upstream_iface: String,
}

impl NetworkTopologyManager {
    pub fn new(cidr: CidrAllocator, upstream_iface: impl Into<String>) -> Self {
        Self { cidr, upstream_iface: upstream_iface.into() }
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<(bool, String)> {
        let output = Command::new(program)
            .args(args)
            .output()
            .await
            .map_err(|e| CyrisError::Network(format!("failed to spawn {program}: {e}")))?;
        Ok((output.status.success(), String::from_utf8_lossy(&output.stderr).into_owned()))
    }

    /// Creates a bridge, brings it up, assigns the gateway address (first
    /// usable host in the allocated `/24`), and installs NAT rules.
    #[instrument(skip(self))]
    pub async fn create_network(&self, range_id: &str, network_name: &str) -> Result<(String, String)> {
        let cidr = self.cidr.allocate(range_id, network_name)?;
        let name = bridge_name(range_id, network_name);
        let gateway = gateway_address(&cidr)?;

        let (ok, stderr) = self.run("ip", &["link", "add", "name", &name, "type", "bridge"]).await?;
        if !ok && !stderr.contains("File exists") {
            return Err(CyrisError::Network(format!("ip link add {name} failed: {stderr}")));
        }
        let (ok, stderr) = self.run("ip", &["link", "set", &name, "up"]).await?;
        if !ok {
            return Err(CyrisError::Network(format!("ip link set {name} up failed: {stderr}")));
        }
        let prefix_len = cidr.split('/').nth(1).unwrap_or("24");
        let (ok, stderr) = self
            .run("ip", &["addr", "add", &format!("{gateway}/{prefix_len}"), "dev", &name])
            .await?;
        if !ok && !stderr.contains("File exists") {
            return Err(CyrisError::Network(format!("ip addr add on {name} failed: {stderr}")));
        }

        self.install_nat(&name, &cidr, range_id, network_name).await?;
        Ok((name, cidr))
    }

    async fn install_nat(&self, bridge: &str, cidr: &str, range_id: &str, network_name: &str) -> Result<()> {
        let comment = format!("cyris:{range_id}:{network_name}");
        let rules: Vec<Vec<String>> = vec![
            vec!["-t".into(), "filter".into(), "FORWARD".into(), "-i".into(), bridge.into(), "-o".into(), self.upstream_iface.clone(), "-j".into(), "ACCEPT".into()],
            vec!["-t".into(), "filter".into(), "FORWARD".into(), "-i".into(), self.upstream_iface.clone(), "-o".into(), bridge.into(), "-m".into(), "state".into(), "--state".into(), "ESTABLISHED,RELATED".into(), "-j".into(), "ACCEPT".into()],
            vec!["-t".into(), "nat".into(), "POSTROUTING".into(), "-s".into(), cidr.into(), "-o".into(), self.upstream_iface.clone(), "-j".into(), "MASQUERADE".into()],
        ];
        for rule in rules {
            self.append_iptables_rule(&rule, &comment).await?;
        }
        Ok(())
    }

    async fn append_iptables_rule(&self, rule: &[String], comment: &str) -> Result<()> {
        let mut check_args: Vec<String> = vec!["-w".into()];
        check_args.extend(rule.iter().cloned());
        check_args.push("-m".into());
        check_args.push("comment".into());
        check_args.push("--comment".into());
        check_args.push(comment.to_string());
        let check_refs: Vec<&str> = std::iter::once("-C").chain(check_args[1..].iter().map(|s| s.as_str())).collect();
        let mut full_check = vec!["-w"];
        full_check.extend(check_refs);
        let (exists, _) = self.run("iptables", &full_check).await?;
        if exists {
            return Ok(());
        }

        let mut add_args: Vec<&str> = vec!["-w", "-A"];
        add_args.extend(rule.iter().map(|s| s.as_str()));
        add_args.extend(["-m", "comment", "--comment", comment]);
        let (ok, stderr) = self.run("iptables", &add_args).await?;
        if !ok {
            return Err(CyrisError::Network(format!("iptables -A failed: {stderr}")));
        }
        Ok(())
    }

    async fn remove_iptables_rule(&self, rule: &[String], comment: &str) -> Result<()> {
        let mut del_args: Vec<&str> = vec!["-w", "-D"];
        del_args.extend(rule.iter().map(|s| s.as_str()));
        del_args.extend(["-m", "comment", "--comment", comment]);
        let (ok, stderr) = self.run("iptables", &del_args).await?;
        if !ok && !stderr.to_lowercase().contains("no chain") && !stderr.to_lowercase().contains("does a matching rule exist") {
            warn!("iptables -D failed (continuing, force-tolerant): {stderr}");
        }
        Ok(())
    }

    /// Tears down exactly the rules tagged with this range+network, then
    /// deletes the bridge. Tolerates an already-missing bridge.
    #[instrument(skip(self))]
    pub async fn destroy_network(&self, range_id: &str, network_name: &str, cidr: &str) -> Result<()> {
        let bridge = bridge_name(range_id, network_name);
        let comment = format!("cyris:{range_id}:{network_name}");
        let rules: Vec<Vec<String>> = vec![
            vec!["-t".into(), "filter".into(), "FORWARD".into(), "-i".into(), bridge.clone(), "-o".into(), self.upstream_iface.clone(), "-j".into(), "ACCEPT".into()],
            vec!["-t".into(), "filter".into(), "FORWARD".into(), "-i".into(), self.upstream_iface.clone(), "-o".into(), bridge.clone(), "-m".into(), "state".into(), "--state".into(), "ESTABLISHED,RELATED".into(), "-j".into(), "ACCEPT".into()],
            vec!["-t".into(), "nat".into(), "POSTROUTING".into(), "-s".into(), cidr.into(), "-o".into(), self.upstream_iface.clone(), "-j".into(), "MASQUERADE".into()],
        ];
        for rule in rules {
            self.remove_iptables_rule(&rule, &comment).await?;
        }

        let (ok, stderr) = self.run("ip", &["link", "set", &bridge, "down"]).await?;
        if !ok && !stderr.contains("Cannot find device") {
            warn!("ip link set {bridge} down failed (continuing): {stderr}");
        }
        let (ok, stderr) = self.run("ip", &["link", "delete", &bridge, "type", "bridge"]).await?;
        if !ok && !stderr.contains("Cannot find device") {
            return Err(CyrisError::Network(format!("ip link delete {bridge} failed: {stderr}")));
        }

        self.cidr.release(range_id, network_name)?;
        Ok(())
    }

    /// Attaches a domain's tap interface to a bridge (post-start, if the
    /// domain XML didn't already declare the bridge source).
    #[instrument(skip(self))]
    pub async fn attach(&self, bridge: &str, tap_iface: &str) -> Result<()> {
        let (ok, stderr) = self.run("ip", &["link", "set", tap_iface, "master", bridge]).await?;
        if !ok {
            return Err(CyrisError::Network(format!("attaching {tap_iface} to {bridge} failed: {stderr}")));
        }
        Ok(())
    }
}

/// Returns the first usable host address of a `/24` (the `.1` address),
/// used as the bridge's gateway.
fn gateway_address(cidr: &str) -> Result<String> {
    let (addr, _prefix) = cidr
        .split_once('/')
        .ok_or_else(|| CyrisError::Network(format!("invalid CIDR '{cidr}'")))?;
    let octets: Vec<&str> = addr.split('.').collect();
    if octets.len() != 4 {
        return Err(CyrisError::Network(format!("invalid CIDR address '{addr}'")));
    }
    Ok(format!("{}.{}.{}.1", octets[0], octets[1], octets[2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bridge_name_is_within_interface_name_limit() {
        let name = bridge_name("some-long-range-id-123", "a-very-long-network-name");
        assert!(name.len() <= 15, "bridge name '{name}' exceeds 15 bytes");
        assert!(name.starts_with("cy-"));
    }

    #[test]
    fn gateway_is_first_usable_address() {
        assert_eq!(gateway_address("10.64.3.0/24").unwrap(), "10.64.3.1");
    }

    #[test]
    fn distinct_inputs_yield_distinct_bridge_names() {
        assert_ne!(bridge_name("r1", "n1"), bridge_name("r1", "n2"));
        assert_ne!(bridge_name("r1", "n1"), bridge_name("r2", "n1"));
    }
}
