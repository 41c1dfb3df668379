//! Component I: the range orchestrator. Owns a range's lifecycle end to
//! end, sequencing A–H per §4.1.
//!
//! Grounded on `limiquantix-node::service` for the "one struct holds
//! `Arc<dyn Provider>` plus every subsystem and exposes a handful of public
//! operations" shape; the gRPC surface that struct serves has no
//! counterpart here.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::process::Command;
use tracing::{info, instrument, warn};

use crate::error::{CyrisError, Result};
use crate::ip_discovery::{self, DiscoveryTarget, IpCache};
use crate::model::{
    BasevmType, Description, Guest, ManagedBridge, ManagedDomain, RangeRecord, RangeState,
};
use crate::network::cidr::CidrAllocator;
use crate::network::topology::{bridge_name, NetworkTopologyManager};
use crate::orchestrator::persistence::RangeStore;
use crate::privilege::PrivilegeBroker;
use crate::ssh::{wait_for_ssh_ready, SshAuth, SshChannel};
use crate::tasks::execute_guest_tasks;
use crate::virt::cli::VirtCli;
use crate::virt::provider::{DomainSpec, DomainState, Firmware, ImageSpec, KvmProvider, NicSpec};
use crate::virt::xml::mac_for;

const REQUIRED_TOOLS: &[&str] = &["virsh", "virt-builder", "virt-customize", "qemu-img", "ip", "iptables"];
const DEFAULT_DISCOVERY_DEADLINE: Duration = Duration::from_secs(180);
const DEFAULT_SSH_PORT: u16 = 22;

/// Static configuration for one orchestrator instance, resolved from the
/// global config (env + INI) before any range operation runs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub base_path: PathBuf,
    pub libvirt_uri: String,
    pub cidr_pool: String,
    pub upstream_iface: String,
    pub discovery_deadline: Duration,
    pub default_firmware: Firmware,
    /// Operator-supplied keypair to copy into each range instead of
    /// generating a fresh one, when set (`CYRIS_SSH_KEY`).
    pub ssh_key_override: Option<PathBuf>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/var/lib/cyris"),
            libvirt_uri: "qemu:///system".to_string(),
            cidr_pool: "10.64.0.0/10".to_string(),
            upstream_iface: "eth0".to_string(),
            discovery_deadline: DEFAULT_DISCOVERY_DEADLINE,
            default_firmware: Firmware::Bios,
            ssh_key_override: None,
        }
    }
}

/// Per-guest outcome from the discovery+reachability stage: an IP was
/// resolved, SSH answered (or not), within the configured deadline.
struct GuestRuntime {
    guest_id: String,
    domain_name: String,
    ip_address: Option<String>,
    ssh_ready: bool,
}

/// A view of one guest suitable for an operator to connect, returned by
/// `ssh_info`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SshInfo {
    pub guest_id: String,
    pub domain_name: String,
    pub ip_address: Option<String>,
    pub port: u16,
    pub username: String,
    pub key_path: PathBuf,
}

/// A merged, non-persisted view of a range's live state, returned by
/// `status`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RangeStatus {
    pub range_id: String,
    pub state: RangeState,
    pub domains: Vec<DomainStatusView>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DomainStatusView {
    pub domain_name: String,
    pub guest_id: String,
    pub live_state: DomainState,
    pub ip_address: Option<String>,
}

pub struct RangeOrchestrator {
    config: OrchestratorConfig,
    store: RangeStore,
    provider: Arc<dyn KvmProvider>,
    virt: VirtCli,
    ip_cache: IpCache,
    privilege: PrivilegeBroker,
}

impl RangeOrchestrator {
    pub fn new(config: OrchestratorConfig, provider: Arc<dyn KvmProvider>) -> Self {
        let store = RangeStore::new(&config.base_path);
        let virt = VirtCli::new(&config.libvirt_uri);
        Self { config, store, provider, virt, ip_cache: IpCache::new(), privilege: PrivilegeBroker::new() }
    }

    fn topology_manager(&self) -> Result<NetworkTopologyManager> {
        let cidr = CidrAllocator::new(self.store.network_alloc_path(), &self.config.cidr_pool)?;
        Ok(NetworkTopologyManager::new(cidr, self.config.upstream_iface.clone()))
    }

    /// Creates a range from a parsed description, per §4.1's 7-step
    /// pipeline. Returns the (operator-chosen or generated) `range_id`.
    ///
    /// `build_only` stops after step 4 (images + domains): discovery, SSH
    /// readiness, and task execution (steps 5-7) are skipped and the range
    /// is left `Active` on the strength of the domains alone.
    #[instrument(skip(self, description))]
    pub async fn create(&self, description: &Description, build_only: bool) -> Result<String> {
        let range_id = description.clone.range_id.clone().unwrap_or_else(|| format!("r{}", random_hex(6)));

        if let Ok(existing) = self.store.load(&range_id) {
            if matches!(existing.state, RangeState::Active | RangeState::Creating | RangeState::Destroying) {
                return Err(CyrisError::Validation(format!(
                    "range '{range_id}' already exists in state {:?}",
                    existing.state
                )));
            }
        }

        let mut record = RangeRecord::new(&range_id, description_hash(description));
        self.store.save(&record)?;

        match self.run_early_pipeline(&range_id, description, &mut record).await {
            Ok(()) => {}
            Err((step, e)) => {
                warn!(step, error = %e, "create failed during an early (rollback-eligible) step");
                record.mark_error(step, e.to_string());
                self.store.save(&record).ok();
                if let Err(rollback_err) = self.rollback(&range_id, &record).await {
                    warn!(error = %rollback_err, "rollback after early failure was itself incomplete");
                }
                return Err(e);
            }
        }

        if build_only {
            record.state = RangeState::Active;
            record.touch();
            self.store.save(&record)?;
            return Ok(range_id);
        }

        let guest_runtimes = self.discover_and_connect(&range_id, description, &mut record).await;
        self.run_tasks(description, &guest_runtimes, &mut record).await;

        let entry_point_ok = match &description.clone.entry_point {
            Some(entry) => guest_runtimes.iter().any(|g| &g.guest_id == entry && g.ssh_ready),
            None => guest_runtimes.iter().any(|g| g.ssh_ready),
        };

        if entry_point_ok {
            record.state = RangeState::Active;
        } else {
            record.mark_error("discover_and_connect", "no guest (entry point or otherwise) became reachable");
        }
        record.touch();
        self.store.save(&record)?;
        Ok(range_id)
    }

    /// Steps 1–4: privilege, images, networks, domains. Any failure here is
    /// rolled back in full, per §4.1's failure policy.
    async fn run_early_pipeline(
        &self,
        range_id: &str,
        description: &Description,
        record: &mut RangeRecord,
    ) -> std::result::Result<(), (&'static str, CyrisError)> {
        self.store.ensure_layout(range_id).map_err(|e| ("ensure_layout", e))?;

        self.privilege
            .ensure("create range", REQUIRED_TOOLS)
            .await
            .map_err(|e| ("ensure_privilege", e))?;

        let key_path = self.store.keys_dir(range_id).join("id_ed25519");
        let public_key = match &self.config.ssh_key_override {
            Some(operator_key) => adopt_operator_keypair(operator_key, &key_path).await.map_err(|e| ("ensure_keypair", e))?,
            None => ensure_keypair(&key_path).await.map_err(|e| ("ensure_keypair", e))?,
        };
        record.ssh_key_fingerprint = Some(public_key.clone());
        self.store.save(record).map_err(|e| ("persist_key", e))?;

        let topology = self.topology_manager().map_err(|e| ("topology_manager_init", e))?;
        for network in &description.clone.topology {
            let (bridge, cidr) =
                topology.create_network(range_id, &network.name).await.map_err(|e| ("create_network", e))?;
            record.bridges.push(ManagedBridge { bridge_name: bridge, network_name: network.name.clone(), cidr });
            self.store.save(record).map_err(|e| ("persist_bridge", e))?;
        }

        for guest in &description.guests {
            let instance_count = *description.clone.instance_count.get(&guest.guest_id).unwrap_or(&1);
            for idx in 0..instance_count {
                let domain_name = format!("range{range_id}-{}-{idx}-{}", guest.guest_id, random_hex(8));
                let disk_path = self
                    .ensure_guest_image(range_id, guest, idx, &domain_name, &public_key)
                    .await
                    .map_err(|e| ("ensure_image", e))?;

                let nics = self
                    .nics_for_guest(range_id, description, guest, &record.bridges, &record.domains)
                    .map_err(|e| ("resolve_nics", e))?;
                let mac_addresses = nics.iter().map(|n| n.mac_address.clone()).collect();

                let spec = DomainSpec {
                    name: domain_name.clone(),
                    uuid: crate::virt::provider::new_domain_uuid(),
                    memory_mib: guest.memory_mib,
                    vcpus: guest.vcpus,
                    disk_path: disk_path.to_string_lossy().into_owned(),
                    firmware: self.config.default_firmware,
                    os_family: guest.os_type,
                    nics,
                };
                self.provider.define(&spec).await.map_err(|e| ("define_domain", e))?;
                self.provider.start(&domain_name).await.map_err(|e| ("start_domain", e))?;

                record.domains.push(ManagedDomain {
                    domain_name,
                    guest_id: guest.guest_id.clone(),
                    instance_idx: idx,
                    ip_address: None,
                    mac_addresses,
                });
                self.store.save(record).map_err(|e| ("persist_domain", e))?;
            }
        }

        Ok(())
    }

    async fn ensure_guest_image(
        &self,
        range_id: &str,
        guest: &Guest,
        idx: u32,
        domain_name: &str,
        public_key: &str,
    ) -> Result<PathBuf> {
        let spec = match guest.basevm_type {
            BasevmType::PreBuilt => ImageSpec::PreBuilt {
                basevm_config_file: guest
                    .basevm_config_file
                    .clone()
                    .ok_or_else(|| CyrisError::Validation(format!("guest '{}' missing basevm_config_file", guest.guest_id)))?,
            },
            BasevmType::OnDemand => ImageSpec::OnDemand {
                image_name: guest
                    .image_name
                    .clone()
                    .ok_or_else(|| CyrisError::Validation(format!("guest '{}' missing image_name", guest.guest_id)))?,
                size_gib: guest.disk_gib,
                hostname: domain_name.to_string(),
                root_password_hash: guest.root_password_hash.clone(),
                authorized_key: Some(public_key.to_string()),
            },
            BasevmType::Cloud => {
                return Err(CyrisError::Validation(format!("guest '{}': cloud providers are out of scope", guest.guest_id)))
            }
        };
        let disk_path = self.provider.ensure_image(range_id, &guest.guest_id, idx, &spec).await?;

        if guest.basevm_type == BasevmType::PreBuilt {
            let out = self.virt.virt_customize(&disk_path, domain_name, guest.root_password_hash.as_deref(), Some(public_key)).await?;
            if !out.success() {
                return Err(CyrisError::ImageBuild(format!("virt-customize (ssh key injection) failed: {}", out.stderr)));
            }
        }
        Ok(disk_path)
    }

    /// Resolves one guest's NICs, rehashing `mac_for`'s salt until the
    /// candidate MAC is absent from every domain already generated for
    /// this range (per §4.2's collision tie-break).
    fn nics_for_guest(
        &self,
        range_id: &str,
        description: &Description,
        guest: &Guest,
        bridges: &[ManagedBridge],
        existing_domains: &[ManagedDomain],
    ) -> Result<Vec<NicSpec>> {
        let mut used_macs: std::collections::HashSet<String> =
            existing_domains.iter().flat_map(|d| d.mac_addresses.iter().cloned()).collect();

        let mut nics = Vec::new();
        for network in &description.clone.topology {
            for (iface_idx, member) in network.members.iter().filter(|m| m.guest_id == guest.guest_id).enumerate() {
                let bridge = bridges
                    .iter()
                    .find(|b| b.network_name == network.name)
                    .ok_or_else(|| CyrisError::Internal(format!("bridge for network '{}' not yet created", network.name)))?;

                let mut salt = 0u32;
                let mac = loop {
                    let candidate = mac_for(range_id, &guest.guest_id, iface_idx as u32, &member.iface, salt);
                    if !used_macs.contains(&candidate) {
                        break candidate;
                    }
                    salt += 1;
                };
                used_macs.insert(mac.clone());
                nics.push(NicSpec { bridge_name: bridge.bridge_name.clone(), mac_address: mac });
            }
        }
        Ok(nics)
    }

    /// Steps 5: IP discovery + SSH reachability, per domain. Failures here
    /// are recorded per-guest, not rolled back — §4.1 steps 5-7 policy.
    async fn discover_and_connect(
        &self,
        range_id: &str,
        description: &Description,
        record: &mut RangeRecord,
    ) -> Vec<GuestRuntime> {
        let key_path = self.store.keys_dir(range_id).join("id_ed25519");
        let mut runtimes = Vec::with_capacity(record.domains.len());

        for domain in &mut record.domains {
            let network_name = description
                .clone
                .topology
                .iter()
                .find(|n| n.members.iter().any(|m| m.guest_id == domain.guest_id))
                .map(|n| n.name.clone())
                .unwrap_or_default();

            let target = DiscoveryTarget {
                domain_name: domain.domain_name.clone(),
                mac_addresses: domain.mac_addresses.clone(),
                network_name,
                topology_assigned_ip: None,
            };

            let discovery = ip_discovery::resolve(&self.ip_cache, &self.virt, target, None, Some(self.config.discovery_deadline)).await;
            let ip_address = match discovery {
                Ok(Some(entry)) => entry.ip_addresses.into_iter().next(),
                Ok(None) => None,
                Err(e) => {
                    warn!(domain = domain.domain_name, error = %e, "ip discovery did not complete");
                    None
                }
            };
            domain.ip_address = ip_address.clone();

            let guest = description.guests.iter().find(|g| g.guest_id == domain.guest_id);
            let username = guest.map(|g| g.default_user.clone()).unwrap_or_else(|| "cyris".to_string());

            let ssh_ready = if let Some(ip) = &ip_address {
                let auth = SshAuth::PrivateKey { path: key_path.clone(), passphrase: None };
                match wait_for_ssh_ready(ip, DEFAULT_SSH_PORT, &username, &auth).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(domain = domain.domain_name, error = %e, "ssh never became reachable");
                        false
                    }
                }
            } else {
                false
            };

            runtimes.push(GuestRuntime {
                guest_id: domain.guest_id.clone(),
                domain_name: domain.domain_name.clone(),
                ip_address,
                ssh_ready,
            });
        }

        self.store.save(record).ok();
        runtimes
    }

    /// Step 6: per-guest task execution, sequential within a guest.
    async fn run_tasks(&self, description: &Description, runtimes: &[GuestRuntime], record: &mut RangeRecord) {
        let key_path = self.store.keys_dir(&record.range_id).join("id_ed25519");

        for runtime in runtimes {
            if !runtime.ssh_ready {
                continue;
            }
            let Some(guest) = description.guests.iter().find(|g| g.guest_id == runtime.guest_id) else { continue };
            if guest.tasks.is_empty() {
                continue;
            }
            let Some(ip) = &runtime.ip_address else { continue };

            let auth = SshAuth::PrivateKey { path: key_path.clone(), passphrase: None };
            let channel = match SshChannel::connect(ip, DEFAULT_SSH_PORT, &guest.default_user, &auth, Duration::from_secs(10)).await {
                Ok(c) => c,
                Err(e) => {
                    warn!(guest = guest.guest_id, error = %e, "could not open ssh channel for task execution");
                    continue;
                }
            };

            let records = execute_guest_tasks(&channel, &guest.guest_id, &guest.tasks).await;
            record.tasks.extend(records);
        }
        self.store.save(record).ok();
    }

    /// Tears down whatever was created so far: domains first (reverse of
    /// definition order), then bridges/NAT. Tolerant of partially-missing
    /// resources.
    async fn rollback(&self, range_id: &str, record: &RangeRecord) -> Result<()> {
        for domain in record.domains.iter().rev() {
            self.provider.destroy(&domain.domain_name).await.ok();
        }
        let topology = self.topology_manager()?;
        for bridge in record.bridges.iter().rev() {
            topology.destroy_network(range_id, &bridge.network_name, &bridge.cidr).await.ok();
        }
        Ok(())
    }

    /// Destroys a range, tearing down in reverse creation order. Tolerates
    /// missing resources (prior partial destruction). Under `force`, an
    /// unknown or already-destroyed range_id is a no-op (`Ok(())`); without
    /// it, both are reported as errors rather than silently succeeding.
    #[instrument(skip(self))]
    pub async fn destroy(&self, range_id: &str, force: bool) -> Result<()> {
        let mut record = match self.store.load(range_id) {
            Ok(record) => record,
            Err(e) => return if force { Ok(()) } else { Err(e) },
        };

        if record.state == RangeState::Destroyed {
            return if force {
                Ok(())
            } else {
                Err(CyrisError::Validation(format!("range '{range_id}' is already destroyed")))
            };
        }

        record.state = RangeState::Destroying;
        record.touch();
        self.store.save(&record)?;

        for domain in record.domains.iter().rev() {
            if let Err(e) = self.provider.destroy(&domain.domain_name).await {
                warn!(domain = domain.domain_name, error = %e, "failed to destroy domain");
                if !force {
                    record.mark_error("destroy_domain", e.to_string());
                    self.store.save(&record)?;
                    return Err(e);
                }
            }
        }

        let topology = self.topology_manager()?;
        for bridge in record.bridges.iter().rev() {
            if let Err(e) = topology.destroy_network(range_id, &bridge.network_name, &bridge.cidr).await {
                warn!(bridge = bridge.bridge_name, error = %e, "failed to destroy network");
                if !force {
                    record.mark_error("destroy_network", e.to_string());
                    self.store.save(&record)?;
                    return Err(e);
                }
            }
        }

        record.state = RangeState::Destroyed;
        record.domains.clear();
        record.bridges.clear();
        record.nat_rules.clear();
        record.touch();
        self.store.save(&record)?;
        info!(range_id, "range destroyed");
        Ok(())
    }

    /// Merges persisted state with live provider/discovery state, without
    /// mutating the record.
    #[instrument(skip(self))]
    pub async fn status(&self, range_id: &str) -> Result<RangeStatus> {
        let record = self.store.load(range_id)?;
        let domain_names: Vec<String> = record.domains.iter().map(|d| d.domain_name.clone()).collect();
        let live = self.provider.status(&domain_names).await.unwrap_or_default();

        let mut domains = Vec::with_capacity(record.domains.len());
        for domain in &record.domains {
            let ip_address = match self.ip_cache.get(&domain.domain_name, Some(chrono::Duration::seconds(60))).await {
                Some(entry) => entry.ip_addresses.into_iter().next(),
                None => domain.ip_address.clone(),
            };
            domains.push(DomainStatusView {
                domain_name: domain.domain_name.clone(),
                guest_id: domain.guest_id.clone(),
                live_state: *live.get(&domain.domain_name).unwrap_or(&DomainState::Missing),
                ip_address,
            });
        }

        Ok(RangeStatus { range_id: record.range_id, state: record.state, domains, error_message: record.error_message })
    }

    /// Enumerates all persisted ranges.
    pub fn list(&self) -> Result<Vec<RangeRecord>> {
        self.store.list()
    }

    /// Per-guest connection info for an operator, using the IP cache with
    /// a generous 60s staleness tolerance (status-call tier, per §4.4).
    #[instrument(skip(self))]
    pub async fn ssh_info(&self, range_id: &str) -> Result<Vec<SshInfo>> {
        let record = self.store.load(range_id)?;
        let key_path = self.store.keys_dir(range_id).join("id_ed25519");
        let mut out = Vec::with_capacity(record.domains.len());
        for domain in &record.domains {
            let ip_address = match self.ip_cache.get(&domain.domain_name, Some(chrono::Duration::seconds(60))).await {
                Some(entry) => entry.ip_addresses.into_iter().next(),
                None => domain.ip_address.clone(),
            };
            out.push(SshInfo {
                guest_id: domain.guest_id.clone(),
                domain_name: domain.domain_name.clone(),
                ip_address,
                port: DEFAULT_SSH_PORT,
                username: "cyris".to_string(),
                key_path: key_path.clone(),
            });
        }
        Ok(out)
    }
}

/// Generates an ed25519 keypair at `path` (and `path.pub`) via `ssh-keygen`
/// if one does not already exist, returning the public key text.
async fn ensure_keypair(path: &std::path::Path) -> Result<String> {
    let pub_path = path.with_extension("pub").to_string_lossy().into_owned();
    let pub_path = if pub_path.ends_with(".pub") { pub_path } else { format!("{}.pub", path.display()) };
    let pub_path = std::path::PathBuf::from(pub_path);

    if !path.exists() {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| CyrisError::Internal(format!("cannot create keys dir: {e}")))?;
        }
        let output = Command::new("ssh-keygen")
            .args(["-t", "ed25519", "-N", "", "-f", &path.to_string_lossy(), "-q"])
            .output()
            .await
            .map_err(|e| CyrisError::Internal(format!("failed to spawn ssh-keygen: {e}")))?;
        if !output.status.success() {
            return Err(CyrisError::Internal(format!(
                "ssh-keygen failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
    }
    tokio::fs::read_to_string(&pub_path)
        .await
        .map(|s| s.trim().to_string())
        .map_err(|e| CyrisError::Internal(format!("cannot read generated public key: {e}")))
}

/// Copies an operator-supplied keypair (`CYRIS_SSH_KEY`) into the range's
/// key directory instead of generating a fresh one, returning the public
/// key text.
async fn adopt_operator_keypair(operator_key: &std::path::Path, dest: &std::path::Path) -> Result<String> {
    let operator_pub = operator_key.with_extension("pub");
    let operator_pub = if operator_pub.exists() {
        operator_pub
    } else {
        std::path::PathBuf::from(format!("{}.pub", operator_key.display()))
    };

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| CyrisError::Internal(format!("cannot create keys dir: {e}")))?;
    }
    tokio::fs::copy(operator_key, dest)
        .await
        .map_err(|e| CyrisError::Validation(format!("cannot read operator ssh key {}: {e}", operator_key.display())))?;
    let dest_pub = dest.with_extension("pub");
    tokio::fs::copy(&operator_pub, &dest_pub)
        .await
        .map_err(|e| CyrisError::Validation(format!("cannot read operator public key {}: {e}", operator_pub.display())))?;

    tokio::fs::read_to_string(&dest_pub)
        .await
        .map(|s| s.trim().to_string())
        .map_err(|e| CyrisError::Internal(format!("cannot read adopted public key: {e}")))
}

fn random_hex(len: usize) -> String {
    const CHARS: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    (0..len).map(|_| CHARS[rng.gen_range(0..CHARS.len())] as char).collect()
}

/// A stable hash of a description's content, stored on the range record so
/// operators can detect drift between a description file and an active range.
fn description_hash(description: &Description) -> String {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    for guest in &description.guests {
        guest.guest_id.hash(&mut hasher);
        guest.image_name.hash(&mut hasher);
    }
    description.clone.range_id.hash(&mut hasher);
    format!("{:x}", hasher.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_hex_has_requested_length_and_is_hex() {
        let h = random_hex(8);
        assert_eq!(h.len(), 8);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn description_hash_is_stable_for_identical_input() {
        let desc = sample_description();
        assert_eq!(description_hash(&desc), description_hash(&desc));
    }

    fn sample_description() -> Description {
        use crate::model::{CloneSettings, Host};
        Description {
            hosts: vec![Host::new("h1", "127.0.0.1")],
            guests: vec![],
            clone: CloneSettings { range_id: Some("101".into()), instance_count: HashMap::new(), entry_point: None, topology: vec![] },
        }
    }
}
