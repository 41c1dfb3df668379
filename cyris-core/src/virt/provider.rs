//! Component E: the KVM provider trait and its CLI-backed and mock
//! implementations, per §4.2.
//!
//! Grounded on `limiquantix-hypervisor::traits::Hypervisor` for the trait
//! shape and `limiquantix-hypervisor::mock::MockBackend` for the in-memory
//! test double, narrowed to exactly the operations §4.2 names (no
//! snapshots, migration, or hotplug — out of scope here).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::instrument;
use uuid::Uuid;

use crate::error::{CyrisError, Result};
use crate::model::GuestOsFamily;
use crate::virt::cli::VirtCli;
use crate::virt::image::{extract_backing_disk, parse_backing_file};
use crate::virt::xml::DomainXmlBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Firmware {
    Bios,
    Uefi,
}

#[derive(Debug, Clone)]
pub struct NicSpec {
    pub bridge_name: String,
    pub mac_address: String,
}

/// Everything needed to render and define one domain.
#[derive(Debug, Clone)]
pub struct DomainSpec {
    pub name: String,
    pub uuid: String,
    pub memory_mib: u64,
    pub vcpus: u32,
    pub disk_path: String,
    pub firmware: Firmware,
    pub os_family: GuestOsFamily,
    pub nics: Vec<NicSpec>,
}

/// The domain state machine from §4.2: `undefined -> defined -> running ->
/// (paused) -> shutoff -> undefined`, observed via `virsh domstate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainState {
    Running,
    Shutoff,
    Paused,
    Missing,
}

impl DomainState {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "running" => Self::Running,
            "paused" => Self::Paused,
            "shut off" | "shutoff" | "crashed" | "in shutdown" => Self::Shutoff,
            _ => Self::Missing,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainInfo {
    pub resource_id: String,
    pub status: DomainState,
    pub created_at: Option<DateTime<Utc>>,
    /// qemu-img backing-chain file, supplementing §4.2's contract per
    /// SPEC_FULL's additive "disk introspection" feature.
    pub backing_file: Option<String>,
}

/// A request to materialise a guest's disk, used by `ensure_image`.
#[derive(Debug, Clone)]
pub enum ImageSpec {
    PreBuilt { basevm_config_file: PathBuf },
    OnDemand { image_name: String, size_gib: u64, hostname: String, root_password_hash: Option<String>, authorized_key: Option<String> },
}

#[async_trait]
pub trait KvmProvider: Send + Sync {
    async fn ensure_image(&self, range_id: &str, guest_id: &str, instance_idx: u32, spec: &ImageSpec) -> Result<PathBuf>;
    async fn define(&self, spec: &DomainSpec) -> Result<String>;
    async fn start(&self, domain_name: &str) -> Result<()>;
    async fn stop(&self, domain_name: &str, graceful: bool) -> Result<()>;
    async fn destroy(&self, domain_name: &str) -> Result<()>;
    async fn status(&self, domain_names: &[String]) -> Result<HashMap<String, DomainState>>;
    async fn get_info(&self, domain_name: &str) -> Result<DomainInfo>;
}

/// The real, CLI-backed provider (component E using A+C+D).
pub struct CliKvmProvider {
    virt: VirtCli,
    storage_dir: PathBuf,
}

impl CliKvmProvider {
    pub fn new(libvirt_uri: impl Into<String>, storage_dir: PathBuf) -> Self {
        Self { virt: VirtCli::new(libvirt_uri), storage_dir }
    }
}

#[async_trait]
impl KvmProvider for CliKvmProvider {
    #[instrument(skip(self, spec))]
    async fn ensure_image(&self, range_id: &str, guest_id: &str, instance_idx: u32, spec: &ImageSpec) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.storage_dir)
            .await
            .map_err(|e| CyrisError::ImageBuild(format!("cannot create storage dir: {e}")))?;
        let disk_path = self.storage_dir.join(format!("{range_id}-{guest_id}-{instance_idx}.qcow2"));

        match spec {
            ImageSpec::PreBuilt { basevm_config_file } => {
                if !basevm_config_file.exists() {
                    return Err(CyrisError::ImageBuild(format!(
                        "basevm_config_file {} does not exist",
                        basevm_config_file.display()
                    )));
                }
                let backing = extract_backing_disk(basevm_config_file)?;
                let out = self.virt.qemu_img_create_with_backing(&backing, &disk_path).await?;
                if !out.success() {
                    return Err(CyrisError::ImageBuild(format!("qemu-img clone failed: {}", out.stderr)));
                }
            }
            ImageSpec::OnDemand { image_name, size_gib, hostname, root_password_hash, authorized_key } => {
                let out = self.virt.virt_builder(image_name, &disk_path, *size_gib).await?;
                if !out.success() {
                    return Err(CyrisError::ImageBuild(format!("virt-builder failed: {}", out.stderr)));
                }
                let out = self
                    .virt
                    .virt_customize(&disk_path, hostname, root_password_hash.as_deref(), authorized_key.as_deref())
                    .await?;
                if !out.success() {
                    return Err(CyrisError::ImageBuild(format!("virt-customize failed: {}", out.stderr)));
                }
            }
        }
        Ok(disk_path)
    }

    #[instrument(skip(self, spec))]
    async fn define(&self, spec: &DomainSpec) -> Result<String> {
        let xml = DomainXmlBuilder::new(spec).build();
        let xml_path = self.storage_dir.join(format!("{}.xml", spec.name));
        tokio::fs::write(&xml_path, &xml)
            .await
            .map_err(|e| CyrisError::Libvirt(format!("cannot write domain xml: {e}")))?;
        self.virt.define(&xml_path).await?;
        Ok(spec.name.clone())
    }

    #[instrument(skip(self))]
    async fn start(&self, domain_name: &str) -> Result<()> {
        self.virt.start(domain_name).await
    }

    #[instrument(skip(self))]
    async fn stop(&self, domain_name: &str, graceful: bool) -> Result<()> {
        if graceful {
            self.virt.shutdown(domain_name).await
        } else {
            self.virt.destroy_domain(domain_name).await
        }
    }

    #[instrument(skip(self))]
    async fn destroy(&self, domain_name: &str) -> Result<()> {
        self.virt.destroy_domain(domain_name).await?;
        self.virt.undefine(domain_name).await
    }

    #[instrument(skip(self, domain_names))]
    async fn status(&self, domain_names: &[String]) -> Result<HashMap<String, DomainState>> {
        let mut out = HashMap::new();
        for name in domain_names {
            let state = match self.virt.domstate(name).await? {
                Some(raw) => DomainState::parse(&raw),
                None => DomainState::Missing,
            };
            out.insert(name.clone(), state);
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    async fn get_info(&self, domain_name: &str) -> Result<DomainInfo> {
        let status = match self.virt.domstate(domain_name).await? {
            Some(raw) => DomainState::parse(&raw),
            None => DomainState::Missing,
        };
        let disk_path = self.storage_dir.join(format!("{domain_name}.qcow2"));
        let backing_file = if disk_path.exists() {
            self.virt
                .qemu_img_info_json(&disk_path)
                .await
                .ok()
                .and_then(|json| parse_backing_file(&json))
        } else {
            None
        };
        Ok(DomainInfo { resource_id: domain_name.to_string(), status, created_at: None, backing_file })
    }
}

/// In-memory provider for tests and `--dry-run`, grounded on
/// `limiquantix-hypervisor::mock::MockBackend`.
#[derive(Default)]
pub struct MockKvmProvider {
    domains: RwLock<HashMap<String, DomainState>>,
}

impl MockKvmProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl KvmProvider for MockKvmProvider {
    async fn ensure_image(&self, range_id: &str, guest_id: &str, instance_idx: u32, _spec: &ImageSpec) -> Result<PathBuf> {
        Ok(PathBuf::from(format!("/tmp/cyris-mock/{range_id}-{guest_id}-{instance_idx}.qcow2")))
    }

    async fn define(&self, spec: &DomainSpec) -> Result<String> {
        let mut domains = self.domains.write().await;
        if domains.contains_key(&spec.name) {
            return Err(CyrisError::Libvirt(format!("domain '{}' already defined", spec.name)));
        }
        domains.insert(spec.name.clone(), DomainState::Shutoff);
        Ok(spec.name.clone())
    }

    async fn start(&self, domain_name: &str) -> Result<()> {
        let mut domains = self.domains.write().await;
        let state = domains
            .get_mut(domain_name)
            .ok_or_else(|| CyrisError::Libvirt(format!("domain '{domain_name}' not defined")))?;
        *state = DomainState::Running;
        Ok(())
    }

    async fn stop(&self, domain_name: &str, _graceful: bool) -> Result<()> {
        let mut domains = self.domains.write().await;
        if let Some(state) = domains.get_mut(domain_name) {
            *state = DomainState::Shutoff;
        }
        Ok(())
    }

    async fn destroy(&self, domain_name: &str) -> Result<()> {
        self.domains.write().await.remove(domain_name);
        Ok(())
    }

    async fn status(&self, domain_names: &[String]) -> Result<HashMap<String, DomainState>> {
        let domains = self.domains.read().await;
        Ok(domain_names
            .iter()
            .map(|n| (n.clone(), *domains.get(n).unwrap_or(&DomainState::Missing)))
            .collect())
    }

    async fn get_info(&self, domain_name: &str) -> Result<DomainInfo> {
        let domains = self.domains.read().await;
        let status = *domains.get(domain_name).unwrap_or(&DomainState::Missing);
        Ok(DomainInfo { resource_id: domain_name.to_string(), status, created_at: Some(Utc::now()), backing_file: None })
    }
}

pub fn new_domain_uuid() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> DomainSpec {
        DomainSpec {
            name: name.to_string(),
            uuid: new_domain_uuid(),
            memory_mib: 512,
            vcpus: 1,
            disk_path: "/tmp/x.qcow2".into(),
            firmware: Firmware::Bios,
            os_family: GuestOsFamily::GenericLinux,
            nics: vec![],
        }
    }

    #[tokio::test]
    async fn mock_provider_lifecycle() {
        let p = MockKvmProvider::new();
        let name = p.define(&spec("d1")).await.unwrap();
        assert_eq!(p.status(&[name.clone()]).await.unwrap()[&name], DomainState::Shutoff);
        p.start(&name).await.unwrap();
        assert_eq!(p.status(&[name.clone()]).await.unwrap()[&name], DomainState::Running);
        p.destroy(&name).await.unwrap();
        assert_eq!(p.status(&[name.clone()]).await.unwrap()[&name], DomainState::Missing);
    }

    #[tokio::test]
    async fn mock_provider_rejects_duplicate_define() {
        let p = MockKvmProvider::new();
        p.define(&spec("dup")).await.unwrap();
        assert!(p.define(&spec("dup")).await.is_err());
    }
}
