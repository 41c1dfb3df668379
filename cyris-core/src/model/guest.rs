use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CyrisError, Result};
use crate::model::task::TaskKind;

/// Whether a guest's disk comes from a ready image, is built on demand, or
/// is provisioned on an external cloud. Only `PreBuilt` and `OnDemand` are
/// implemented by the KVM provider; `Cloud` is accepted at parse time but
/// rejected before any side effect, per the "cloud providers are out of
/// core" decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasevmType {
    PreBuilt,
    OnDemand,
    Cloud,
}

/// Coarse guest OS family, used only to pick sane domain-XML and firmware
/// defaults. Windows/BSD/other families are recognised but the task
/// executor's script envelope (§4.5) is specified for POSIX-capable,
/// non-Windows guests only — `is_windows` exists as the documented
/// extension point, nothing more.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GuestOsFamily {
    #[default]
    GenericLinux,
    Rhel,
    Debian,
    Suse,
    Arch,
    Fedora,
    WindowsServer,
    WindowsDesktop,
    FreeBsd,
    Other,
}

impl GuestOsFamily {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "rhel" | "rocky" | "rockylinux" | "almalinux" | "centos" => Self::Rhel,
            "debian" | "ubuntu" | "mint" => Self::Debian,
            "suse" | "sles" | "opensuse" | "opensuse-tumbleweed" | "opensuse-leap" => Self::Suse,
            "arch" | "manjaro" => Self::Arch,
            "fedora" => Self::Fedora,
            "windows_server" | "windowsserver" => Self::WindowsServer,
            "windows" | "windows_desktop" | "win10" | "win11" => Self::WindowsDesktop,
            "freebsd" => Self::FreeBsd,
            "linux" | "generic_linux" | "" => Self::GenericLinux,
            _ => Self::Other,
        }
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Self::WindowsServer | Self::WindowsDesktop)
    }

    pub fn is_linux(&self) -> bool {
        matches!(
            self,
            Self::GenericLinux | Self::Rhel | Self::Debian | Self::Suse | Self::Arch | Self::Fedora
        )
    }
}

/// A guest declared in a description's `guest_settings` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guest {
    pub guest_id: String,
    pub basevm_type: BasevmType,
    #[serde(default)]
    pub os_type: GuestOsFamily,

    /// Required when `basevm_type == OnDemand`: the image label passed to
    /// the image builder (e.g. `opensuse-tumbleweed`).
    #[serde(default)]
    pub image_name: Option<String>,
    /// Required when `basevm_type == PreBuilt`: path to a domain XML whose
    /// backing disk is cloned.
    #[serde(default)]
    pub basevm_config_file: Option<PathBuf>,

    #[serde(default = "default_vcpus")]
    pub vcpus: u32,
    #[serde(default = "default_memory_mib")]
    pub memory_mib: u64,
    #[serde(default = "default_disk_gib")]
    pub disk_gib: u64,

    /// Initial root/default-user credential material used by first-boot
    /// customisation (cloud-init or virt-sysprep style).
    #[serde(default)]
    pub root_password_hash: Option<String>,
    #[serde(default = "default_user")]
    pub default_user: String,

    #[serde(default)]
    pub tasks: Vec<TaskKind>,
}

fn default_vcpus() -> u32 {
    1
}
fn default_memory_mib() -> u64 {
    1024
}
fn default_disk_gib() -> u64 {
    10
}
fn default_user() -> String {
    "cyris".to_string()
}

impl Guest {
    /// Validates the pre-built/on-demand exclusivity invariant from §3.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_identifier(&self.guest_id) {
            return Err(CyrisError::Validation(format!(
                "guest_id '{}' contains characters outside [a-zA-Z0-9_-]",
                self.guest_id
            )));
        }
        match self.basevm_type {
            BasevmType::PreBuilt => {
                if self.basevm_config_file.is_none() {
                    return Err(CyrisError::Validation(format!(
                        "guest '{}' is basevm_type=pre-built but basevm_config_file is missing",
                        self.guest_id
                    )));
                }
                if self.image_name.is_some() {
                    return Err(CyrisError::Validation(format!(
                        "guest '{}' is basevm_type=pre-built but also sets image_name",
                        self.guest_id
                    )));
                }
            }
            BasevmType::OnDemand => {
                if self.image_name.is_none() {
                    return Err(CyrisError::Validation(format!(
                        "guest '{}' is basevm_type=on-demand but image_name is missing",
                        self.guest_id
                    )));
                }
                if self.basevm_config_file.is_some() {
                    return Err(CyrisError::Validation(format!(
                        "guest '{}' is basevm_type=on-demand but also sets basevm_config_file",
                        self.guest_id
                    )));
                }
            }
            BasevmType::Cloud => {
                return Err(CyrisError::Validation(format!(
                    "guest '{}': cloud (non-KVM) providers are out of scope for this orchestrator",
                    self.guest_id
                )));
            }
        }
        Ok(())
    }
}

/// Identifiers embedded in shell scripts must be free of metacharacters;
/// this is the single guard used by both `Guest::validate` and the task
/// executor's per-task parameter checks.
pub fn is_valid_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_prebuilt_fields() {
        let g = Guest {
            guest_id: "g1".into(),
            basevm_type: BasevmType::PreBuilt,
            os_type: GuestOsFamily::GenericLinux,
            image_name: None,
            basevm_config_file: None,
            vcpus: 1,
            memory_mib: 512,
            disk_gib: 5,
            root_password_hash: None,
            default_user: "cyris".into(),
            tasks: vec![],
        };
        assert!(g.validate().is_err());
    }

    #[test]
    fn rejects_shell_metacharacters_in_guest_id() {
        assert!(!is_valid_identifier("g1; rm -rf /"));
        assert!(is_valid_identifier("g1-entry_point"));
    }

    #[test]
    fn os_family_recognises_aliases() {
        assert_eq!(GuestOsFamily::from_str("rocky"), GuestOsFamily::Rhel);
        assert_eq!(GuestOsFamily::from_str("win11"), GuestOsFamily::WindowsDesktop);
        assert!(GuestOsFamily::WindowsDesktop.is_windows());
        assert!(!GuestOsFamily::Rhel.is_windows());
    }
}
