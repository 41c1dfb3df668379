//! Global configuration: environment variables override an optional legacy
//! INI file, which overrides built-in defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

const DEFAULT_CIDR_POOL: &str = "10.64.0.0/10";
const DEFAULT_UPSTREAM_IFACE: &str = "eth0";
const DEFAULT_MAX_WORKERS: usize = 4;
const SYSTEM_LIBVIRT_SOCKET: &str = "/var/run/libvirt/libvirt-sock";

/// Resolved global configuration, independent of any one range.
#[derive(Debug, Clone, Serialize)]
pub struct GlobalConfig {
    pub base_path: PathBuf,
    pub libvirt_uri: String,
    /// Operator-supplied identity to use instead of generating a fresh
    /// keypair per range, when set.
    pub ssh_key: Option<PathBuf>,
    pub max_workers: usize,
    pub cidr_pool: String,
    pub upstream_iface: String,
    pub no_color: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("/var/lib/cyris"),
            libvirt_uri: default_libvirt_uri(),
            ssh_key: None,
            max_workers: DEFAULT_MAX_WORKERS,
            cidr_pool: DEFAULT_CIDR_POOL.to_string(),
            upstream_iface: DEFAULT_UPSTREAM_IFACE.to_string(),
            no_color: false,
        }
    }
}

/// `qemu:///system` if the system libvirtd socket exists, `qemu:///session`
/// otherwise — the fallback spec.md §6 asks for.
fn default_libvirt_uri() -> String {
    if Path::new(SYSTEM_LIBVIRT_SOCKET).exists() {
        "qemu:///system".to_string()
    } else {
        "qemu:///session".to_string()
    }
}

impl GlobalConfig {
    /// Loads defaults, applies an INI file (explicit `--config` path, or
    /// `~/.cyris/config.ini` if present), then applies environment
    /// variable overrides — the precedence order from SPEC_FULL §1.3.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let ini_path = config_path.map(PathBuf::from).or_else(default_config_path);
        if let Some(path) = ini_path {
            if path.exists() {
                config.apply_ini_file(&path).with_context(|| format!("failed to load config file: {}", path.display()))?;
            }
        }

        config.apply_env();
        Ok(config)
    }

    fn apply_ini_file(&mut self, path: &Path) -> Result<()> {
        let ini = ini::Ini::load_from_file(path).with_context(|| format!("cannot parse INI file: {}", path.display()))?;
        let Some(section) = ini.section(Some("cyris")).or_else(|| ini.section::<String>(None)) else {
            return Ok(());
        };

        if let Some(v) = section.get("base_path") {
            self.base_path = PathBuf::from(v);
        }
        if let Some(v) = section.get("libvirt_uri") {
            self.libvirt_uri = v.to_string();
        }
        if let Some(v) = section.get("ssh_key") {
            self.ssh_key = Some(PathBuf::from(v));
        }
        if let Some(v) = section.get("max_workers") {
            self.max_workers = v.parse().with_context(|| format!("invalid max_workers value: {v}"))?;
        }
        if let Some(v) = section.get("cidr_pool") {
            self.cidr_pool = v.to_string();
        }
        if let Some(v) = section.get("upstream_iface") {
            self.upstream_iface = v.to_string();
        }
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CYRIS_BASE") {
            self.base_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CYRIS_LIBVIRT_URI") {
            self.libvirt_uri = v;
        }
        if let Ok(v) = std::env::var("CYRIS_SSH_KEY") {
            self.ssh_key = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("CYRIS_MAX_WORKERS") {
            if let Ok(n) = v.parse() {
                self.max_workers = n;
            }
        }
        self.no_color = std::env::var("NO_COLOR").is_ok();
    }

    /// A commented INI template suitable for `config-init`'s output.
    pub fn template() -> String {
        format!(
            r#"; cyris global configuration.
; Environment variables (CYRIS_BASE, CYRIS_LIBVIRT_URI, CYRIS_SSH_KEY,
; CYRIS_MAX_WORKERS, NO_COLOR) take precedence over this file.
[cyris]
base_path = /var/lib/cyris
libvirt_uri = {}
; ssh_key = /home/operator/.ssh/cyris_id_ed25519
max_workers = {}
cidr_pool = {}
upstream_iface = {}
"#,
            default_libvirt_uri(),
            DEFAULT_MAX_WORKERS,
            DEFAULT_CIDR_POOL,
            DEFAULT_UPSTREAM_IFACE,
        )
    }

    /// A YAML rendering of the resolved configuration with secret-shaped
    /// fields redacted, for `config-show`.
    pub fn redacted_yaml(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Redacted<'a> {
            base_path: &'a Path,
            libvirt_uri: &'a str,
            ssh_key: Option<String>,
            max_workers: usize,
            cidr_pool: &'a str,
            upstream_iface: &'a str,
            no_color: bool,
        }
        let view = Redacted {
            base_path: &self.base_path,
            libvirt_uri: &self.libvirt_uri,
            ssh_key: self.ssh_key.as_ref().map(|_| "<redacted>".to_string()),
            max_workers: self.max_workers,
            cidr_pool: &self.cidr_pool,
            upstream_iface: &self.upstream_iface,
            no_color: self.no_color,
        };
        Ok(serde_yaml::to_string(&view)?)
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".cyris").join("config.ini"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ini_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "[cyris]\nbase_path = /opt/cyris\nmax_workers = 8\n").unwrap();

        let mut config = GlobalConfig::default();
        config.apply_ini_file(&path).unwrap();
        assert_eq!(config.base_path, PathBuf::from("/opt/cyris"));
        assert_eq!(config.max_workers, 8);
    }

    #[test]
    fn env_vars_override_ini_file() {
        std::env::set_var("CYRIS_BASE", "/env/base");
        let mut config = GlobalConfig::default();
        config.apply_env();
        assert_eq!(config.base_path, PathBuf::from("/env/base"));
        std::env::remove_var("CYRIS_BASE");
    }

    #[test]
    fn redacted_yaml_hides_ssh_key_path() {
        let mut config = GlobalConfig::default();
        config.ssh_key = Some(PathBuf::from("/home/op/.ssh/id_ed25519"));
        let yaml = config.redacted_yaml().unwrap();
        assert!(!yaml.contains("id_ed25519"));
        assert!(yaml.contains("redacted"));
    }
}
