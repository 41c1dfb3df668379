use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CyrisError, Result};
use crate::model::clone_spec::CloneSettings;
use crate::model::guest::Guest;
use crate::model::host::Host;

/// A parsed range description: the YAML document's `host_settings`,
/// `guest_settings`, and `clone_settings` sections, fully validated and
/// with operator-provided paths resolved to absolute, per §9's
/// "relative/absolute path confusion" design note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Description {
    pub hosts: Vec<Host>,
    pub guests: Vec<Guest>,
    pub clone: CloneSettings,
}

/// Raw shape of the YAML document before path resolution/validation.
#[derive(Debug, Deserialize)]
struct RawDescription {
    #[serde(default)]
    host_settings: Vec<Host>,
    #[serde(default)]
    guest_settings: Vec<Guest>,
    clone_settings: CloneSettings,
}

/// Parses a description file, resolving relative paths against its parent
/// directory and running full cross-reference validation.
pub fn parse_description(path: &Path) -> Result<Description> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CyrisError::Validation(format!("cannot read description {}: {e}", path.display())))?;
    parse_description_str(&text, path.parent())
}

pub fn parse_description_str(text: &str, base_dir: Option<&Path>) -> Result<Description> {
    let raw: RawDescription = serde_yaml::from_str(text)
        .map_err(|e| CyrisError::Validation(format!("description is not valid YAML: {e}")))?;

    if raw.host_settings.is_empty() {
        return Err(CyrisError::Validation("description declares no hosts".into()));
    }
    if raw.guest_settings.is_empty() {
        return Err(CyrisError::Validation("description declares no guests".into()));
    }

    let mut guests = raw.guest_settings;
    for guest in &mut guests {
        guest.validate()?;
        if let Some(base) = base_dir {
            if let Some(cfg) = &guest.basevm_config_file {
                if cfg.is_relative() {
                    guest.basevm_config_file = Some(base.join(cfg));
                }
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    for g in &guests {
        if !seen.insert(&g.guest_id) {
            return Err(CyrisError::Validation(format!("duplicate guest_id '{}'", g.guest_id)));
        }
    }

    let guest_ids: Vec<String> = guests.iter().map(|g| g.guest_id.clone()).collect();
    raw.clone_settings.validate(&guest_ids)?;

    Ok(Description { hosts: raw.host_settings, guests, clone: raw.clone_settings })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
host_settings:
  - host_id: h1
    mgmt_addr: 127.0.0.1
guest_settings:
  - guest_id: g1
    basevm_type: pre_built
    basevm_config_file: fixtures/basevm.xml
clone_settings:
  range_id: "101"
  instance_count:
    g1: 1
  topology:
    - name: n1
      members:
        - guest_id: g1
          iface: eth0
"#;

    #[test]
    fn parses_minimal_description() {
        let desc = parse_description_str(MINIMAL, None).unwrap();
        assert_eq!(desc.hosts.len(), 1);
        assert_eq!(desc.guests.len(), 1);
        assert_eq!(desc.clone.topology.len(), 1);
    }

    #[test]
    fn rejects_unknown_topology_member() {
        let bad = MINIMAL.replace("guest_id: g1\n          iface: eth0", "guest_id: ghost\n          iface: eth0");
        assert!(parse_description_str(&bad, None).is_err());
    }

    #[test]
    fn resolves_relative_config_paths_against_base_dir() {
        let desc = parse_description_str(MINIMAL, Some(Path::new("/tmp/ranges/r1"))).unwrap();
        let cfg = desc.guests[0].basevm_config_file.as_ref().unwrap();
        assert!(cfg.is_absolute());
        assert_eq!(cfg, &std::path::PathBuf::from("/tmp/ranges/r1/fixtures/basevm.xml"));
    }
}
