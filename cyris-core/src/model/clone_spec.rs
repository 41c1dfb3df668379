use serde::{Deserialize, Serialize};

use crate::error::{CyrisError, Result};

/// A single member of a topology network: `guest_id.ifaceN`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkMember {
    pub guest_id: String,
    pub iface: String,
}

impl NetworkMember {
    /// Parses the `guest_id.ifaceN` shorthand used in description YAML.
    pub fn parse(s: &str) -> Result<Self> {
        let (guest_id, iface) = s.split_once('.').ok_or_else(|| {
            CyrisError::Validation(format!(
                "topology member '{s}' is not of the form guest_id.ifaceN"
            ))
        })?;
        Ok(Self { guest_id: guest_id.to_string(), iface: iface.to_string() })
    }
}

/// A named network in the topology section, with its member interfaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyNetwork {
    pub name: String,
    pub members: Vec<NetworkMember>,
}

/// The `clone_settings` section: how many instances of each guest to
/// create, which is the entry point, and the declared network topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneSettings {
    pub range_id: Option<String>,
    pub instance_count: std::collections::HashMap<String, u32>,
    #[serde(default)]
    pub entry_point: Option<String>,
    pub topology: Vec<TopologyNetwork>,
}

impl CloneSettings {
    /// Validates that every topology member references a declared guest.
    pub fn validate(&self, known_guest_ids: &[String]) -> Result<()> {
        for net in &self.topology {
            for member in &net.members {
                if !known_guest_ids.iter().any(|g| g == &member.guest_id) {
                    return Err(CyrisError::Validation(format!(
                        "network '{}' references unknown guest_id '{}'",
                        net.name, member.guest_id
                    )));
                }
            }
        }
        if let Some(entry) = &self.entry_point {
            if !known_guest_ids.iter().any(|g| g == entry) {
                return Err(CyrisError::Validation(format!(
                    "entry_point '{entry}' references unknown guest_id"
                )));
            }
        }
        Ok(())
    }
}
