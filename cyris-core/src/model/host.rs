use serde::{Deserialize, Serialize};

/// A hypervisor host referenced by guests in a description.
///
/// Immutable after parse; `host_id` is the join key used by guests to
/// indicate where they should be placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Host {
    pub host_id: String,
    /// Management address: IP or resolvable DNS name.
    pub mgmt_addr: String,
    /// Address of the bridge used for the virtual topology on this host.
    #[serde(default)]
    pub virbr_addr: Option<String>,
    /// Operator account used to reach the host.
    #[serde(default)]
    pub account: Option<String>,
}

impl Host {
    pub fn new(host_id: impl Into<String>, mgmt_addr: impl Into<String>) -> Self {
        Self {
            host_id: host_id.into(),
            mgmt_addr: mgmt_addr.into(),
            virbr_addr: None,
            account: None,
        }
    }
}
