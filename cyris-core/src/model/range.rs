use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::task::TaskRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeState {
    Creating,
    Active,
    Error,
    Destroying,
    Destroyed,
}

/// A domain managed by a range: the libvirt domain plus the guest it was
/// instantiated from and its resolved IP (once discovered).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedDomain {
    pub domain_name: String,
    pub guest_id: String,
    pub instance_idx: u32,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub mac_addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedBridge {
    pub bridge_name: String,
    pub network_name: String,
    pub cidr: String,
}

/// A re-invocable NAT rule tuple, sufficient to re-issue or remove the
/// exact `iptables` invocation that installed it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatRule {
    pub table: String,
    pub chain: String,
    pub spec: Vec<String>,
    pub comment: String,
}

/// The single source of truth for a range's lifecycle, persisted as
/// `range.json`. Only the orchestrator mutates this; all other components
/// receive it by reference or produce fragments the orchestrator merges in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeRecord {
    pub range_id: String,
    pub description_hash: String,
    pub state: RangeState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub domains: Vec<ManagedDomain>,
    #[serde(default)]
    pub bridges: Vec<ManagedBridge>,
    #[serde(default)]
    pub nat_rules: Vec<NatRule>,
    #[serde(default)]
    pub ssh_key_fingerprint: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub failing_step: Option<String>,
}

impl RangeRecord {
    pub fn new(range_id: impl Into<String>, description_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            range_id: range_id.into(),
            description_hash: description_hash.into(),
            state: RangeState::Creating,
            created_at: now,
            updated_at: now,
            domains: Vec::new(),
            bridges: Vec::new(),
            nat_rules: Vec::new(),
            ssh_key_fingerprint: None,
            tasks: Vec::new(),
            error_message: None,
            failing_step: None,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn mark_error(&mut self, step: &str, message: impl Into<String>) {
        self.state = RangeState::Error;
        self.failing_step = Some(step.to_string());
        self.error_message = Some(message.into());
        self.touch();
    }
}

/// A cached IP resolution result for one VM, per §3/§4.4.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpCacheEntry {
    pub vm_name: String,
    pub ip_addresses: Vec<String>,
    pub mac_addresses: Vec<String>,
    pub interfaces: Vec<String>,
    pub discovery_method: String,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: String,
}

impl IpCacheEntry {
    /// Fresh iff `now < expires_at` AND `now - cached_at <= max_age`.
    pub fn is_fresh(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> bool {
        now < self.expires_at && (now - self.cached_at) <= max_age
    }
}
