//! The data model: hosts, guests, clone specs, range records, and tasks.

mod clone_spec;
mod description;
mod guest;
mod host;
mod range;
mod task;

pub use clone_spec::{CloneSettings, NetworkMember, TopologyNetwork};
pub use description::{parse_description, Description};
pub use guest::{BasevmType, Guest, GuestOsFamily};
pub use host::Host;
pub use range::{
    IpCacheEntry, ManagedBridge, ManagedDomain, NatRule, RangeRecord, RangeState,
};
pub use task::{TaskKind, TaskRecord, TaskState};
