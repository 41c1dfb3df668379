//! Component F: Linux bridge + iptables NAT topology management and the
//! persistent CIDR allocator backing it.

pub mod cidr;
pub mod topology;

pub use cidr::CidrAllocator;
pub use topology::{bridge_name, NetworkTopologyManager};
