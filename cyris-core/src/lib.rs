//! # cyris-core
//!
//! Core engine for a cyber-range orchestrator: given a declarative
//! description of hosts, guests, cloning policy, and network topology, it
//! materialises, monitors, and destroys an isolated ensemble of KVM/libvirt
//! virtual machines, wires them through Linux bridges and NAT, provisions
//! them over SSH, and persists their lifecycle state durably.
//!
//! ## Components
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              RangeOrchestrator                │
//! │   create / destroy / status / list / ssh_info │
//! └───────┬─────────┬─────────┬──────────┬───────┘
//!         │         │         │          │
//!         ▼         ▼         ▼          ▼
//!    KvmProvider  Topology  IpDiscovery  TaskExecutor
//!    (virt::*)   (network)  (ip_discovery) (tasks)
//! ```

pub mod cloudinit;
pub mod error;
pub mod exec;
pub mod ip_discovery;
pub mod model;
pub mod network;
pub mod orchestrator;
pub mod privilege;
pub mod ssh;
pub mod tasks;
pub mod virt;

pub use cloudinit::{CloudInitConfig, CloudInitGenerator};
pub use error::{CyrisError, Result, Step, StepError};
pub use model::{
    BasevmType, CloneSettings, Description, Guest, GuestOsFamily, Host, IpCacheEntry, ManagedBridge,
    ManagedDomain, NatRule, NetworkMember, RangeRecord, RangeState, TaskKind, TaskRecord, TaskState,
    TopologyNetwork, parse_description,
};
pub use orchestrator::{DomainStatusView, OrchestratorConfig, RangeOrchestrator, RangeStatus, RangeStore, SshInfo};
pub use virt::{CliKvmProvider, DomainSpec, DomainState, KvmProvider, MockKvmProvider, NicSpec};
