//! The virtualization layer: the virt CLI adapter (component A), domain XML
//! generation, the `KvmProvider` trait (component E), and image acquisition.

pub mod cli;
pub mod image;
pub mod provider;
pub mod xml;

pub use provider::{CliKvmProvider, DomainSpec, DomainState, KvmProvider, MockKvmProvider, NicSpec};
