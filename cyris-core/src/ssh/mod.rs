//! Component B: SSH channel and reachability probing.

pub mod channel;
pub mod reachability;

pub use channel::{shell_quote, SshAuth, SshChannel};
pub use reachability::wait_for_ssh_ready;
