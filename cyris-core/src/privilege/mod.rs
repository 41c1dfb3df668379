//! Component D: privilege broker.

pub mod broker;

pub use broker::{BrokerState, PrivilegeBroker};
