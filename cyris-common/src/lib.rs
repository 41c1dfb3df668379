//! # cyris-common
//!
//! Shared utilities for the cyris orchestrator binary.
//!
//! ## Logging
//!
//! ```no_run
//! use cyris_common::init_logging;
//!
//! init_logging("info").unwrap();
//! ```

pub mod logging;

pub use logging::{init_logging, init_logging_json, init_logging_production};
