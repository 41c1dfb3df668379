//! Component C: streaming subprocess executor.

pub mod streaming;

pub use streaming::{run, RunOptions, RunResult};
