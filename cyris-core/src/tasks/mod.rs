//! Component H: task executor.

pub mod executor;
pub mod kinds;

pub use executor::{execute_guest_tasks, execute_task};
pub use kinds::{render, RenderedScript};
