//! Save a set of applications and their window layout as a named
//! workspace, then bring the whole thing back (or tear it down) with one
//! command.

pub mod error;
pub mod inspector;
mod macros;
pub mod orchestrator;
pub mod positioner;
pub mod prober;
pub mod process;
pub mod store;
pub mod types;
#[cfg(windows)]
pub mod win_api;
#[cfg(windows)]
pub mod window;

pub use error::{Error, Result};
