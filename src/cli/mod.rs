//! Command-line interface for the `crs` binary.

mod commands;
mod helpers;

pub use commands::{is_verbose, run};
