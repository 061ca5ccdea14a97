//! Side effects: working directories, external processes, configuration.

pub mod config;
pub mod process;
pub mod workdir;
