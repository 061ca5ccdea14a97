//! Command builders for the driven DAOPHOT suite programs.

pub mod allstar;
pub mod daophot;
pub mod files;

pub use allstar::{Allstar, AllstarFiles, AllstarRun};
pub use daophot::{Apertures, Daophot};
