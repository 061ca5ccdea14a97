//! Deterministic, in-memory logic shared by the runner engine.
//!
//! Core modules must be free of I/O side effects. They operate on text
//! buffers and small state enums so they can be tested in isolation.

pub mod chain;
pub mod phase;
pub mod script;
