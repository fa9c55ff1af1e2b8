//! Utility functions and helpers for cachegate.
//!
//! # Submodules
//!
//! - `logging`: Tracing and logging initialization with secret redaction.
//!
//! Author: kelexine (<https://github.com/kelexine>)

pub mod logging;
