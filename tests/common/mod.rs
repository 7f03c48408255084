//! Shared fixtures for the integration suite.
//!
//! Every test binary compiles its own copy, so helpers one binary
//! skips are expected dead code.
#![allow(dead_code)]
#![allow(unused_imports)]

pub mod assertions;
pub mod config;
pub mod fixtures;

pub use assertions::*;
pub use config::*;
pub use fixtures::*;
