//! Route handlers for the monitoring API.
//!
//! Everything lives under [`system`]: health, stats, the live event
//! stream, and the OpenAPI specification.

mod system;

pub use system::*;
