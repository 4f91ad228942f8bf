//! Common test utilities for batch-dl integration tests

#[allow(dead_code)]
pub mod assertions;
#[allow(dead_code)]
pub mod engine;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use engine::*;
