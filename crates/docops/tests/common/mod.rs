//! Shared test utilities for docops integration tests.
//!
//! This module provides:
//! - Document fixtures built programmatically (DOCX via `zip`, PDF via `lopdf`)
//! - `TestHarness` for isolated runs with their own directories

pub mod fixtures;
pub mod harness;

pub use fixtures::*;
pub use harness::{stop_pool, TestHarness};
