//! Shared test utilities for coursesmith integration tests.
//!
//! - `TestHarness`: temp document and artifact directories over an
//!   in-memory SQLite store, wired the way the worker wires production
//! - `doubles`: stores and generators that fail, panic, stall or record

pub mod doubles;
pub mod harness;

pub use harness::TestHarness;
