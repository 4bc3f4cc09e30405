//! Shared test utilities for contracthawk integration tests.
//!
//! This module provides:
//! - `ScriptedSource`, an in-memory `DescriptionSource` with canned responses
//! - `SyncHarness` wiring an in-memory database, the scripted source and a `SyncService`

pub mod harness;
pub mod scripted_source;

pub use harness::{endpoint, SyncHarness};
pub use scripted_source::ScriptedSource;
