//! Test helper modules for brew-tuner integration tests
//!
//! Provides reusable test infrastructure components:
//! - FakeBackend: scripted in-memory optimizer backend
//! - Fixtures: runs, trials and events

#![allow(dead_code)]

pub mod fake_backend;
pub mod fixtures;

pub use fake_backend::{EventScript, FakeBackend};
pub use fixtures::{event, run, suggested_run, wait_for};
