//! Test Utilities
//!
//! Shared fixtures for the integration test targets. Every component is
//! built fresh per test on top of the in-memory fake spawner.

#![allow(dead_code)]


pub use fixtures::{
    collect_until, create_test_config, fake_registry, fake_service, next_message, next_output, wait_until,
};
