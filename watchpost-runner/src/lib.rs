//! Watchpost runner library.
//!
//! This library exposes internal modules for integration testing.
//! In production, `watchpost-runner` is used as a binary (main.rs).

pub mod cli;
pub mod logging;
pub mod observers;
pub mod report;
pub mod runner;
