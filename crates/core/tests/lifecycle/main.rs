//! Lifecycle integration tests for watchpost-core.
//!
//! These tests drive the orchestrator end to end with stub observers and
//! check the registry rules, phase barriers, failure isolation, cleanup
//! idempotence and cancellation behavior.
//!
//! # Test Structure
//!
//! - `helpers/` -- Stub observer with call log and failure injection
//! - `scenarios/` -- Test files organized by concern
//!
//! # Running
//!
//! ```bash
//! cargo test -p watchpost-core --test lifecycle
//! ```

mod helpers;
mod scenarios;
