//! Lifecycle test scenarios.

mod cancellation;
mod cleanup;
mod end_to_end;
mod fault_isolation;
mod phase_barrier;
mod registry;
