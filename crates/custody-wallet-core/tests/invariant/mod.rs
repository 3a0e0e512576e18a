//! Invariant tests module
//!
//! Guarantees of the poll loop that must hold for any service behavior.

pub mod orchestrator_invariant;
