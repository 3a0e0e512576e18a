//! Fuzz tests module
//!
//! Property-based testing using proptest:
//! - Locator fuzzing
//! - Wire format fuzzing

pub mod wire_fuzz;
