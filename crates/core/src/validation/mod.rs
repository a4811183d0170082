//! Row validation.
//!
//! Field error types, the per-row column evaluator, and cross-row
//! uniqueness reductions. Nothing here touches the BrAPI store.

pub mod evaluator;
pub mod rules;
pub mod uniqueness;
