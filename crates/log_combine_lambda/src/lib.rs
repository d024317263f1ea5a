//! AWS-oriented adapters and handlers for checkpointed log combination.
//!
//! This crate owns runtime integration details (the Lambda handler, the
//! object-store adapter, and the invocation time budget) and exposes a
//! single runtime module boundary for the contract, filter, padding, and
//! progress primitives.

pub mod adapters;
pub mod handlers;
pub mod runtime;
