//! Shared log-combination domain primitives.
//!
//! This crate owns the request/response contract, the file eligibility
//! filter, padding arithmetic, and the checkpoint cursor state machine.
//! It intentionally excludes AWS SDK and Lambda runtime concerns.

pub mod contract;
pub mod filter;
pub mod padding;
pub mod progress;
