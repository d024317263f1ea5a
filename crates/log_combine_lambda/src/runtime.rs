//! Runtime-facing re-exports of the domain primitives.

pub use log_combine_core::contract;
pub use log_combine_core::filter;
pub use log_combine_core::padding;
pub use log_combine_core::progress;
