//! Shared tracing setup for statusboard binaries.

mod tracing;

pub use crate::tracing::init as init_tracing;
