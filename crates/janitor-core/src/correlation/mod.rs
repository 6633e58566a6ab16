//! Correlation of fire-and-forget remote operations with their callbacks.

mod registry;

pub use registry::CorrelationRegistry;
