//! Cleanup of expired temporary builds and group builds.

mod convergence;
mod driver;

pub use convergence::ConvergenceLoop;
pub use driver::{CleanupDriver, CleanupReport, PassReport};
