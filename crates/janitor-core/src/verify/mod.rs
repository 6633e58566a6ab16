//! Verification of build output checksums.

mod engine;

pub use engine::VerificationEngine;
