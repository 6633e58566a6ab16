//! Deletion of remote entities with callback correlation.

mod callbacks;
mod coordinator;

pub use callbacks::CallbackRouter;
pub use coordinator::DeleteCoordinator;

/// Path prefix of the delete callback endpoints.
pub const CALLBACK_PREFIX: &str = "/callbacks/delete/";
