//! Plugin lifecycle: the state machine and startup recovery
//!
//! The controller drives plugins through install/uninstall transitions,
//! writing the busy state before the external side effect and the
//! terminal state after it. Recovery runs once at construction and resets
//! transitions abandoned by a dead process instance.

pub mod controller;
pub mod recovery;

// Re-export main types
pub use controller::LifecycleController;
pub use recovery::reset_abandoned;
