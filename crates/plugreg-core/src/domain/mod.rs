//! Domain layer
//!
//! Contains the core business logic and domain models.

pub mod catalog;
pub mod lifecycle;
pub mod locking;
pub mod registry;
