//! Persistence collaborator: entity models, the store abstraction, and the
//! in-memory backend.

pub mod memory;
pub mod models;
pub mod store;
