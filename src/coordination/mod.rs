//! Per-entity coordination for mutating operations.

pub mod entity_lock;

pub use entity_lock::{EntityLockGuard, EntityLockManager};
