//! Low-level primitives the engine is built on.
//!
//! Includes the record store files, the dynamic overflow stores and the
//! store-directory lock.

/// Record stores, dynamic stores and the store file framing.
///
/// Each store keeps its live records in memory and persists them to one file
/// in the store directory.
pub mod store;

/// Store-directory locking.
pub mod lock;
