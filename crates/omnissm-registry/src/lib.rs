//! # omnissm-registry
//!
//! Durable registry of instance registrations.
//!
//! The registry maps `identity hash -> RegistrationEntry` and is the
//! only durable state the control plane owns. Mutations go through
//! [`EntryPatch`], which can advance fields but never clear them, so
//! concurrent writers (registration handler, change processor,
//! reconciler) cannot undo each other's progress.

#![warn(clippy::all)]

pub mod entry;
pub mod errors;
pub mod index;
pub mod memory;
pub mod rocksdb_impl;
pub mod traits;

pub use entry::{EntryPatch, RegistrationEntry};
pub use errors::{RegistryError, Result};
pub use index::RegistrationEntries;
pub use memory::MemoryRegistry;
pub use rocksdb_impl::RocksDbRegistry;
pub use traits::RegistryStore;
