//! # omnissm-identity
//!
//! Instance identity verification for the registration service.
//!
//! Cloud instances prove who they are by presenting the signed identity
//! document issued to them at boot. This crate parses and verifies those
//! documents against the issuing provider's public key and derives the
//! stable registry key used everywhere else in the system.

#![warn(clippy::all)]

pub mod document;
pub mod errors;
pub mod verify;
pub mod whitelist;

pub use document::{registration_id, Document, Provider};
pub use errors::{IdentityError, Result};
pub use verify::Verifier;
pub use whitelist::AccountWhitelist;
