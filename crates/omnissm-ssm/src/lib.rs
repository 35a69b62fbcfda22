//! # omnissm-ssm
//!
//! Typed client surface for the fleet-management service.
//!
//! The wire protocol is deliberately opaque to the rest of the system:
//! callers hold a [`SsmApi`] trait object and never see HTTP. The
//! payload types double as the bodies of deferred-action messages, so
//! they round-trip through JSON unchanged.

#![warn(clippy::all)]

pub mod errors;
pub mod http;
pub mod traits;
pub mod types;

pub use errors::{Result, SsmError};
pub use http::HttpSsmClient;
pub use traits::SsmApi;
pub use types::{Activation, ActivationRequest, CustomInventory, InventoryContent, ResourceTags, Tag};
