//! External identity provider integration.
//!
//! ARCHITECTURE
//! ============
//! `provider` defines the raw capability (`IdentityProvider`), `rest` is the
//! REST-backed implementation, `marker` persists the pending-redirect flag,
//! and `client` is the classified, marker-aware facade the rest of the crate
//! talks to.

pub mod client;
pub mod marker;
pub mod provider;
pub mod rest;

pub use client::IdentityProviderClient;
pub use marker::{FileMarkerStore, MarkerError, MarkerStore, MemoryMarkerStore, RedirectMarker};
pub use provider::{ExternalCredential, ExternalPrincipal, IdentityProvider};
pub use rest::RestIdentityProvider;
