//! Session reconciliation and data caching for the learning-portfolio client.
//!
//! The crate decides who the user is and keeps per-resource data consistent.
//! Identity comes from two sources that must agree: an external identity
//! provider issues credentials, and the application backend confirms them
//! and owns the session. Dashboard resources are loaded through a keyed
//! cache that deduplicates concurrent requests and never lets a stale
//! response overwrite a newer one.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`app`] | Process-scoped [`app::AppContext`] wiring the pieces together |
//! | [`session`] | [`session::SessionAuthority`] state machine, sole writer of the session |
//! | [`identity`] | Identity provider client, REST provider, durable redirect marker |
//! | [`cache`] | Keyed [`cache::DataCache`] with dedup, generations, subscribers |
//! | [`classify`] | Raw failure to [`error::ClassifiedError`] normalization |
//! | [`net`] | Backend transport seam, HTTP implementation, endpoint calls |
//! | [`resources`] | Typed dashboard resources and the dashboard loader |
//! | [`observers`] | Listener registry with scoped subscription guards |
//! | [`config`] | Environment-driven configuration |
//! | [`error`] | Raw and classified error types |

pub mod app;
pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod identity;
pub mod net;
pub mod observers;
pub mod resources;
pub mod session;

#[cfg(test)]
mod test_helpers;
