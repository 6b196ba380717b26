//! Session reconciliation.
//!
//! `SessionAuthority` owns the process session and is its only writer;
//! everything else reads copies or subscribes to transitions.

pub mod authority;
pub mod types;

pub use authority::SessionAuthority;
pub use types::{AuthState, LoginRequest, Session};
