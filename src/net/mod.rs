//! Backend communication.
//!
//! ARCHITECTURE
//! ============
//! `transport` defines the seam (`Transport` trait) every backend call goes
//! through; `http` is the reqwest-backed implementation; `api` holds the
//! typed endpoint calls; `types` holds the wire payloads.
//!
//! ERROR HANDLING
//! ==============
//! Everything in this module returns unclassified [`crate::error::RawError`].
//! Classification happens in the callers (session authority, data cache).

pub mod api;
pub mod http;
pub mod transport;
pub mod types;

pub use http::HttpTransport;
pub use transport::{ApiRequest, ApiResponse, Method, Transport};
