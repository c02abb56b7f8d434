//! Pass-through access to the platform services (catalog, friends, party, ...)
//!
//! Services are addressed by name and path; payloads stay as JSON. The only
//! behaviour added on top of plain HTTP is the session check performed by
//! [`ApiClient`] before each call to a service that needs a logged-in session.

pub mod client;
pub mod service;

pub use client::ApiClient;
pub use service::{Service, UnknownService};
