//! The authorizer: a persistent store of user-authored delegations and the
//! policy evaluator the gateway consults before opening a session.
//!
//! A delegation arrives as a compact signed credential plus the public JWK
//! that verifies it; once stored, it answers two questions — which scopes a
//! `(subject, agent, tool)` triple is allowed, and which obligations the
//! gateway must enforce on every request of the resulting session.

#[macro_use]
extern crate tracing;

mod config;
mod handlers;
mod policy;
mod server;
mod store;

pub use config::*;
pub use policy::*;
pub use server::*;
pub use store::*;
