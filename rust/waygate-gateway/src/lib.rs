//! The Waygate gateway: the identity-aware middle tier between agents and
//! protected tools.
//!
//! The gateway owns the whole OAuth conversation on the agent's behalf. It
//! discovers the resource server and its authorization server, asks the
//! authorizer which scopes and obligations apply, drives the authorization
//! code + PKCE flow, and keeps the resulting access token strictly on this
//! side of the fence — agents only ever see opaque session IDs and
//! readiness bits. Tool calls are matched to a ready session by required
//! scope, checked against the session's obligations, and reverse-proxied
//! upstream with the bearer token injected at the last moment.

#[macro_use]
extern crate tracing;

mod config;
mod discovery;
mod error;
mod gateway;
mod handlers;
mod oauth;
mod obligations;
mod policy;
mod proxy;
mod session;

pub use config::*;
pub use gateway::*;
pub use session::{Session, SessionTable};
