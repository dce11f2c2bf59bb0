//! The demo resource server: a handful of tool endpoints (echo, tickets,
//! order payment) behind bearer-token enforcement. Tokens are validated by
//! introspecting them at the authorization server, then checked for
//! audience and scope; unauthenticated callers are pointed at the
//! protected-resource metadata through `WWW-Authenticate`.

#[macro_use]
extern crate tracing;

mod auth;
mod config;
mod metadata;
mod server;
mod tools;

pub use auth::*;
pub use config::*;
pub use server::*;
