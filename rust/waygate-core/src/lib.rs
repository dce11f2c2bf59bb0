#![warn(missing_docs)]

//! Shared protocol vocabulary for Waygate: the request and response bodies
//! spoken between the agent client, the gateway, the authorizer, the
//! authorization server and the resource server, along with the signed
//! state envelope, the delegation credential format and the tool registry.
//!
//! Everything in this crate is plain data and pure computation; the
//! services that move bytes over the network live in their own crates.

#[macro_use]
extern crate tracing as extern_tracing;

pub mod api;
pub mod authority;
pub mod entropy;
pub mod error;
pub mod metadata;
pub mod pkce;
pub mod state;
pub mod time;
pub mod tools;
pub mod tracing;
