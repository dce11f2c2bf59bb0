//! The agent's view of the world: a gateway, and nothing but the gateway.
//!
//! An [AgentClient] opens sessions, walks the authorize redirect chain the
//! way a user's browser would (the demo authorization server auto-approves,
//! so "opening the browser" collapses to following redirects), polls for
//! readiness under a hard ceiling, and invokes tools. At no point does any
//! token pass through this crate.

#[macro_use]
extern crate tracing;

mod client;

pub use client::*;
