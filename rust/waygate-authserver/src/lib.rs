//! A deliberately small OAuth 2.1 authorization server: authorization code
//! with mandatory S256 PKCE, RFC 8707 resource indicators, RFC 7591 dynamic
//! client registration and RFC 7662 introspection. Consent is auto-approved;
//! this server exists to give the gateway a real protocol counterparty, not
//! to face the internet.

#[macro_use]
extern crate tracing;

mod authorize;
mod config;
mod introspect;
mod jwt;
mod metadata;
mod register;
mod server;
mod token;

pub use config::*;
pub use jwt::*;
pub use server::*;
