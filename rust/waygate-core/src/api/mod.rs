//! The request and response bodies spoken between Waygate services, and the
//! route vocabulary for the gateway's public surface.

mod data;
mod route;

pub use data::*;
pub use route::*;
