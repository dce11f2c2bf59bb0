pub mod callback;
pub mod consent;
pub mod debug;
pub mod session;
pub mod tools;
