//! HTTP request handlers.

pub mod health;
pub mod leases;
pub mod payloads;
pub mod repos;

pub use health::*;
pub use leases::*;
pub use payloads::*;
pub use repos::*;
