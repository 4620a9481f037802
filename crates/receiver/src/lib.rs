//! Receiver adapters and worker pool for the sluice write gateway.
//!
//! The receiver is an external process performing the actual
//! unpack/commit work against storage. This crate provides:
//! - The length-prefixed JSON stdio protocol
//! - A child-process adapter and an in-process mock
//! - A bounded worker pool with per-repository commit serialization

pub mod error;
pub mod mock;
pub mod pool;
pub mod process;
pub mod protocol;

pub use error::{ReceiverError, ReceiverResult};
pub use mock::{MockBehavior, MockMetrics, MockReceiver};
pub use pool::{Pool, ReceiverSpawner};
pub use process::{Receiver, ReceiverProcess};
