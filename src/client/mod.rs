//! The public façade: synchronous and asynchronous authentication entry
//! points, session validation, and bounded-concurrency batch authentication.

pub mod batch;
pub mod facade;

pub use batch::{BatchOptions, BatchResult};
pub use facade::AuthClient;
