//! mTLS context construction shared by every pooled backend.

pub mod pool_base;

pub use pool_base::{MtlsPoolBase, PoolStats};
