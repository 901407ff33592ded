//! # authcache — distributed authentication caching service
//!
//! A multi-tier authentication cache: given a `(username, password)` pair it
//! returns an authentication decision plus a user profile, backed by an
//! in-process encrypted cache (L1), a remote key/value store (L2), a
//! document store (L3), and a directory authority (L4).
//!
//! ## Architecture
//!
//! - `model`: cacheable user profile, credentials, authentication results
//! - `tls`: mTLS context construction shared by every pooled backend
//! - `pools`: pooled clients to the KV store (L2), document store (L3), and directory (L4)
//! - `cache`: the secure in-process cache (L1), region mapper, and tier coordinator
//! - `auth`: password verification and the authentication pipeline
//! - `client`: the façade used by callers (sync, async, batch)
//! - `metrics`: pool and cache counters, aggregate health
//! - `config`: process-wide configuration
//! - `error`: the crate-wide error taxonomy
//! - `runtime`: the process-wide handle wiring every component together
//!
//! `crypto::kdf` and `crypto::symmetric` carry forward the password-KDF and
//! AES-GCM primitives this crate's L1 cache and password verification are
//! built on.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod config;
pub mod crypto;
pub mod model;
pub mod tls;
pub mod pools;
pub mod cache;
pub mod auth;
pub mod client;
pub mod metrics;
pub mod runtime;

pub use error::{AuthCacheError, ErrorKind, Result};
pub use runtime::Runtime;

/// Crate version, as declared in `Cargo.toml`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name, as declared in `Cargo.toml`.
pub const NAME: &str = env!("CARGO_PKG_NAME");
