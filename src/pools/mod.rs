//! Pooled, TLS-protected clients to the three remote backends: the KV store
//! (L2), the document store (L3), and the directory authority (L4), plus
//! the trait seam ([`backend`]) the tier coordinator is driven through.

pub mod backend;
pub mod directory_pool;
pub mod doc_pool;
pub mod kv_pool;

#[cfg(feature = "test-util")]
pub mod fakes;

pub use backend::{DirectoryBackend, DocBackend, KvBackend};
pub use directory_pool::DirectoryPool;
pub use doc_pool::DocPool;
pub use kv_pool::KvPool;

#[cfg(feature = "test-util")]
pub use fakes::{FakeDirectory, FakeDoc, FakeKv};
