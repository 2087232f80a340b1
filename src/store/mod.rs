pub mod json_store;
pub mod kv;
pub mod schema;

use thiserror::Error;

pub use json_store::JsonStore;
pub use kv::{DurableStore, KvStore, MemoryStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("storage quota exceeded writing {key}")]
    QuotaExceeded { key: String },
    #[error("storage is unavailable")]
    Unavailable,
}
