//! Test store setup
#![allow(dead_code)]

use bazaar::store::{setup_indexes, DocumentStore, MemoryStore};
use std::sync::Arc;

/// A fresh in-memory store with the unique indexes declared.
pub async fn setup_store() -> Arc<dyn DocumentStore> {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    setup_indexes(store.as_ref())
        .await
        .expect("Failed to declare indexes");
    store
}
