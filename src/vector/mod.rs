//! Embedding storage for retrieval-augmented prompts.
//!
//! [`EmbeddingIndexClient`] owns validation and retry; the index itself is
//! reached through the [`VectorIndex`] trait, implemented by the hosted
//! [`UpstashIndex`] and the in-process [`MemoryIndex`].

mod client;
mod memory;
mod types;
mod upstash;

use async_trait::async_trait;

use crate::error::Result;

pub use client::EmbeddingIndexClient;
pub use memory::MemoryIndex;
pub use types::{
    DocumentChunk, Metadata, MetadataFilter, QueryMatch, VectorQuery, VectorRecord,
    DOCUMENT_ID_KEY, TEXT_KEY,
};
pub use upstash::{UpstashConfig, UpstashIndex};

/// Raw vector index operations.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by id. Returns the number written.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Nearest-neighbour search, best match first.
    async fn query(&self, query: &VectorQuery) -> Result<Vec<QueryMatch>>;

    /// Delete records by id. Returns the number deleted.
    async fn delete_ids(&self, ids: &[String]) -> Result<u64>;

    /// Delete every record whose metadata matches `filter`.
    async fn delete_where(&self, filter: &MetadataFilter) -> Result<u64>;
}
