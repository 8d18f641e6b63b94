//! Document-level embedding operations over a [`VectorIndex`].

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

use super::types::{
    DocumentChunk, Metadata, MetadataFilter, QueryMatch, VectorQuery, VectorRecord,
    DOCUMENT_ID_KEY, TEXT_KEY,
};
use super::VectorIndex;
use crate::error::{Error, Result};
use crate::retry::{with_retry_cancellable, RetryPolicy};

/// Embedding index client with input validation and retried mutations.
///
/// Queries are not retried; a caller that wants read retries can wrap
/// [`EmbeddingIndexClient::query`] in [`crate::retry::with_retry`] itself.
#[derive(Clone)]
pub struct EmbeddingIndexClient {
    index: Arc<dyn VectorIndex>,
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl EmbeddingIndexClient {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Token that aborts in-flight retry loops when cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Build the records for a document's chunks.
    ///
    /// The chunk fields always win over same-named keys in `extra`.
    pub fn build_records(
        document_id: &str,
        chunks: &[DocumentChunk],
        embeddings: Vec<Vec<f32>>,
        extra: &Metadata,
    ) -> Result<Vec<VectorRecord>> {
        if document_id.is_empty() {
            return Err(Error::precondition("documentId must not be empty"));
        }
        if chunks.len() != embeddings.len() {
            return Err(Error::precondition(format!(
                "chunk count ({}) does not match embedding count ({})",
                chunks.len(),
                embeddings.len()
            )));
        }

        let timestamp = Utc::now().to_rfc3339();
        let records = chunks
            .iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (chunk, vector))| {
                let mut metadata = extra.clone();
                metadata.insert(DOCUMENT_ID_KEY.to_string(), Value::from(document_id));
                metadata.insert("chunkIndex".to_string(), Value::from(index));
                metadata.insert(TEXT_KEY.to_string(), Value::from(chunk.text.as_str()));
                metadata.insert(
                    "contentType".to_string(),
                    Value::from(chunk.content_type.as_str()),
                );
                metadata.insert(
                    "sourceType".to_string(),
                    Value::from(chunk.source_type.as_str()),
                );
                metadata.insert("timestamp".to_string(), Value::from(timestamp.as_str()));

                VectorRecord::new(VectorRecord::chunk_id(document_id, index), vector, metadata)
            })
            .collect();

        Ok(records)
    }

    /// Store one record per chunk. Returns the number of records written.
    #[instrument(skip(self, chunks, embeddings, extra), fields(chunk_count = chunks.len()))]
    pub async fn upsert(
        &self,
        document_id: &str,
        chunks: &[DocumentChunk],
        embeddings: Vec<Vec<f32>>,
        extra: &Metadata,
    ) -> Result<usize> {
        let records = Self::build_records(document_id, chunks, embeddings, extra)?;

        let written = with_retry_cancellable(&self.policy, "upsert", &self.cancel, || {
            self.index.upsert(&records)
        })
        .await?;

        info!(document_id, written, "Upserted document chunks");
        Ok(written)
    }

    /// Nearest-neighbour search. Not retried.
    pub async fn query(&self, query: &VectorQuery) -> Result<Vec<QueryMatch>> {
        self.index.query(query).await
    }

    #[instrument(skip(self, ids), fields(id_count = ids.len()))]
    pub async fn delete_by_ids(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Err(Error::precondition("ids must not be empty"));
        }

        with_retry_cancellable(&self.policy, "delete by ids", &self.cancel, || {
            self.index.delete_ids(ids)
        })
        .await
    }

    /// Delete every chunk of a document and nothing else.
    #[instrument(skip(self))]
    pub async fn delete_by_document_id(&self, document_id: &str) -> Result<u64> {
        if document_id.is_empty() {
            return Err(Error::precondition("documentId must not be empty"));
        }

        let filter = MetadataFilter::document(document_id);
        let deleted = with_retry_cancellable(&self.policy, "delete by document", &self.cancel, || {
            self.index.delete_where(&filter)
        })
        .await?;

        info!(document_id, deleted, "Deleted document chunks");
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::MemoryIndex;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Counts calls and fails the first `failures` mutations.
    #[derive(Default)]
    struct CountingIndex {
        calls: AtomicU32,
        failures: u32,
    }

    impl CountingIndex {
        fn failing(failures: u32) -> Self {
            Self {
                failures,
                ..Self::default()
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn attempt(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(Error::transport("vector", "503 Service Unavailable"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl VectorIndex for CountingIndex {
        async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
            self.attempt()?;
            Ok(records.len())
        }

        async fn query(&self, _query: &VectorQuery) -> Result<Vec<QueryMatch>> {
            self.attempt()?;
            Ok(Vec::new())
        }

        async fn delete_ids(&self, ids: &[String]) -> Result<u64> {
            self.attempt()?;
            Ok(ids.len() as u64)
        }

        async fn delete_where(&self, _filter: &MetadataFilter) -> Result<u64> {
            self.attempt()?;
            Ok(0)
        }
    }

    fn quick_policy() -> RetryPolicy {
        RetryPolicy::new(3, vec![Duration::from_secs(1)])
    }

    #[tokio::test]
    async fn test_length_mismatch_makes_no_call() {
        let index = Arc::new(CountingIndex::default());
        let client = EmbeddingIndexClient::new(index.clone());

        let err = client
            .upsert(
                "doc",
                &[DocumentChunk::new("a"), DocumentChunk::new("b")],
                vec![vec![0.1]],
                &Metadata::new(),
            )
            .await
            .unwrap_err();

        assert!(err.is_precondition());
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_inputs_are_preconditions() {
        let index = Arc::new(CountingIndex::default());
        let client = EmbeddingIndexClient::new(index.clone());

        assert!(client.delete_by_ids(&[]).await.unwrap_err().is_precondition());
        assert!(client
            .delete_by_document_id("")
            .await
            .unwrap_err()
            .is_precondition());
        assert_eq!(index.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_are_retried() {
        let index = Arc::new(CountingIndex::failing(2));
        let client = EmbeddingIndexClient::new(index.clone()).with_policy(quick_policy());

        let written = client
            .upsert("doc", &[DocumentChunk::new("a")], vec![vec![1.0]], &Metadata::new())
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert_eq!(index.calls(), 3);
    }

    #[tokio::test]
    async fn test_query_is_not_retried() {
        let index = Arc::new(CountingIndex::failing(1));
        let client = EmbeddingIndexClient::new(index.clone()).with_policy(quick_policy());

        assert!(client.query(&VectorQuery::new(vec![1.0])).await.is_err());
        assert_eq!(index.calls(), 1);
    }

    #[test]
    fn test_build_records() {
        let extra: Metadata = [
            ("course".to_string(), json!("rust-101")),
            ("documentId".to_string(), json!("spoofed")),
        ]
        .into_iter()
        .collect();
        let records = EmbeddingIndexClient::build_records(
            "doc",
            &[
                DocumentChunk::new("first"),
                DocumentChunk::new("second").with_content_type("code"),
            ],
            vec![vec![0.1], vec![0.2]],
            &extra,
        )
        .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, "doc-chunk-1");
        let meta = &records[1].metadata;
        assert_eq!(meta["documentId"], json!("doc"));
        assert_eq!(meta["chunkIndex"], json!(1));
        assert_eq!(meta["text"], json!("second"));
        assert_eq!(meta["contentType"], json!("code"));
        assert_eq!(meta["sourceType"], json!("document"));
        assert_eq!(meta["course"], json!("rust-101"));
        assert!(meta["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_delete_by_document_id_leaves_other_documents() {
        let index = Arc::new(MemoryIndex::new());
        let client = EmbeddingIndexClient::new(index.clone());
        let none = Metadata::new();

        client
            .upsert(
                "doc-a",
                &[DocumentChunk::new("a0"), DocumentChunk::new("a1"), DocumentChunk::new("a2")],
                vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.8, 0.2]],
                &none,
            )
            .await
            .unwrap();
        client
            .upsert(
                "doc-b",
                &[DocumentChunk::new("b0"), DocumentChunk::new("b1")],
                vec![vec![0.0, 1.0], vec![0.1, 0.9]],
                &none,
            )
            .await
            .unwrap();
        // A document whose id shares a prefix must survive.
        client
            .upsert("doc-a2", &[DocumentChunk::new("c0")], vec![vec![0.5, 0.5]], &none)
            .await
            .unwrap();

        let deleted = client.delete_by_document_id("doc-a").await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(index.len().await, 3);

        let remaining = client
            .query(&VectorQuery::new(vec![1.0, 1.0]).with_top_k(10))
            .await
            .unwrap();
        let mut docs: Vec<_> = remaining
            .iter()
            .map(|m| m.metadata.as_ref().unwrap()["documentId"].clone())
            .collect();
        docs.sort_by_key(|v| v.to_string());
        assert_eq!(docs, vec![json!("doc-a2"), json!("doc-b"), json!("doc-b")]);
    }

    #[tokio::test]
    async fn test_delete_by_ids() {
        let index = Arc::new(MemoryIndex::new());
        let client = EmbeddingIndexClient::new(index.clone());
        client
            .upsert(
                "doc",
                &[DocumentChunk::new("a"), DocumentChunk::new("b")],
                vec![vec![1.0], vec![2.0]],
                &Metadata::new(),
            )
            .await
            .unwrap();

        let deleted = client
            .delete_by_ids(&[VectorRecord::chunk_id("doc", 0)])
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(index.get("doc-chunk-1").await.is_some());
    }
}
