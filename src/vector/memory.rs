//! In-process vector index.
//!
//! Brute-force cosine similarity over every stored record. Scores are
//! normalized to `[0, 1]` the way the hosted index reports cosine scores.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::types::{MetadataFilter, QueryMatch, VectorQuery, VectorRecord};
use super::VectorIndex;
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    pub async fn get(&self, id: &str) -> Option<VectorRecord> {
        self.records.read().await.get(id).cloned()
    }
}

/// Cosine similarity rescaled to `[0, 1]`. Vectors of different length or
/// without magnitude score zero.
fn similarity_score(query: &[f32], candidate: &[f32]) -> f32 {
    if query.len() != candidate.len() {
        return 0.0;
    }
    let (dot, query_sq, candidate_sq) = query.iter().zip(candidate).fold(
        (0.0f32, 0.0f32, 0.0f32),
        |(dot, q, c), (x, y)| (dot + x * y, q + x * x, c + y * y),
    );
    let norm = (query_sq * candidate_sq).sqrt();
    if norm < f32::EPSILON {
        return 0.0;
    }
    ((1.0 + dot / norm) / 2.0).clamp(0.0, 1.0)
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut guard = self.records.write().await;
        for record in records {
            guard.insert(record.id.clone(), record.clone());
        }
        Ok(records.len())
    }

    async fn query(&self, query: &VectorQuery) -> Result<Vec<QueryMatch>> {
        let guard = self.records.read().await;
        let mut matches: Vec<QueryMatch> = guard
            .values()
            .filter(|r| {
                query
                    .filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&r.metadata))
            })
            .map(|r| QueryMatch {
                id: r.id.clone(),
                score: similarity_score(&query.vector, &r.vector),
                vector: query.include_vectors.then(|| r.vector.clone()),
                metadata: query.include_metadata.then(|| r.metadata.clone()),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(query.top_k);
        Ok(matches)
    }

    async fn delete_ids(&self, ids: &[String]) -> Result<u64> {
        let mut guard = self.records.write().await;
        let deleted = ids.iter().filter(|id| guard.remove(*id).is_some()).count();
        Ok(deleted as u64)
    }

    async fn delete_where(&self, filter: &MetadataFilter) -> Result<u64> {
        let mut guard = self.records.write().await;
        let before = guard.len();
        guard.retain(|_, r| !filter.matches(&r.metadata));
        Ok((before - guard.len()) as u64)
    }
}
