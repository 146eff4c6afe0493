//! In-memory vector index.
//!
//! Brute-force cosine scan over a `HashMap`, suitable for tests and small
//! corpora. Filtering evaluates [`FilterExpr`] directly against each point's
//! payload.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::PipelineError;
use crate::filter::FilterExpr;
use crate::index::{IndexedVector, QueryMatch, VectorIndex};

/// Vector index backed by process memory.
#[derive(Default)]
pub struct InMemoryIndex {
    points: RwLock<HashMap<String, IndexedVector>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.points.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, vectors: Vec<IndexedVector>) -> Result<(), PipelineError> {
        let mut points = self.points.write().unwrap();
        for v in vectors {
            points.insert(v.id.clone(), v);
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<QueryMatch>, PipelineError> {
        let points = self.points.read().unwrap();

        let mut matches: Vec<QueryMatch> = points
            .values()
            .filter(|p| filter.map_or(true, |f| f.matches(&p.payload)))
            .map(|p| QueryMatch {
                id: p.id.clone(),
                document_id: p.document_id.clone(),
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);

        Ok(matches)
    }

    async fn delete(&self, ids: &[String]) -> Result<(), PipelineError> {
        let mut points = self.points.write().unwrap();
        for id in ids {
            points.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn point(id: &str, doc: &str, vector: Vec<f32>, payload: serde_json::Value) -> IndexedVector {
        IndexedVector {
            id: id.to_string(),
            document_id: doc.to_string(),
            vector,
            payload,
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![
                point("a-chunk-0", "a", vec![1.0, 0.0], json!({})),
                point("b-chunk-0", "b", vec![0.9, 0.1], json!({})),
                point("c-chunk-0", "c", vec![0.0, 1.0], json!({})),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].id, "a-chunk-0");
        assert_eq!(hits[1].id, "b-chunk-0");
        assert!(hits[0].score >= hits[1].score && hits[1].score >= hits[2].score);
    }

    #[tokio::test]
    async fn test_query_respects_top_k() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![
                point("a-chunk-0", "a", vec![1.0, 0.0], json!({})),
                point("a-chunk-1", "a", vec![0.8, 0.2], json!({})),
                point("a-chunk-2", "a", vec![0.5, 0.5], json!({})),
            ])
            .await
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_query_applies_filter() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![
                point(
                    "a-chunk-0",
                    "a",
                    vec![1.0, 0.0],
                    json!({ "skills": ["react", "python"] }),
                ),
                point(
                    "b-chunk-0",
                    "b",
                    vec![1.0, 0.0],
                    json!({ "skills": ["java"] }),
                ),
            ])
            .await
            .unwrap();

        let filter = FilterExpr::MemberOf {
            field: "skills".to_string(),
            values: vec!["react".into()],
        };
        let hits = index.query(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, "a");
    }

    #[tokio::test]
    async fn test_upsert_overwrites_by_id() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![point("a-chunk-0", "a", vec![1.0, 0.0], json!({"v": 1}))])
            .await
            .unwrap();
        index
            .upsert(vec![point("a-chunk-0", "a", vec![0.0, 1.0], json!({"v": 2}))])
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        let hits = index.query(&[0.0, 1.0], 1, None).await.unwrap();
        assert_eq!(hits[0].payload["v"], 2);
    }

    #[tokio::test]
    async fn test_delete_removes_points() {
        let index = InMemoryIndex::new();
        index
            .upsert(vec![
                point("a-chunk-0", "a", vec![1.0, 0.0], json!({})),
                point("a-chunk-1", "a", vec![0.5, 0.5], json!({})),
            ])
            .await
            .unwrap();

        index
            .delete(&["a-chunk-0".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.query(&[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits[0].id, "a-chunk-1");
    }
}
