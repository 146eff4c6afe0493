//! Vector index backends and the query cache.
//!
//! | Config value | Backend |
//! |--------------|---------|
//! | `"qdrant"` | [`QdrantIndex`] — one collection per corpus, cosine distance |
//! | `"memory"` | `InMemoryIndex` from the core crate — brute-force, for tests |
//!
//! [`CachedIndex`] wraps either backend with a query cache keyed by a hash
//! of (vector, top-k, filter). Upserts and deletes invalidate the whole
//! query cache, so a freshly indexed document is visible to the next query
//! instead of waiting out the TTL.
//!
//! Qdrant point ids must be unsigned integers or UUIDs, but chunk ids are
//! strings (`{document_id}-chunk-{index}`). Each id is mapped through
//! UUIDv5, which is deterministic, so replayed upserts still overwrite;
//! the original string id rides along in the payload under `"id"`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use qdrant_client::config::QdrantConfig;
use qdrant_client::qdrant::condition::ConditionOneOf;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::points_selector::PointsSelectorOneOf;
use qdrant_client::qdrant::r#match::MatchValue;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors::VectorsOptions;
use qdrant_client::qdrant::vectors_config::Config;
use qdrant_client::qdrant::with_payload_selector::SelectorOptions;
use qdrant_client::qdrant::{
    Condition, CreateCollection, DeletePoints, Distance, FieldCondition, Filter, ListValue,
    Match, PointId, PointStruct, PointsIdsList, PointsSelector, Range, ScoredPoint,
    SearchPoints, Struct, UpsertPoints, Value as QdrantValue, Vector, VectorParams, Vectors,
    VectorsConfig, WithPayloadSelector,
};
use qdrant_client::Qdrant;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use resume_harness_core::embedding::vector_bytes;
use resume_harness_core::error::PipelineError;
use resume_harness_core::filter::FilterExpr;
use resume_harness_core::index::memory::InMemoryIndex;
use resume_harness_core::index::{IndexedVector, QueryMatch, VectorIndex};

use crate::cache::TtlCache;
use crate::config::{CacheConfig, IndexConfig};

/// Qdrant-backed [`VectorIndex`]. The configured collection acts as the
/// namespace for the whole corpus.
pub struct QdrantIndex {
    client: Qdrant,
    collection: String,
}

impl QdrantIndex {
    /// Connect and make sure the collection exists.
    pub async fn connect(config: &IndexConfig, dims: usize) -> Result<Self> {
        let client = QdrantConfig::from_url(&config.url).build()?;
        let index = Self {
            client,
            collection: config.collection.clone(),
        };
        index.ensure_collection_exists(dims as u64).await?;
        Ok(index)
    }

    async fn ensure_collection_exists(&self, dims: u64) -> Result<()> {
        if self.client.collection_exists(&self.collection).await? {
            return Ok(());
        }

        let create = CreateCollection {
            collection_name: self.collection.clone(),
            vectors_config: Some(VectorsConfig {
                config: Some(Config::Params(VectorParams {
                    size: dims,
                    distance: Distance::Cosine.into(),
                    ..Default::default()
                })),
            }),
            ..Default::default()
        };

        match self.client.create_collection(create).await {
            Ok(_) => Ok(()),
            // Another worker may have created it between the check and the
            // create; only fail if it still does not exist.
            Err(e) => {
                if self.client.collection_exists(&self.collection).await? {
                    Ok(())
                } else {
                    Err(e.into())
                }
            }
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn upsert(&self, vectors: Vec<IndexedVector>) -> Result<(), PipelineError> {
        if vectors.is_empty() {
            return Ok(());
        }
        let points: Vec<PointStruct> = vectors.into_iter().map(to_point_struct).collect();
        let request = UpsertPoints {
            collection_name: self.collection.clone(),
            points,
            wait: Some(true),
            ordering: None,
            shard_key_selector: None,
            update_filter: None,
            timeout: None,
            update_mode: None,
        };
        self.client
            .upsert_points(request)
            .await
            .map_err(|e| PipelineError::IndexUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<QueryMatch>, PipelineError> {
        let request = SearchPoints {
            collection_name: self.collection.clone(),
            vector: vector.to_vec(),
            vector_name: None,
            limit: top_k as u64,
            score_threshold: None,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(SelectorOptions::Enable(true)),
            }),
            filter: filter.map(translate_filter),
            params: None,
            offset: None,
            with_vectors: None,
            read_consistency: None,
            shard_key_selector: None,
            sparse_indices: None,
            timeout: None,
        };

        let response = self
            .client
            .search_points(request)
            .await
            .map_err(|e| PipelineError::IndexUnavailable(e.to_string()))?;
        Ok(response.result.into_iter().map(scored_point_to_match).collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), PipelineError> {
        if ids.is_empty() {
            return Ok(());
        }
        let ids: Vec<PointId> = ids.iter().map(|id| point_id_for(id)).collect();
        let request = DeletePoints {
            collection_name: self.collection.clone(),
            wait: Some(true),
            points: Some(PointsSelector {
                points_selector_one_of: Some(PointsSelectorOneOf::Points(PointsIdsList { ids })),
            }),
            ordering: None,
            shard_key_selector: None,
            timeout: None,
        };
        self.client
            .delete_points(request)
            .await
            .map_err(|e| PipelineError::IndexUnavailable(e.to_string()))?;
        Ok(())
    }
}

/// Deterministic UUIDv5 point id for a string chunk id.
fn point_id_for(id: &str) -> PointId {
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes());
    PointId {
        point_id_options: Some(PointIdOptions::Uuid(uuid.to_string())),
    }
}

fn to_point_struct(v: IndexedVector) -> PointStruct {
    let mut payload: HashMap<String, QdrantValue> = match &v.payload {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, val)| (k.clone(), json_to_qdrant_value(val)))
            .collect(),
        _ => HashMap::new(),
    };
    // The string id and owning document id must survive the round trip
    // even if the caller's payload omits them.
    payload.insert(
        "id".to_string(),
        QdrantValue {
            kind: Some(Kind::StringValue(v.id.clone())),
        },
    );
    payload.insert(
        "document_id".to_string(),
        QdrantValue {
            kind: Some(Kind::StringValue(v.document_id.clone())),
        },
    );

    PointStruct {
        id: Some(point_id_for(&v.id)),
        vectors: Some(Vectors {
            vectors_options: Some(VectorsOptions::Vector(Vector {
                data: v.vector,
                indices: None,
                vector: None,
                vectors_count: None,
            })),
        }),
        payload,
    }
}

fn scored_point_to_match(point: ScoredPoint) -> QueryMatch {
    let payload = payload_to_json(&point.payload);
    let id = payload
        .get("id")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| point_id_string(point.id.as_ref()));
    let document_id = payload
        .get("document_id")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    QueryMatch {
        id,
        document_id,
        score: point.score,
        payload,
    }
}

fn point_id_string(id: Option<&PointId>) -> String {
    match id.and_then(|p| p.point_id_options.as_ref()) {
        Some(PointIdOptions::Num(n)) => n.to_string(),
        Some(PointIdOptions::Uuid(u)) => u.clone(),
        None => String::new(),
    }
}

/// Map a filter expression onto Qdrant's grammar. Every clause lands in
/// `must`; a multi-value membership becomes a nested `should` filter.
pub(crate) fn translate_filter(expr: &FilterExpr) -> Filter {
    Filter {
        must: translate_clauses(expr),
        ..Default::default()
    }
}

fn translate_clauses(expr: &FilterExpr) -> Vec<Condition> {
    match expr {
        FilterExpr::All { clauses } => clauses.iter().flat_map(translate_clauses).collect(),
        other => vec![translate_condition(other)],
    }
}

fn translate_condition(expr: &FilterExpr) -> Condition {
    match expr {
        FilterExpr::Equals { field, value } => match_condition(field, value),
        FilterExpr::MemberOf { field, values } => {
            if values.len() == 1 {
                match_condition(field, &values[0])
            } else {
                Condition {
                    condition_one_of: Some(ConditionOneOf::Filter(Filter {
                        should: values.iter().map(|v| match_condition(field, v)).collect(),
                        ..Default::default()
                    })),
                }
            }
        }
        FilterExpr::RangeBounded { field, min, max } => Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: field.clone(),
                range: Some(Range {
                    gte: *min,
                    lte: *max,
                    gt: None,
                    lt: None,
                }),
                ..Default::default()
            })),
        },
        FilterExpr::All { clauses } => Condition {
            condition_one_of: Some(ConditionOneOf::Filter(Filter {
                must: clauses.iter().flat_map(translate_clauses).collect(),
                ..Default::default()
            })),
        },
    }
}

fn match_condition(field: &str, value: &serde_json::Value) -> Condition {
    let match_value = match value {
        serde_json::Value::Bool(b) => MatchValue::Boolean(*b),
        serde_json::Value::Number(n) => MatchValue::Integer(n.as_i64().unwrap_or_default()),
        serde_json::Value::String(s) => MatchValue::Keyword(s.clone()),
        other => MatchValue::Keyword(other.to_string()),
    };
    Condition {
        condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
            key: field.to_string(),
            r#match: Some(Match {
                match_value: Some(match_value),
            }),
            ..Default::default()
        })),
    }
}

fn json_to_qdrant_value(value: &serde_json::Value) -> QdrantValue {
    let kind = match value {
        serde_json::Value::Null => Kind::NullValue(0),
        serde_json::Value::Bool(b) => Kind::BoolValue(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Kind::IntegerValue(i)
            } else {
                Kind::DoubleValue(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Kind::StringValue(s.clone()),
        serde_json::Value::Array(items) => Kind::ListValue(ListValue {
            values: items.iter().map(json_to_qdrant_value).collect(),
        }),
        serde_json::Value::Object(map) => Kind::StructValue(Struct {
            fields: map
                .iter()
                .map(|(k, v)| (k.clone(), json_to_qdrant_value(v)))
                .collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

fn qdrant_value_to_json(value: &QdrantValue) -> serde_json::Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(b)) => serde_json::Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => serde_json::Value::Number((*i).into()),
        Some(Kind::DoubleValue(f)) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Some(Kind::StringValue(s)) => serde_json::Value::String(s.clone()),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::StructValue(s)) => serde_json::Value::Object(
            s.fields
                .iter()
                .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
                .collect(),
        ),
    }
}

fn payload_to_json(payload: &HashMap<String, QdrantValue>) -> serde_json::Value {
    serde_json::Value::Object(
        payload
            .iter()
            .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
            .collect(),
    )
}

/// Query-caching wrapper around any [`VectorIndex`].
pub struct CachedIndex {
    inner: Arc<dyn VectorIndex>,
    cache: TtlCache<Vec<QueryMatch>>,
}

impl CachedIndex {
    pub fn new(inner: Arc<dyn VectorIndex>, cache_config: &CacheConfig) -> Self {
        let cache = TtlCache::new(
            cache_config.capacity,
            Duration::from_secs(cache_config.index_ttl_secs),
        );
        Self { inner, cache }
    }

    fn query_key(vector: &[f32], top_k: usize, filter: Option<&FilterExpr>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(vector_bytes(vector));
        hasher.update(top_k.to_le_bytes());
        if let Some(filter) = filter {
            hasher.update(serde_json::to_string(filter).unwrap_or_default());
        }
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl VectorIndex for CachedIndex {
    async fn upsert(&self, vectors: Vec<IndexedVector>) -> Result<(), PipelineError> {
        self.inner.upsert(vectors).await?;
        self.cache.invalidate_all();
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&FilterExpr>,
    ) -> Result<Vec<QueryMatch>, PipelineError> {
        let key = Self::query_key(vector, top_k, filter);
        let inner = Arc::clone(&self.inner);
        let vector = vector.to_vec();
        let filter = filter.cloned();
        self.cache
            .get_or_compute(key, async move {
                inner.query(&vector, top_k, filter.as_ref()).await
            })
            .await
    }

    async fn delete(&self, ids: &[String]) -> Result<(), PipelineError> {
        self.inner.delete(ids).await?;
        self.cache.invalidate_all();
        Ok(())
    }
}

/// Instantiate the configured backend, wrapped in the query cache.
pub async fn create_index(
    config: &IndexConfig,
    dims: usize,
    cache_config: &CacheConfig,
) -> Result<Arc<dyn VectorIndex>> {
    let inner: Arc<dyn VectorIndex> = match config.backend.as_str() {
        "qdrant" => Arc::new(QdrantIndex::connect(config, dims).await?),
        "memory" => Arc::new(InMemoryIndex::new()),
        other => bail!("unknown index backend: {other}"),
    };
    Ok(Arc::new(CachedIndex::new(inner, cache_config)))
}
