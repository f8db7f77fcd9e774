// src/memory/vector_index.rs
// In-process, exact-cosine vector index: a single RwLock-guarded map, persisted
// as one JSON file. No external ANN service — see DESIGN.md for why this diverges
// from the teacher's Qdrant-backed store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::{RecalldError, RecalldResult};

pub const KNOWLEDGE_ROLE: &str = "knowledge";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VectorMetadata {
    pub session_id: Option<String>,
    pub role: String,
    pub category: String,
    pub source: String,
    pub importance: f32,
    pub is_active: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorDocument {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub meta_data: VectorMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub session_id: Option<String>,
    pub categories: Vec<String>,
    pub active_only: bool,
    pub min_score: f32,
}

impl SearchFilter {
    fn matches(&self, meta: &VectorMetadata) -> bool {
        if let Some(session_id) = &self.session_id {
            if meta.session_id.as_deref() != Some(session_id.as_str()) {
                return false;
            }
        }
        if !self.categories.is_empty() && !self.categories.iter().any(|c| c == &meta.category) {
            return false;
        }
        if self.active_only && !meta.is_active {
            return false;
        }
        true
    }
}

pub struct VectorIndex {
    inner: RwLock<HashMap<String, VectorDocument>>,
    path: PathBuf,
}

impl VectorIndex {
    /// Loads the index from `path`. A missing file is a normal empty index; any
    /// other I/O or deserialization error is fatal, matching spec.md §4.A.
    pub fn load(path: impl AsRef<Path>) -> RecalldResult<Self> {
        let path = path.as_ref().to_path_buf();

        let map = match std::fs::read(&path) {
            Ok(bytes) => parse_documents(&bytes)
                .map_err(|e| RecalldError::VectorIndexLoad(format!("{path:?}: {e}")))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(?path, "no existing vector index, starting empty");
                HashMap::new()
            }
            Err(e) => return Err(RecalldError::VectorIndexLoad(format!("{path:?}: {e}"))),
        };

        Ok(Self {
            inner: RwLock::new(map),
            path,
        })
    }

    pub fn add(&self, doc: VectorDocument) -> RecalldResult<()> {
        {
            let mut guard = self.inner.write().unwrap();
            guard.insert(doc.id.clone(), doc);
        }
        self.persist()
    }

    pub fn add_batch(&self, docs: Vec<VectorDocument>) -> RecalldResult<()> {
        {
            let mut guard = self.inner.write().unwrap();
            for doc in docs {
                guard.insert(doc.id.clone(), doc);
            }
        }
        self.persist()
    }

    pub fn get(&self, id: &str) -> Option<VectorDocument> {
        self.inner.read().unwrap().get(id).cloned()
    }

    pub fn delete(&self, id: &str) -> RecalldResult<()> {
        {
            let mut guard = self.inner.write().unwrap();
            guard.remove(id);
        }
        self.persist()
    }

    pub fn update_metadata(&self, id: &str, meta: VectorMetadata) -> RecalldResult<()> {
        {
            let mut guard = self.inner.write().unwrap();
            match guard.get_mut(id) {
                Some(doc) => doc.meta_data = meta,
                None => return Err(RecalldError::NotFound(format!("vector document {id}"))),
            }
        }
        self.persist()
    }

    pub fn count(&self) -> usize {
        self.inner.read().unwrap().len()
    }

    /// Cosine-similarity search against every document passing `filter`,
    /// returning the top `k` by score descending. Ties break on higher
    /// `created_at`, then lexicographic id.
    pub fn search(&self, query: &[f32], k: usize, filter: &SearchFilter) -> Vec<(VectorDocument, f32)> {
        let guard = self.inner.read().unwrap();

        let mut scored: Vec<(VectorDocument, f32)> = guard
            .values()
            .filter(|doc| filter.matches(&doc.meta_data))
            .map(|doc| (doc.clone(), cosine_similarity(query, &doc.embedding)))
            .filter(|(_, score)| *score >= filter.min_score)
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.meta_data.created_at.cmp(&a.0.meta_data.created_at))
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(k);
        scored
    }

    fn persist(&self) -> RecalldResult<()> {
        let snapshot = {
            let guard = self.inner.read().unwrap();
            guard.clone()
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| RecalldError::Internal(anyhow::anyhow!("serialize vector index: {e}")))?;

        let tmp_path = self.path.with_extension("json.tmp");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| RecalldError::Internal(anyhow::anyhow!("create {parent:?}: {e}")))?;
            }
        }
        std::fs::write(&tmp_path, &bytes)
            .map_err(|e| RecalldError::Internal(anyhow::anyhow!("write {tmp_path:?}: {e}")))?;

        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            warn!(error = %e, "atomic rename failed, falling back to direct write");
            std::fs::write(&self.path, &bytes)
                .map_err(|e| RecalldError::Internal(anyhow::anyhow!("write {:?}: {e}", self.path)))?;
        }
        Ok(())
    }
}

/// Accepts both the structured `meta_data:{...}` form and a legacy flat
/// `metadata:{k:string}` sidecar, synthesizing one from the other.
fn parse_documents(bytes: &[u8]) -> anyhow::Result<HashMap<String, VectorDocument>> {
    let raw: HashMap<String, Value> = serde_json::from_slice(bytes)?;
    let mut out = HashMap::with_capacity(raw.len());

    for (id, mut value) in raw {
        if value.get("meta_data").is_none() {
            if let Some(legacy) = value.get("metadata").cloned() {
                let synthesized = synthesize_meta_data(&legacy);
                if let Some(obj) = value.as_object_mut() {
                    obj.insert("meta_data".to_string(), synthesized);
                }
            }
        }
        let doc: VectorDocument = serde_json::from_value(value)?;
        out.insert(id, doc);
    }
    Ok(out)
}

fn synthesize_meta_data(legacy: &Value) -> Value {
    let get = |k: &str| legacy.get(k).and_then(|v| v.as_str()).map(str::to_string);
    serde_json::json!({
        "session_id": get("session_id"),
        "role": get("role").unwrap_or_else(|| KNOWLEDGE_ROLE.to_string()),
        "category": get("category").unwrap_or_default(),
        "source": get("source").unwrap_or_default(),
        "importance": legacy.get("importance").and_then(|v| v.as_f64()).unwrap_or(0.0),
        "is_active": legacy.get("is_active").and_then(|v| v.as_bool()).unwrap_or(true),
        "created_at": legacy.get("created_at").and_then(|v| v.as_i64()).unwrap_or(0),
    })
}

/// Double-precision accumulation; returns 0 for zero-length or mismatched
/// dimensionality vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
        norm_a += *x as f64 * *x as f64;
        norm_b += *y as f64 * *y as f64;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, embedding: Vec<f32>, created_at: i64) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            content: format!("content-{id}"),
            embedding,
            meta_data: VectorMetadata {
                session_id: None,
                role: KNOWLEDGE_ROLE.to_string(),
                category: "fact".to_string(),
                source: "manual".to_string(),
                importance: 0.5,
                is_active: true,
                created_at,
            },
        }
    }

    #[test]
    fn cosine_identity_and_symmetry() {
        let x = vec![1.0, 2.0, 3.0];
        let y = vec![-1.0, 0.5, 4.0];
        assert!((cosine_similarity(&x, &x) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&x, &y) - cosine_similarity(&y, &x)).abs() < 1e-6);
        let sim = cosine_similarity(&x, &y);
        assert!((-1.0..=1.0).contains(&sim));
    }

    #[test]
    fn zero_vector_and_dimension_mismatch_score_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn round_trip_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.json");

        let index = VectorIndex::load(&path).unwrap();
        let d = doc("a", vec![1.0, 0.0, 0.0], 100);
        index.add(d.clone()).unwrap();

        let reloaded = VectorIndex::load(&path).unwrap();
        let results = reloaded.search(&d.embedding, 1, &SearchFilter::default());
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "a");
        assert!((results[0].1 - 1.0).abs() < 1e-5);
    }

    #[test]
    fn filter_semantics_are_conjunctive() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::load(dir.path().join("vectors.json")).unwrap();

        let mut inactive = doc("b", vec![1.0, 0.0], 1);
        inactive.meta_data.is_active = false;
        inactive.meta_data.category = "preference".to_string();
        index.add(inactive).unwrap();
        index.add(doc("a", vec![1.0, 0.0], 2)).unwrap();

        let filter = SearchFilter {
            active_only: true,
            ..Default::default()
        };
        let results = index.search(&[1.0, 0.0], 10, &filter);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0.id, "a");
    }

    #[test]
    fn update_metadata_on_missing_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::load(dir.path().join("vectors.json")).unwrap();
        let err = index.update_metadata("missing", VectorMetadata::default());
        assert!(matches!(err, Err(RecalldError::NotFound(_))));
    }
}
