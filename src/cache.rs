//! Read-through cache of advanced-select option trees, keyed by field.

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::types::{FieldId, Part};

/// A node of an advanced-select option tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionNode {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OptionNode>,
}

impl OptionNode {
    #[must_use]
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value: None,
            extra: None,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_extra(mut self, extra: serde_json::Value) -> Self {
        self.extra = Some(extra);
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Vec<OptionNode>) -> Self {
        self.children = children;
        self
    }

    /// The facet an `adv_part` accessor reads: `selection` is the value (or
    /// the label when there is none), `extra` the extra payload, `nodeId` the id.
    #[must_use]
    pub fn part(&self, part: Part) -> Option<serde_json::Value> {
        match part {
            Part::Selection => Some(serde_json::Value::String(
                self.value.clone().unwrap_or_else(|| self.label.clone()),
            )),
            Part::Extra => self.extra.clone(),
            Part::NodeId => Some(serde_json::Value::String(self.id.clone())),
        }
    }
}

/// An option tree as loaded at one point in time.
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    pub field_id: FieldId,
    pub roots: Vec<OptionNode>,
    pub loaded_at: Instant,
}

impl TreeSnapshot {
    /// Depth-first search for a node by id.
    #[must_use]
    pub fn find(&self, node_id: &str) -> Option<&OptionNode> {
        let mut stack: Vec<&OptionNode> = self.roots.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if node.id == node_id {
                return Some(node);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&OptionNode> = self.roots.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to load option tree for field '{field_id}': {source}")]
    Load {
        field_id: FieldId,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

pub type LoadResult = Result<Vec<OptionNode>, Box<dyn Error + Send + Sync>>;

/// Fetches the option tree of a field from wherever it lives.
pub trait TreeLoader {
    fn load(&self, field_id: &FieldId) -> LoadResult;
}

impl<F> TreeLoader for F
where
    F: Fn(&FieldId) -> LoadResult,
{
    fn load(&self, field_id: &FieldId) -> LoadResult {
        self(field_id)
    }
}

/// Memoizes [`TreeLoader`] results per field for a fixed time to live.
pub struct OptionTreeCache<L> {
    loader: L,
    ttl: Duration,
    entries: HashMap<FieldId, Arc<TreeSnapshot>>,
}

impl<L: TreeLoader> OptionTreeCache<L> {
    pub fn new(loader: L, config: &CacheConfig) -> Self {
        Self {
            loader,
            ttl: config.ttl,
            entries: HashMap::new(),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The cached tree if still fresh, otherwise a freshly loaded one.
    pub fn ensure(&mut self, field_id: &FieldId) -> Result<Arc<TreeSnapshot>, CacheError> {
        if let Some(snapshot) = self.get(field_id) {
            debug!(field_id = %field_id, "option tree cache hit");
            return Ok(snapshot);
        }
        self.force_reload(field_id)
    }

    /// Load the tree now, replacing any cached copy. On failure the previous
    /// entry, if any, is kept.
    pub fn force_reload(&mut self, field_id: &FieldId) -> Result<Arc<TreeSnapshot>, CacheError> {
        let roots = self.loader.load(field_id).map_err(|source| {
            warn!(field_id = %field_id, error = %source, "option tree load failed");
            CacheError::Load {
                field_id: field_id.clone(),
                source,
            }
        })?;
        let snapshot = Arc::new(TreeSnapshot {
            field_id: field_id.clone(),
            roots,
            loaded_at: Instant::now(),
        });
        debug!(field_id = %field_id, nodes = snapshot.node_count(), "loaded option tree");
        self.entries.insert(field_id.clone(), Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// The cached tree, only while it is fresh. Never loads.
    #[must_use]
    pub fn get(&self, field_id: &FieldId) -> Option<Arc<TreeSnapshot>> {
        self.entries
            .get(field_id)
            .filter(|s| self.is_fresh(s, Instant::now()))
            .cloned()
    }

    pub fn invalidate(&mut self, field_id: &FieldId) -> bool {
        self.entries.remove(field_id).is_some()
    }

    /// Drop every stale entry, returning how many were removed.
    pub fn evict_expired(&mut self) -> usize {
        let now = Instant::now();
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, s| now.saturating_duration_since(s.loaded_at) < ttl);
        before - self.entries.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, snapshot: &TreeSnapshot, now: Instant) -> bool {
        now.saturating_duration_since(snapshot.loaded_at) < self.ttl
    }
}
