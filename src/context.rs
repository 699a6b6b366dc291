//! Transaction context
//!
//! The context is an externally-owned bag of shared data threaded through
//! every scheduler call. The scheduler forwards it opaquely; only leaf
//! activities read or write it.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::types::TransactionId;

/// Flat key-value bag shared between leaf activities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkingSet {
    data: HashMap<String, Value>,
}

impl WorkingSet {
    /// Create an empty working set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value by key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Set a value by key.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    /// Remove a value by key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.data.remove(key)
    }

    /// Check whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Export all entries as a plain map.
    pub fn export(&self) -> HashMap<String, Value> {
        self.data.clone()
    }
}

/// Execution context for one transaction attempt.
///
/// Owned by the caller and passed by reference into every scheduler
/// operation. The scheduler never inspects the working set.
#[derive(Clone)]
pub struct TransactionContext {
    /// Transaction id for log correlation.
    pub transaction_id: TransactionId,
    /// Shared data bag for leaf activities.
    pub working_set: Arc<RwLock<WorkingSet>>,
}

impl TransactionContext {
    /// Create a context with a fresh working set and random id.
    pub fn new() -> Self {
        Self::with_id(TransactionId::generate())
    }

    /// Create a context with an explicit transaction id.
    pub fn with_id(transaction_id: impl Into<TransactionId>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            working_set: Arc::new(RwLock::new(WorkingSet::new())),
        }
    }

    /// Create a context over an existing shared working set.
    pub fn with_working_set(
        transaction_id: impl Into<TransactionId>,
        working_set: Arc<RwLock<WorkingSet>>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            working_set,
        }
    }
}

impl Default for TransactionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_working_set_set_get_remove() {
        let mut ws = WorkingSet::new();
        ws.set("answer", json!(42));
        assert!(ws.contains("answer"));
        assert_eq!(ws.get("answer"), Some(&json!(42)));
        assert_eq!(ws.remove("answer"), Some(json!(42)));
        assert!(ws.is_empty());
    }

    #[test]
    fn test_context_shares_working_set_between_clones() {
        tokio_test::block_on(async {
            let ctx = TransactionContext::with_id("tx-1");
            let clone = ctx.clone();
            ctx.working_set.write().await.set("k", json!("v"));
            let ws = clone.working_set.read().await;
            assert_eq!(ws.get("k"), Some(&json!("v")));
        });
    }
}
