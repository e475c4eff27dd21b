//! Tenancy: caller identity and the per-namespace store registry.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use crate::errors::{HubError, HubResult};
use crate::store::SqliteStore;

/// Longest namespace tag accepted.
const MAX_NAMESPACE_LEN: usize = 64;

/// The acting hunter and tenancy boundary, declared by the transport on
/// every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Tenancy boundary; selects the namespace store
    pub namespace: String,

    /// Caller-declared hunter identifier
    pub hunter_id: String,
}

impl Identity {
    /// Build an identity from transport-supplied values.
    ///
    /// Both parts are required; the namespace must be usable as a filename
    /// segment.
    pub fn new(namespace: Option<&str>, hunter_id: Option<&str>) -> HubResult<Self> {
        let namespace = namespace
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .ok_or_else(|| HubError::Identity("missing namespace".to_string()))?;
        validate_namespace(namespace)?;
        let hunter_id = hunter_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| HubError::Identity("missing hunter id".to_string()))?;
        Ok(Identity {
            namespace: namespace.to_string(),
            hunter_id: hunter_id.to_string(),
        })
    }
}

/// Check that a namespace tag is safe to embed in a database file name.
///
/// Path separators and traversal segments are rejected outright.
pub fn validate_namespace(namespace: &str) -> HubResult<()> {
    if namespace.is_empty() {
        return Err(HubError::Identity("namespace must not be empty".to_string()));
    }
    if namespace.len() > MAX_NAMESPACE_LEN {
        return Err(HubError::Identity(format!(
            "namespace exceeds {} characters",
            MAX_NAMESPACE_LEN
        )));
    }
    if namespace == "." || namespace == ".." {
        return Err(HubError::Identity(
            "namespace must not be a traversal segment".to_string(),
        ));
    }
    if !namespace
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(HubError::Identity(format!(
            "namespace {:?} contains characters outside [A-Za-z0-9._-]",
            namespace
        )));
    }
    Ok(())
}

/// Process-wide mapping from namespace to its singleton store.
///
/// Stores open lazily on first use, stay open across requests, and close
/// only on shutdown.
pub struct StoreRegistry {
    /// Directory holding one database file per namespace
    data_dir: PathBuf,

    /// Open stores keyed by namespace
    stores: Mutex<HashMap<String, Arc<SqliteStore>>>,
}

impl StoreRegistry {
    /// Create a registry rooted at `data_dir`.
    pub fn new(data_dir: PathBuf) -> Self {
        StoreRegistry {
            data_dir,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Get or open the store for `namespace`.
    pub async fn store_for(&self, namespace: &str) -> HubResult<Arc<SqliteStore>> {
        validate_namespace(namespace)?;
        let mut stores = self.stores.lock().await;
        if let Some(store) = stores.get(namespace) {
            return Ok(Arc::clone(store));
        }
        let db_path = self.data_dir.join(format!("{}.db", namespace));
        let store = Arc::new(SqliteStore::connect(&db_path).await?);
        stores.insert(namespace.to_string(), Arc::clone(&store));
        info!(namespace, "opened namespace store");
        Ok(store)
    }

    /// Namespaces with an open store.
    pub async fn namespaces(&self) -> Vec<String> {
        let stores = self.stores.lock().await;
        stores.keys().cloned().collect()
    }

    /// Close every open store. Called on shutdown.
    pub async fn close_all(&self) {
        let mut stores = self.stores.lock().await;
        for (namespace, store) in stores.drain() {
            store.close().await;
            info!(namespace = %namespace, "closed namespace store");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_identity_requires_both_parts() {
        assert!(Identity::new(Some("team-a"), Some("hunter-1")).is_ok());
        assert!(matches!(
            Identity::new(None, Some("hunter-1")),
            Err(HubError::Identity(_))
        ));
        assert!(matches!(
            Identity::new(Some("team-a"), None),
            Err(HubError::Identity(_))
        ));
        assert!(matches!(
            Identity::new(Some("  "), Some("hunter-1")),
            Err(HubError::Identity(_))
        ));
    }

    #[test]
    fn test_namespace_rejects_path_separators() {
        assert!(validate_namespace("../etc").is_err());
        assert!(validate_namespace("a/b").is_err());
        assert!(validate_namespace("a\\b").is_err());
        assert!(validate_namespace("..").is_err());
        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("team a").is_err());
        assert!(validate_namespace("team-a.prod_1").is_ok());
    }

    #[test]
    fn test_namespace_length_cap() {
        let long = "n".repeat(MAX_NAMESPACE_LEN + 1);
        assert!(validate_namespace(&long).is_err());
        let ok = "n".repeat(MAX_NAMESPACE_LEN);
        assert!(validate_namespace(&ok).is_ok());
    }

    #[tokio::test]
    async fn test_registry_reuses_stores() {
        let dir = TempDir::new().unwrap();
        let registry = StoreRegistry::new(dir.path().to_path_buf());
        let a = registry.store_for("team-a").await.unwrap();
        let b = registry.store_for("team-a").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = registry.store_for("team-b").await.unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(registry.namespaces().await.len(), 2);
    }

    #[tokio::test]
    async fn test_registry_rejects_bad_namespace() {
        let dir = TempDir::new().unwrap();
        let registry = StoreRegistry::new(dir.path().to_path_buf());
        assert!(registry.store_for("../escape").await.is_err());
    }
}
