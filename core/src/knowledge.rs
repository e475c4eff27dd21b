//! Opaque adapter over the external document store.
//!
//! The core keeps no knowledge bodies of its own; every call proxies to an
//! Outline-compatible HTTP API (bearer-token POSTs with JSON bodies against
//! `/api/documents.*` and `/api/collections.*`). Responses arrive wrapped in
//! an `ok`/`data` envelope; anything else is an API error. Freshness is the
//! external service's problem, so nothing is cached here.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::config::OutlineConfig;
use crate::errors::{KnowledgeError, KnowledgeResult};

/// A document as the core sees it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KnowledgeDoc {
    /// Document identifier in the external service
    pub id: String,

    /// Title
    #[serde(default)]
    pub title: String,

    /// Markdown body
    #[serde(default)]
    pub text: String,

    /// Owning collection, when reported
    #[serde(default, rename = "collectionId")]
    pub collection_id: Option<String>,

    /// Skill tags used by the study operation
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One search hit: the matching context plus the document it came from.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SearchHit {
    /// Highlighted snippet around the match
    #[serde(default)]
    pub context: String,

    /// The matching document
    #[serde(default)]
    pub document: KnowledgeDoc,
}

/// A document collection in the external service.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Collection {
    /// Collection identifier
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
}

/// Request payload for document creation.
#[derive(Debug, Clone)]
pub struct CreateDocument {
    /// Document title
    pub title: String,

    /// Markdown body
    pub text: String,

    /// Target collection
    pub collection_id: String,

    /// Optional parent for nesting
    pub parent_document_id: Option<String>,

    /// Publish immediately; false leaves the document in draft state
    pub publish: bool,
}

/// The external knowledge backend as consumed by the core.
#[async_trait]
pub trait KnowledgeBackend: Send + Sync {
    /// Create a document.
    async fn create_document(&self, request: CreateDocument) -> KnowledgeResult<KnowledgeDoc>;

    /// Fetch a document by ID.
    async fn get_document(&self, document_id: &str) -> KnowledgeResult<KnowledgeDoc>;

    /// List documents in a collection.
    async fn list_documents(
        &self,
        collection_id: &str,
        limit: i64,
        offset: i64,
    ) -> KnowledgeResult<Vec<KnowledgeDoc>>;

    /// Full-text search across documents.
    async fn search(&self, query: &str, limit: i64) -> KnowledgeResult<Vec<SearchHit>>;

    /// Update a document's title and/or body.
    async fn update_document(
        &self,
        document_id: &str,
        title: Option<String>,
        text: Option<String>,
    ) -> KnowledgeResult<KnowledgeDoc>;

    /// Delete a document.
    async fn delete_document(&self, document_id: &str) -> KnowledgeResult<()>;

    /// List collections.
    async fn list_collections(&self) -> KnowledgeResult<Vec<Collection>>;

    /// Create a collection.
    async fn create_collection(
        &self,
        name: &str,
        description: Option<String>,
    ) -> KnowledgeResult<Collection>;
}

/// HTTP client for an Outline-compatible document service.
pub struct OutlineClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OutlineClient {
    /// Build a client from configuration. Fails when URL or key is missing.
    pub fn new(config: &OutlineConfig) -> KnowledgeResult<Self> {
        if config.url.is_empty() || config.api_key.is_empty() {
            return Err(KnowledgeError::Unconfigured);
        }
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(OutlineClient {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// POST one RPC call and unwrap the `ok`/`data` envelope.
    async fn call(&self, endpoint: &str, body: Value) -> KnowledgeResult<Value> {
        let url = format!("{}/api/{}", self.base_url, endpoint);
        debug!(endpoint, "document service call");
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let envelope: Value = response.json().await?;
        if !envelope.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            let message = envelope
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(KnowledgeError::Api(message.to_string()));
        }
        Ok(envelope.get("data").cloned().unwrap_or(Value::Null))
    }

    fn decode<T: serde::de::DeserializeOwned>(data: Value) -> KnowledgeResult<T> {
        serde_json::from_value(data).map_err(|e| KnowledgeError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl KnowledgeBackend for OutlineClient {
    async fn create_document(&self, request: CreateDocument) -> KnowledgeResult<KnowledgeDoc> {
        let mut payload = json!({
            "title": request.title,
            "text": request.text,
            "collectionId": request.collection_id,
            "publish": request.publish,
        });
        if let Some(parent) = &request.parent_document_id {
            payload["parentDocumentId"] = json!(parent);
        }
        let data = self.call("documents.create", payload).await?;
        Self::decode(data)
    }

    async fn get_document(&self, document_id: &str) -> KnowledgeResult<KnowledgeDoc> {
        let data = self
            .call("documents.info", json!({ "id": document_id }))
            .await?;
        Self::decode(data)
    }

    async fn list_documents(
        &self,
        collection_id: &str,
        limit: i64,
        offset: i64,
    ) -> KnowledgeResult<Vec<KnowledgeDoc>> {
        let data = self
            .call(
                "documents.list",
                json!({
                    "collectionId": collection_id,
                    "limit": limit,
                    "offset": offset,
                }),
            )
            .await?;
        Self::decode(data)
    }

    async fn search(&self, query: &str, limit: i64) -> KnowledgeResult<Vec<SearchHit>> {
        let data = self
            .call(
                "documents.search",
                json!({ "query": query, "limit": limit }),
            )
            .await?;
        Self::decode(data)
    }

    async fn update_document(
        &self,
        document_id: &str,
        title: Option<String>,
        text: Option<String>,
    ) -> KnowledgeResult<KnowledgeDoc> {
        let mut payload = json!({ "id": document_id });
        if let Some(title) = title {
            payload["title"] = json!(title);
        }
        if let Some(text) = text {
            payload["text"] = json!(text);
        }
        let data = self.call("documents.update", payload).await?;
        Self::decode(data)
    }

    async fn delete_document(&self, document_id: &str) -> KnowledgeResult<()> {
        self.call("documents.delete", json!({ "id": document_id }))
            .await?;
        Ok(())
    }

    async fn list_collections(&self) -> KnowledgeResult<Vec<Collection>> {
        let data = self.call("collections.list", json!({})).await?;
        Self::decode(data)
    }

    async fn create_collection(
        &self,
        name: &str,
        description: Option<String>,
    ) -> KnowledgeResult<Collection> {
        let mut payload = json!({ "name": name });
        if let Some(description) = description {
            payload["description"] = json!(description);
        }
        let data = self.call("collections.create", payload).await?;
        Self::decode(data)
    }
}
