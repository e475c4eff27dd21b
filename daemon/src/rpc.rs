/// JSON-RPC dispatch onto the coordination engine.
///
/// Method names follow the operation surface (`task.claim`, `report.submit`,
/// ...). The acting identity arrives out of band: the transport extracts the
/// namespace and hunter headers and passes them alongside the request.
/// Read-only methods may fall back to the configured default namespace; a
/// caller without a hunter header reads as `system`.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use taskhub_core::{
    CompleteTaskParams, EvaluateReportParams, Identity, PublishTaskParams, ReportFilter,
    SubmitReportParams, TaskFilter, Taskhub,
};
use tracing::{debug, info, warn};

use crate::errors::{DaemonError, DaemonResult};
use crate::types::{RpcRequest, RpcResponse};

/// Hunter identity assumed for anonymous read-only calls.
const READ_ONLY_HUNTER: &str = "system";

#[derive(Debug, Deserialize)]
struct RegisterParams {
    #[serde(default)]
    skills: Option<HashMap<String, i64>>,
}

#[derive(Debug, Deserialize)]
struct TaskIdParams {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct DeleteTaskParams {
    task_id: String,
    #[serde(default)]
    force: bool,
}

#[derive(Debug, Deserialize)]
struct StudyParams {
    knowledge_id: String,
}

#[derive(Debug, Deserialize)]
struct HunterGetParams {
    #[serde(default)]
    hunter_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AdjustReputationParams {
    hunter_id: String,
    reputation: i64,
}

#[derive(Debug, Deserialize)]
struct PostMessageParams {
    content: String,
}

#[derive(Debug, Deserialize)]
struct LatestMessagesParams {
    #[serde(default)]
    limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeAddParams {
    title: String,
    content: String,
    #[serde(default)]
    collection_id: Option<String>,
    #[serde(default)]
    parent_document_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KnowledgeIdParams {
    knowledge_id: String,
}

#[derive(Debug, Deserialize)]
struct KnowledgeListParams {
    #[serde(default)]
    collection_id: Option<String>,
    #[serde(default = "default_list_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_list_limit() -> i64 {
    25
}

#[derive(Debug, Deserialize)]
struct KnowledgeSearchParams {
    query: String,
    #[serde(default = "default_list_limit")]
    limit: i64,
}

#[derive(Debug, Deserialize)]
struct KnowledgeUpdateParams {
    knowledge_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateCollectionParams {
    name: String,
    #[serde(default)]
    description: Option<String>,
}

/// JSON-RPC server over one [`Taskhub`].
pub struct JsonRpcServer {
    hub: Arc<Taskhub>,
    default_namespace: Option<String>,
}

impl JsonRpcServer {
    /// Create a dispatcher for the hub.
    pub fn new(hub: Arc<Taskhub>) -> Self {
        let default_namespace = hub.config().server.default_namespace.clone();
        JsonRpcServer {
            hub,
            default_namespace,
        }
    }

    /// Process one request with the transport-supplied identity parts.
    pub async fn process_request(
        &self,
        request: RpcRequest,
        namespace: Option<String>,
        hunter_id: Option<String>,
    ) -> RpcResponse {
        let request_id = request.id.clone();
        let method = request.method.clone();
        let start = Instant::now();

        if request.jsonrpc != "2.0" {
            return RpcResponse::error(-32600, "Invalid Request".to_string(), request_id);
        }
        debug!(method, "processing RPC request");

        let result = self
            .dispatch(&method, request.params, namespace, hunter_id)
            .await;
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(value) => {
                info!(method, elapsed, "RPC request succeeded");
                RpcResponse::success(value, request_id)
            }
            Err(e) => {
                warn!(method, elapsed, error = %e, "RPC request failed");
                let (code, message) = e.to_rpc_error();
                RpcResponse::error(code, message, request_id)
            }
        }
    }

    async fn dispatch(
        &self,
        method: &str,
        params: Option<Value>,
        namespace: Option<String>,
        hunter_id: Option<String>,
    ) -> DaemonResult<Value> {
        match method {
            // Hunter surface
            "hunter.register" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: RegisterParams = parse_params(params)?;
                to_value(self.hub.register_hunter(&identity, params.skills).await?)
            }
            "hunter.get" => {
                let identity = self.read_identity(&namespace, &hunter_id)?;
                let params: HunterGetParams = parse_params(params)?;
                let target = params.hunter_id.unwrap_or_else(|| identity.hunter_id.clone());
                to_value(self.hub.get_hunter(&identity, &target).await?)
            }
            "hunter.list" => {
                let identity = self.read_identity(&namespace, &hunter_id)?;
                to_value(self.hub.list_hunters(&identity).await?)
            }
            "hunter.study" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: StudyParams = parse_params(params)?;
                to_value(self.hub.study(&identity, &params.knowledge_id).await?)
            }
            "hunter.adjust_reputation" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: AdjustReputationParams = parse_params(params)?;
                to_value(
                    self.hub
                        .adjust_reputation(&identity, &params.hunter_id, params.reputation)
                        .await?,
                )
            }

            // Task surface
            "task.publish" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: PublishTaskParams = parse_params(params)?;
                to_value(self.hub.publish_task(&identity, params).await?)
            }
            "task.claim" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: TaskIdParams = parse_params(params)?;
                to_value(self.hub.claim_task(&identity, &params.task_id).await?)
            }
            "task.start" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: TaskIdParams = parse_params(params)?;
                to_value(self.hub.start_task(&identity, &params.task_id).await?)
            }
            "task.complete" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: CompleteTaskParams = parse_params(params)?;
                to_value(self.hub.complete_task(&identity, params).await?)
            }
            "task.get" => {
                let identity = self.read_identity(&namespace, &hunter_id)?;
                let params: TaskIdParams = parse_params(params)?;
                to_value(self.hub.get_task(&identity, &params.task_id).await?)
            }
            "task.list" => {
                let identity = self.read_identity(&namespace, &hunter_id)?;
                let filter: TaskFilter = parse_params(params)?;
                to_value(self.hub.list_tasks(&identity, filter).await?)
            }
            "task.archive" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: TaskIdParams = parse_params(params)?;
                to_value(self.hub.archive_task(&identity, &params.task_id).await?)
            }
            "task.delete" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: DeleteTaskParams = parse_params(params)?;
                self.hub
                    .delete_task(&identity, &params.task_id, params.force)
                    .await?;
                Ok(json!({ "deleted": params.task_id }))
            }

            // Report surface
            "report.submit" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: SubmitReportParams = parse_params(params)?;
                to_value(self.hub.submit_report(&identity, params).await?)
            }
            "report.evaluate" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: EvaluateReportParams = parse_params(params)?;
                to_value(self.hub.evaluate_report(&identity, params).await?)
            }
            "report.list" => {
                let identity = self.read_identity(&namespace, &hunter_id)?;
                let filter: ReportFilter = parse_params(params)?;
                to_value(self.hub.list_reports(&identity, filter).await?)
            }

            // Discussion surface
            "discussion.post" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                let params: PostMessageParams = parse_params(params)?;
                to_value(self.hub.post_message(&identity, &params.content).await?)
            }
            "discussion.unread" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                to_value(self.hub.unread_messages(&identity).await?)
            }
            "discussion.latest" => {
                let identity = self.read_identity(&namespace, &hunter_id)?;
                let params: LatestMessagesParams = parse_params(params)?;
                to_value(self.hub.latest_messages(&identity, params.limit).await?)
            }
            "discussion.mark_read" => {
                let identity = self.identity(&namespace, &hunter_id)?;
                self.hub.mark_discussion_read(&identity).await?;
                Ok(json!({ "marked_read": identity.hunter_id }))
            }

            // Knowledge surface
            "knowledge.add" => {
                let params: KnowledgeAddParams = parse_params(params)?;
                to_value(
                    self.hub
                        .knowledge_add(
                            &params.title,
                            &params.content,
                            params.collection_id,
                            params.parent_document_id,
                        )
                        .await?,
                )
            }
            "knowledge.get" => {
                let params: KnowledgeIdParams = parse_params(params)?;
                to_value(self.hub.knowledge_get(&params.knowledge_id).await?)
            }
            "knowledge.list" => {
                let params: KnowledgeListParams = parse_params(params)?;
                to_value(
                    self.hub
                        .knowledge_list(params.collection_id, params.limit, params.offset)
                        .await?,
                )
            }
            "knowledge.search" => {
                let params: KnowledgeSearchParams = parse_params(params)?;
                to_value(self.hub.knowledge_search(&params.query, params.limit).await?)
            }
            "knowledge.update" => {
                let params: KnowledgeUpdateParams = parse_params(params)?;
                to_value(
                    self.hub
                        .knowledge_update(&params.knowledge_id, params.title, params.content)
                        .await?,
                )
            }
            "knowledge.delete" => {
                let params: KnowledgeIdParams = parse_params(params)?;
                self.hub.knowledge_delete(&params.knowledge_id).await?;
                Ok(json!({ "deleted": params.knowledge_id }))
            }
            "knowledge.collections" => to_value(self.hub.knowledge_collections().await?),
            "knowledge.create_collection" => {
                let params: CreateCollectionParams = parse_params(params)?;
                to_value(
                    self.hub
                        .knowledge_create_collection(&params.name, params.description)
                        .await?,
                )
            }

            // System surface
            "system.stats" => {
                let identity = self.read_identity(&namespace, &hunter_id)?;
                to_value(self.hub.system_stats(&identity).await?)
            }
            "system.reap" => {
                let transitioned = self.hub.run_reaper_once().await?;
                Ok(json!({ "transitioned": transitioned }))
            }

            other => Err(DaemonError::MethodNotFound(other.to_string())),
        }
    }

    /// Identity for mutating operations: both parts required.
    fn identity(
        &self,
        namespace: &Option<String>,
        hunter_id: &Option<String>,
    ) -> DaemonResult<Identity> {
        Ok(Identity::new(namespace.as_deref(), hunter_id.as_deref())?)
    }

    /// Identity for read-only operations: the configured default namespace
    /// fills in for a missing header, and anonymous readers act as `system`.
    fn read_identity(
        &self,
        namespace: &Option<String>,
        hunter_id: &Option<String>,
    ) -> DaemonResult<Identity> {
        let namespace = namespace
            .clone()
            .or_else(|| self.default_namespace.clone());
        let hunter = hunter_id.clone().unwrap_or_else(|| READ_ONLY_HUNTER.to_string());
        Ok(Identity::new(namespace.as_deref(), Some(hunter.as_str()))?)
    }
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> DaemonResult<T> {
    let value = params.unwrap_or_else(|| json!({}));
    serde_json::from_value(value)
        .map_err(|e| DaemonError::InvalidRequest(format!("bad params: {}", e)))
}

fn to_value<T: serde::Serialize>(value: T) -> DaemonResult<Value> {
    Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskhub_core::TaskhubConfig;
    use tempfile::TempDir;

    fn test_server(dir: &TempDir, default_namespace: Option<&str>) -> JsonRpcServer {
        let mut config = TaskhubConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        config.server.default_namespace = default_namespace.map(str::to_string);
        JsonRpcServer::new(Arc::new(Taskhub::new(config).unwrap()))
    }

    fn request(method: &str, params: Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: Some(params),
            id: Some(json!(1)),
        }
    }

    fn ns() -> Option<String> {
        Some("test-ns".to_string())
    }

    #[tokio::test]
    async fn test_register_and_publish_flow() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir, None);

        let response = server
            .process_request(
                request("hunter.register", json!({"skills": {"python": 50}})),
                ns(),
                Some("h1".to_string()),
            )
            .await;
        assert!(response.error.is_none(), "{:?}", response.error);
        let hunter = response.result.unwrap();
        assert_eq!(hunter["skills"]["python"], json!(50));

        let response = server
            .process_request(
                request(
                    "task.publish",
                    json!({"name": "t", "details": "d", "required_skill": "python"}),
                ),
                ns(),
                Some("h1".to_string()),
            )
            .await;
        assert!(response.error.is_none(), "{:?}", response.error);
        let task = response.result.unwrap();
        assert_eq!(task["status"], json!("pending"));

        // Self-claim surfaces the dedicated code.
        let response = server
            .process_request(
                request("task.claim", json!({"task_id": task["id"]})),
                ns(),
                Some("h1".to_string()),
            )
            .await;
        let error = response.error.unwrap();
        assert_eq!(error.code, -32011);
    }

    #[tokio::test]
    async fn test_missing_identity_is_auth_error() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir, None);
        let response = server
            .process_request(request("task.claim", json!({"task_id": "task-x"})), None, None)
            .await;
        assert_eq!(response.error.unwrap().code, -32001);
    }

    #[tokio::test]
    async fn test_read_ops_use_default_namespace() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir, Some("shared"));
        let response = server
            .process_request(request("task.list", json!({})), None, None)
            .await;
        assert!(response.error.is_none(), "{:?}", response.error);
        assert_eq!(response.result.unwrap(), json!([]));
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir, None);
        let response = server
            .process_request(request("task.bogus", json!({})), ns(), Some("h1".to_string()))
            .await;
        assert_eq!(response.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_wrong_jsonrpc_version() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir, None);
        let mut req = request("task.list", json!({}));
        req.jsonrpc = "1.0".to_string();
        let response = server.process_request(req, ns(), Some("h1".to_string())).await;
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_bad_params() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir, None);
        let response = server
            .process_request(
                request("task.claim", json!({"task": "wrong-key"})),
                ns(),
                Some("h1".to_string()),
            )
            .await;
        assert_eq!(response.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_knowledge_without_backend() {
        let dir = TempDir::new().unwrap();
        let server = test_server(&dir, None);
        let response = server
            .process_request(
                request("knowledge.get", json!({"knowledge_id": "doc-1"})),
                ns(),
                Some("h1".to_string()),
            )
            .await;
        assert_eq!(response.error.unwrap().code, -32015);
    }
}
