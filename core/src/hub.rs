//! The coordination orchestrator.
//!
//! [`Taskhub`] is the entry point the transports call: it resolves the
//! caller's identity to a namespace store, runs the service operation inside
//! that store's transaction, and schedules post-commit side effects. The
//! only side effect today is knowledge auto-drafting, which runs on a
//! spawned task so the caller's response never waits on external I/O, and
//! whose failures are logged rather than surfaced.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::TaskhubConfig;
use crate::discussion::DiscussionMessage;
use crate::discussion_service;
use crate::errors::{HubError, HubResult};
use crate::hunter::Hunter;
use crate::hunter_service;
use crate::knowledge::{
    Collection, CreateDocument, KnowledgeBackend, KnowledgeDoc, OutlineClient, SearchHit,
};
use crate::llm::LlmSummarizer;
use crate::registry::{Identity, StoreRegistry};
use crate::report::{Report, ReportStatus};
use crate::report_service;
use crate::store::{ReportFilter, SqliteStore, TaskFilter};
use crate::task::{Task, TaskStatus, TaskType};
use crate::task_service;
use crate::escalation;

/// Parameters for publishing a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishTaskParams {
    /// Task name
    pub name: String,

    /// Detailed instructions
    #[serde(default)]
    pub details: String,

    /// Skill a claimant must hold
    pub required_skill: String,

    /// Task IDs this task depends on
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Kind of work; NORMAL unless stated
    #[serde(default)]
    pub task_type: TaskType,
}

/// Parameters for finishing a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteTaskParams {
    /// Task to finish
    pub task_id: String,

    /// Result payload; the canonical copy travels via the report
    #[serde(default)]
    pub result: Option<String>,

    /// Terminal status, `completed` or `failed`
    pub final_status: TaskStatus,
}

/// Parameters for submitting a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReportParams {
    /// Task the report belongs to
    pub task_id: String,

    /// Outcome the report records
    pub status: ReportStatus,

    /// Result payload
    #[serde(default)]
    pub result: Option<String>,

    /// Additional notes
    #[serde(default)]
    pub details: Option<String>,
}

/// Parameters for evaluating a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateReportParams {
    /// Report under evaluation
    pub report_id: String,

    /// Score in [0, 100]
    pub score: i64,

    /// Free-form feedback
    #[serde(default)]
    pub feedback: String,

    /// Per-skill deltas for the submitter
    #[serde(default)]
    pub skill_updates: HashMap<String, i64>,
}

/// Namespace-level counters for dashboards and monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStats {
    /// All tasks in the namespace
    pub total_tasks: usize,

    /// Tasks waiting for a claimant
    pub pending: usize,

    /// Tasks being worked on
    pub in_progress: usize,

    /// Tasks finished successfully
    pub completed: usize,

    /// Tasks that failed or timed out
    pub failed: usize,

    /// Registered hunters
    pub total_hunters: usize,

    /// Hunters currently holding an in-progress task
    pub active_hunters: usize,
}

/// Entry point sequencing identity resolution, store acquisition, the
/// service call, and post-commit side effects.
pub struct Taskhub {
    config: TaskhubConfig,
    registry: StoreRegistry,
    knowledge: Option<Arc<dyn KnowledgeBackend>>,
    summarizer: Option<Arc<LlmSummarizer>>,
}

impl Taskhub {
    /// Build the orchestrator from configuration.
    pub fn new(config: TaskhubConfig) -> HubResult<Self> {
        config.validate()?;
        let registry = StoreRegistry::new(config.storage.data_dir.clone());
        let knowledge: Option<Arc<dyn KnowledgeBackend>> = if config.outline.enabled {
            Some(Arc::new(OutlineClient::new(&config.outline)?))
        } else {
            None
        };
        let summarizer = if config.llm.enabled {
            Some(Arc::new(LlmSummarizer::new(&config.llm)?))
        } else {
            None
        };
        Ok(Taskhub {
            config,
            registry,
            knowledge,
            summarizer,
        })
    }

    /// Swap in a different knowledge backend (tests, alternate stores).
    pub fn with_knowledge_backend(mut self, backend: Arc<dyn KnowledgeBackend>) -> Self {
        self.knowledge = Some(backend);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &TaskhubConfig {
        &self.config
    }

    /// The namespace store registry.
    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    async fn store(&self, identity: &Identity) -> HubResult<Arc<SqliteStore>> {
        self.registry.store_for(&identity.namespace).await
    }

    fn backend(&self) -> HubResult<Arc<dyn KnowledgeBackend>> {
        self.knowledge
            .clone()
            .ok_or_else(|| HubError::External("document store not configured".to_string()))
    }

    // Hunter operations

    /// Register the acting hunter, merging skills max-wins.
    pub async fn register_hunter(
        &self,
        identity: &Identity,
        skills: Option<HashMap<String, i64>>,
    ) -> HubResult<Hunter> {
        let store = self.store(identity).await?;
        hunter_service::hunter_register(&store, &identity.hunter_id, skills).await
    }

    /// Fetch a hunter in the caller's namespace.
    pub async fn get_hunter(&self, identity: &Identity, hunter_id: &str) -> HubResult<Hunter> {
        let store = self.store(identity).await?;
        hunter_service::get_hunter(&store, hunter_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("hunter {}", hunter_id)))
    }

    /// List every hunter in the caller's namespace.
    pub async fn list_hunters(&self, identity: &Identity) -> HubResult<Vec<Hunter>> {
        let store = self.store(identity).await?;
        hunter_service::hunter_list(&store).await
    }

    /// Study a knowledge item: +5 per skill tag, capped at 100.
    pub async fn study(&self, identity: &Identity, knowledge_id: &str) -> HubResult<Hunter> {
        let backend = self.backend()?;
        let doc = backend.get_document(knowledge_id).await?;
        if doc.tags.is_empty() {
            debug!(knowledge_id, "knowledge item carries no skill tags");
        }
        let store = self.store(identity).await?;
        hunter_service::hunter_study(&store, &identity.hunter_id, &doc.tags).await
    }

    /// Directly set a hunter's reputation (admin surface).
    pub async fn adjust_reputation(
        &self,
        identity: &Identity,
        hunter_id: &str,
        reputation: i64,
    ) -> HubResult<Hunter> {
        let store = self.store(identity).await?;
        hunter_service::adjust_reputation(&store, hunter_id, reputation).await
    }

    // Task operations

    /// Publish a task; priority derives from the caller's reputation.
    pub async fn publish_task(
        &self,
        identity: &Identity,
        params: PublishTaskParams,
    ) -> HubResult<Task> {
        let store = self.store(identity).await?;
        task_service::task_publish(
            &store,
            &params.name,
            &params.details,
            &params.required_skill,
            &identity.hunter_id,
            params.depends_on,
            params.task_type,
        )
        .await
    }

    /// Claim a pending task under a one-hour lease.
    pub async fn claim_task(&self, identity: &Identity, task_id: &str) -> HubResult<Task> {
        let store = self.store(identity).await?;
        task_service::task_claim(&store, &self.config.workflow, task_id, &identity.hunter_id).await
    }

    /// Start a claimed task.
    pub async fn start_task(&self, identity: &Identity, task_id: &str) -> HubResult<Task> {
        let store = self.store(identity).await?;
        task_service::task_start(&store, task_id, &identity.hunter_id).await
    }

    /// Finish an in-progress task.
    pub async fn complete_task(
        &self,
        identity: &Identity,
        params: CompleteTaskParams,
    ) -> HubResult<Task> {
        let store = self.store(identity).await?;
        task_service::task_complete(
            &store,
            &params.task_id,
            &identity.hunter_id,
            params.result.as_deref(),
            params.final_status,
        )
        .await
    }

    /// Fetch a task.
    pub async fn get_task(&self, identity: &Identity, task_id: &str) -> HubResult<Task> {
        let store = self.store(identity).await?;
        task_service::get_task(&store, task_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("task {}", task_id)))
    }

    /// List tasks matching the filter.
    pub async fn list_tasks(&self, identity: &Identity, filter: TaskFilter) -> HubResult<Vec<Task>> {
        let store = self.store(identity).await?;
        task_service::task_list(&store, &filter).await
    }

    /// Archive a terminal task.
    pub async fn archive_task(&self, identity: &Identity, task_id: &str) -> HubResult<Task> {
        let store = self.store(identity).await?;
        task_service::task_archive(&store, task_id).await
    }

    /// Hard-delete a task.
    pub async fn delete_task(
        &self,
        identity: &Identity,
        task_id: &str,
        force: bool,
    ) -> HubResult<()> {
        let store = self.store(identity).await?;
        task_service::task_delete(&store, task_id, force).await
    }

    // Report operations

    /// Submit a report; NORMAL tasks spawn their evaluation task atomically.
    pub async fn submit_report(
        &self,
        identity: &Identity,
        params: SubmitReportParams,
    ) -> HubResult<Report> {
        let store = self.store(identity).await?;
        report_service::report_submit(
            &store,
            &self.config.workflow,
            &params.task_id,
            &identity.hunter_id,
            params.status,
            params.result,
            params.details,
        )
        .await
    }

    /// Evaluate a report; high scores trigger post-commit knowledge drafting.
    pub async fn evaluate_report(
        &self,
        identity: &Identity,
        params: EvaluateReportParams,
    ) -> HubResult<Report> {
        let store = self.store(identity).await?;
        let report = report_service::report_evaluate(
            &store,
            &params.report_id,
            &identity.hunter_id,
            params.score,
            &params.feedback,
            Some(params.skill_updates),
        )
        .await?;
        self.schedule_knowledge_draft(Arc::clone(&store), &report);
        Ok(report)
    }

    /// List reports matching the filter.
    pub async fn list_reports(
        &self,
        identity: &Identity,
        filter: ReportFilter,
    ) -> HubResult<Vec<Report>> {
        let store = self.store(identity).await?;
        report_service::report_list(&store, &filter).await
    }

    /// Queue the post-commit knowledge draft for a high-scoring report.
    ///
    /// Runs on a spawned task so the caller does not wait on external I/O;
    /// failures are logged and never surfaced.
    fn schedule_knowledge_draft(&self, store: Arc<SqliteStore>, report: &Report) {
        if !self.config.features.auto_generate_knowledge {
            return;
        }
        let Some(evaluation) = &report.evaluation else {
            return;
        };
        if evaluation.score < self.config.features.knowledge_score_threshold {
            return;
        }
        let (Some(backend), Some(summarizer)) = (self.knowledge.clone(), self.summarizer.clone())
        else {
            debug!("knowledge drafting skipped: backend or summarizer not configured");
            return;
        };

        let collection_id = self.config.outline.collection_id.clone();
        let task_id = report.task_id.clone();
        let report_id = report.id.clone();
        let report_result = report.result.clone().unwrap_or_default();
        tokio::spawn(async move {
            let task = match store.get_task(&task_id).await {
                Ok(Some(task)) => task,
                Ok(None) => {
                    warn!(task_id = %task_id, "knowledge autodraft skipped: task not found");
                    return;
                }
                Err(e) => {
                    warn!(task_id = %task_id, error = %e, "knowledge autodraft skipped: task load failed");
                    return;
                }
            };
            let (title, content) = summarizer
                .summarize_for_knowledge(&task.details, &report_result)
                .await;
            let text = format!(
                "{}\n\n---\nSource: auto-generated from task {} (report {}).",
                content, task.id, report_id
            );
            let request = CreateDocument {
                title,
                text,
                collection_id,
                parent_document_id: None,
                publish: false,
            };
            match backend.create_document(request).await {
                Ok(doc) => info!(task_id = %task.id, doc_id = %doc.id, "knowledge draft created"),
                Err(e) => warn!(task_id = %task.id, error = %e, "knowledge autodraft failed"),
            }
        });
    }

    // Discussion operations

    /// Post a message to the namespace's discussion log.
    pub async fn post_message(
        &self,
        identity: &Identity,
        content: &str,
    ) -> HubResult<DiscussionMessage> {
        let store = self.store(identity).await?;
        discussion_service::post_message(&store, &identity.hunter_id, content).await
    }

    /// Messages since the caller's read watermark.
    pub async fn unread_messages(&self, identity: &Identity) -> HubResult<Vec<DiscussionMessage>> {
        let store = self.store(identity).await?;
        discussion_service::unread_messages(&store, &identity.hunter_id).await
    }

    /// Newest messages, ascending.
    pub async fn latest_messages(
        &self,
        identity: &Identity,
        limit: Option<i64>,
    ) -> HubResult<Vec<DiscussionMessage>> {
        let store = self.store(identity).await?;
        discussion_service::latest_messages(&store, limit).await
    }

    /// Move the caller's read watermark to now.
    pub async fn mark_discussion_read(&self, identity: &Identity) -> HubResult<()> {
        let store = self.store(identity).await?;
        discussion_service::mark_as_read(&store, &identity.hunter_id).await
    }

    // Knowledge proxies

    /// Create a knowledge document.
    pub async fn knowledge_add(
        &self,
        title: &str,
        content: &str,
        collection_id: Option<String>,
        parent_document_id: Option<String>,
    ) -> HubResult<KnowledgeDoc> {
        let collection_id =
            collection_id.unwrap_or_else(|| self.config.outline.collection_id.clone());
        if collection_id.is_empty() {
            return Err(HubError::Validation(
                "a collection id is required".to_string(),
            ));
        }
        let doc = self
            .backend()?
            .create_document(CreateDocument {
                title: title.to_string(),
                text: content.to_string(),
                collection_id,
                parent_document_id,
                publish: true,
            })
            .await?;
        Ok(doc)
    }

    /// Fetch a knowledge document.
    pub async fn knowledge_get(&self, document_id: &str) -> HubResult<KnowledgeDoc> {
        Ok(self.backend()?.get_document(document_id).await?)
    }

    /// List documents in a collection.
    pub async fn knowledge_list(
        &self,
        collection_id: Option<String>,
        limit: i64,
        offset: i64,
    ) -> HubResult<Vec<KnowledgeDoc>> {
        let collection_id =
            collection_id.unwrap_or_else(|| self.config.outline.collection_id.clone());
        Ok(self
            .backend()?
            .list_documents(&collection_id, limit, offset)
            .await?)
    }

    /// Full-text search across knowledge documents.
    pub async fn knowledge_search(&self, query: &str, limit: i64) -> HubResult<Vec<SearchHit>> {
        Ok(self.backend()?.search(query, limit).await?)
    }

    /// Update a knowledge document.
    pub async fn knowledge_update(
        &self,
        document_id: &str,
        title: Option<String>,
        content: Option<String>,
    ) -> HubResult<KnowledgeDoc> {
        Ok(self
            .backend()?
            .update_document(document_id, title, content)
            .await?)
    }

    /// Delete a knowledge document.
    pub async fn knowledge_delete(&self, document_id: &str) -> HubResult<()> {
        Ok(self.backend()?.delete_document(document_id).await?)
    }

    /// List knowledge collections.
    pub async fn knowledge_collections(&self) -> HubResult<Vec<Collection>> {
        Ok(self.backend()?.list_collections().await?)
    }

    /// Create a knowledge collection.
    pub async fn knowledge_create_collection(
        &self,
        name: &str,
        description: Option<String>,
    ) -> HubResult<Collection> {
        Ok(self.backend()?.create_collection(name, description).await?)
    }

    // System operations

    /// Namespace counters for dashboards.
    pub async fn system_stats(&self, identity: &Identity) -> HubResult<SystemStats> {
        let store = self.store(identity).await?;
        let tasks = store.list_tasks(&TaskFilter::default()).await?;
        let hunters = store.list_hunters().await?;

        let active_hunters = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::InProgress)
            .filter_map(|t| t.hunter_id.as_deref())
            .collect::<std::collections::HashSet<_>>()
            .len();

        Ok(SystemStats {
            total_tasks: tasks.len(),
            pending: tasks.iter().filter(|t| t.status == TaskStatus::Pending).count(),
            in_progress: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::InProgress)
                .count(),
            completed: tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Completed)
                .count(),
            failed: tasks.iter().filter(|t| t.status == TaskStatus::Failed).count(),
            total_hunters: hunters.len(),
            active_hunters,
        })
    }

    /// Run one stale-task sweep across every open namespace.
    pub async fn run_reaper_once(&self) -> HubResult<u64> {
        let mut total = 0u64;
        for namespace in self.registry.namespaces().await {
            let store = self.registry.store_for(&namespace).await?;
            match escalation::escalate_stale_tasks(&store, &self.config.workflow).await {
                Ok(count) => total += count,
                Err(e) => warn!(namespace = %namespace, error = %e, "stale-task sweep failed"),
            }
        }
        Ok(total)
    }

    /// Close every namespace store. Called on shutdown.
    pub async fn close(&self) {
        self.registry.close_all().await;
        info!("hub closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::KnowledgeResult;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn test_hub(dir: &TempDir) -> Taskhub {
        let mut config = TaskhubConfig::default();
        config.storage.data_dir = dir.path().to_path_buf();
        Taskhub::new(config).unwrap()
    }

    fn identity(hunter: &str) -> Identity {
        Identity::new(Some("test-ns"), Some(hunter)).unwrap()
    }

    /// In-memory knowledge backend capturing created documents.
    #[derive(Default)]
    struct FakeBackend {
        docs: Mutex<Vec<KnowledgeDoc>>,
        tags: Vec<String>,
    }

    #[async_trait]
    impl KnowledgeBackend for FakeBackend {
        async fn create_document(&self, request: CreateDocument) -> KnowledgeResult<KnowledgeDoc> {
            let doc = KnowledgeDoc {
                id: format!("doc-{}", self.docs.lock().unwrap().len()),
                title: request.title,
                text: request.text,
                collection_id: Some(request.collection_id),
                tags: vec![],
            };
            self.docs.lock().unwrap().push(doc.clone());
            Ok(doc)
        }

        async fn get_document(&self, document_id: &str) -> KnowledgeResult<KnowledgeDoc> {
            Ok(KnowledgeDoc {
                id: document_id.to_string(),
                title: "stub".to_string(),
                text: String::new(),
                collection_id: None,
                tags: self.tags.clone(),
            })
        }

        async fn list_documents(
            &self,
            _collection_id: &str,
            _limit: i64,
            _offset: i64,
        ) -> KnowledgeResult<Vec<KnowledgeDoc>> {
            Ok(self.docs.lock().unwrap().clone())
        }

        async fn search(&self, _query: &str, _limit: i64) -> KnowledgeResult<Vec<SearchHit>> {
            Ok(vec![])
        }

        async fn update_document(
            &self,
            document_id: &str,
            _title: Option<String>,
            _text: Option<String>,
        ) -> KnowledgeResult<KnowledgeDoc> {
            self.get_document(document_id).await
        }

        async fn delete_document(&self, _document_id: &str) -> KnowledgeResult<()> {
            Ok(())
        }

        async fn list_collections(&self) -> KnowledgeResult<Vec<Collection>> {
            Ok(vec![])
        }

        async fn create_collection(
            &self,
            name: &str,
            description: Option<String>,
        ) -> KnowledgeResult<Collection> {
            Ok(Collection {
                id: "col-1".to_string(),
                name: name.to_string(),
                description,
            })
        }
    }

    #[tokio::test]
    async fn test_operations_are_namespace_scoped() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);

        let team_a = Identity::new(Some("team-a"), Some("h1")).unwrap();
        let team_b = Identity::new(Some("team-b"), Some("h1")).unwrap();
        hub.register_hunter(&team_a, None).await.unwrap();

        // The same hunter id does not exist in the other namespace.
        assert!(matches!(
            hub.get_hunter(&team_b, "h1").await,
            Err(HubError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_study_via_backend_tags() {
        let dir = TempDir::new().unwrap();
        let backend = Arc::new(FakeBackend {
            tags: vec!["rust".to_string()],
            ..Default::default()
        });
        let hub = test_hub(&dir).with_knowledge_backend(backend);

        let id = identity("h4");
        hub.register_hunter(&id, Some([("rust".to_string(), 40)].into_iter().collect()))
            .await
            .unwrap();
        let hunter = hub.study(&id, "knowledge-1").await.unwrap();
        assert_eq!(hunter.skills["rust"], 45);
    }

    #[tokio::test]
    async fn test_study_without_backend_is_external_error() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let id = identity("h1");
        hub.register_hunter(&id, None).await.unwrap();
        assert!(matches!(
            hub.study(&id, "knowledge-1").await,
            Err(HubError::External(_))
        ));
    }

    #[tokio::test]
    async fn test_system_stats_counts() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let publisher = identity("pub");
        let worker = identity("worker");
        hub.register_hunter(&publisher, Some([("python".to_string(), 50)].into_iter().collect()))
            .await
            .unwrap();
        hub.register_hunter(&worker, Some([("python".to_string(), 10)].into_iter().collect()))
            .await
            .unwrap();

        let task = hub
            .publish_task(
                &publisher,
                PublishTaskParams {
                    name: "t".to_string(),
                    details: "d".to_string(),
                    required_skill: "python".to_string(),
                    depends_on: vec![],
                    task_type: TaskType::Normal,
                },
            )
            .await
            .unwrap();
        hub.claim_task(&worker, &task.id).await.unwrap();
        hub.start_task(&worker, &task.id).await.unwrap();

        let stats = hub.system_stats(&publisher).await.unwrap();
        assert_eq!(stats.total_tasks, 1);
        assert_eq!(stats.in_progress, 1);
        assert_eq!(stats.total_hunters, 2);
        assert_eq!(stats.active_hunters, 1);
    }

    #[tokio::test]
    async fn test_reaper_runs_across_open_namespaces() {
        let dir = TempDir::new().unwrap();
        let hub = test_hub(&dir);
        let id = identity("h1");
        hub.register_hunter(&id, None).await.unwrap();
        assert_eq!(hub.run_reaper_once().await.unwrap(), 0);
    }
}
