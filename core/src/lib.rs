// Taskhub: multi-tenant coordination service for autonomous agents
// Core library providing the task lifecycle engine, per-namespace stores,
// evaluation workflow, and external knowledge adapters

pub mod config;
pub mod discussion;
pub mod discussion_service;
pub mod errors;
pub mod escalation;
pub mod hub;
pub mod hunter;
pub mod hunter_service;
pub mod ids;
pub mod knowledge;
pub mod llm;
pub mod registry;
pub mod report;
pub mod report_service;
pub mod store;
pub mod task;
pub mod task_service;

// Re-export commonly used types
pub use errors::{
    HubError, HubResult, KnowledgeError, KnowledgeResult, StoreError, StoreResult,
};

pub use config::{
    EvaluationSpawnMode, FeaturesConfig, LlmConfig, LoggingConfig, OutlineConfig, ServerConfig,
    StorageConfig, TaskhubConfig, WorkflowConfig,
};

pub use discussion::DiscussionMessage;
pub use hunter::{Hunter, HunterStatus, SKILL_MAX, STUDY_SKILL_GAIN};
pub use report::{Report, ReportEvaluation, ReportStatus};
pub use task::{Task, TaskEvaluation, TaskStatus, TaskType, SYSTEM_PUBLISHER};

pub use hub::{
    CompleteTaskParams, EvaluateReportParams, PublishTaskParams, SubmitReportParams, SystemStats,
    Taskhub,
};

pub use escalation::{escalate_stale_tasks, spawn_reaper};
pub use ids::generate_id;
pub use knowledge::{
    Collection, CreateDocument, KnowledgeBackend, KnowledgeDoc, OutlineClient, SearchHit,
};
pub use llm::{LlmSummarizer, KNOWLEDGE_FAILED_TITLE};
pub use registry::{validate_namespace, Identity, StoreRegistry};
pub use store::{ReportFilter, SqliteStore, StoreTx, TaskFilter};
