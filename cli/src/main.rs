/// Taskhub CLI - command-line client for the coordination daemon
use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

mod rpc;

use rpc::RpcClient;

#[derive(Parser)]
#[command(name = "taskhub")]
#[command(about = "Multi-tenant task coordination for autonomous agents", long_about = None)]
#[command(version)]
struct Args {
    /// Daemon base URL
    #[arg(long, default_value = "http://127.0.0.1:8080", env = "TASKHUB_SERVER")]
    server: String,

    /// Namespace to act in
    #[arg(short, long, env = "TASKHUB_NAMESPACE")]
    namespace: Option<String>,

    /// Acting hunter identity
    #[arg(short = 'i', long, env = "TASKHUB_HUNTER_ID")]
    hunter_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the acting hunter, optionally with skills (name=level)
    Register {
        /// Skills as name=level pairs, e.g. python=50
        #[arg(short, long)]
        skill: Vec<String>,
    },

    /// Publish a task
    Publish {
        /// Task name
        name: String,

        /// Detailed instructions
        #[arg(short, long, default_value = "")]
        details: String,

        /// Skill a claimant must hold
        #[arg(short, long)]
        required_skill: String,

        /// Task IDs this task depends on
        #[arg(long)]
        depends_on: Vec<String>,

        /// Task type (NORMAL, EVALUATION, RESEARCH)
        #[arg(short, long, default_value = "NORMAL")]
        task_type: String,
    },

    /// Claim a pending task
    Claim {
        /// Task ID
        task_id: String,
    },

    /// Start a claimed task
    Start {
        /// Task ID
        task_id: String,
    },

    /// Finish an in-progress task
    Complete {
        /// Task ID
        task_id: String,

        /// Result payload
        #[arg(short, long)]
        result: Option<String>,

        /// Final status (completed or failed)
        #[arg(short, long, default_value = "completed")]
        status: String,
    },

    /// List tasks, optionally filtered
    Tasks {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by required skill
        #[arg(short, long)]
        required_skill: Option<String>,

        /// Filter by claimant
        #[arg(long)]
        hunter: Option<String>,
    },

    /// Archive a terminal task
    Archive {
        /// Task ID
        task_id: String,
    },

    /// Delete a task
    Delete {
        /// Task ID
        task_id: String,

        /// Delete even if claimed
        #[arg(short, long)]
        force: bool,
    },

    /// Submit a report for a held task
    Report {
        /// Task ID
        task_id: String,

        /// Outcome (completed or failed)
        #[arg(short, long, default_value = "completed")]
        status: String,

        /// Result payload
        #[arg(short, long)]
        result: Option<String>,

        /// Additional notes
        #[arg(short, long)]
        details: Option<String>,
    },

    /// Evaluate a report
    Evaluate {
        /// Report ID
        report_id: String,

        /// Score in [0, 100]
        #[arg(short, long)]
        score: i64,

        /// Feedback text
        #[arg(short, long, default_value = "")]
        feedback: String,

        /// Skill deltas as name=delta pairs, e.g. python=3
        #[arg(long)]
        skill: Vec<String>,
    },

    /// List reports, optionally filtered
    Reports {
        /// Filter by task
        #[arg(short, long)]
        task: Option<String>,

        /// Filter by submitter
        #[arg(long)]
        hunter: Option<String>,
    },

    /// Post a discussion message
    Post {
        /// Message content
        content: String,
    },

    /// Show unread discussion messages and move the watermark
    Unread {
        /// Keep the watermark where it is
        #[arg(long)]
        keep_unread: bool,
    },

    /// List registered hunters
    Hunters,

    /// Study a knowledge item
    Study {
        /// Knowledge document ID
        knowledge_id: String,
    },

    /// Search the knowledge base
    Search {
        /// Query text
        query: String,

        /// Maximum hits
        #[arg(short, long, default_value_t = 10)]
        limit: i64,
    },

    /// Show namespace statistics
    Stats,
}

/// Parse repeated `name=value` pairs into a JSON object.
fn parse_pairs(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut map = Map::new();
    for pair in pairs {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("expected name=value, got {:?}", pair))?;
        let value: i64 = value
            .parse()
            .map_err(|_| anyhow::anyhow!("expected an integer in {:?}", pair))?;
        map.insert(name.to_string(), json!(value));
    }
    Ok(map)
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let client = RpcClient::new(&args.server, args.namespace.clone(), args.hunter_id.clone())?;

    let result = match &args.command {
        Commands::Register { skill } => {
            let skills = parse_pairs(skill)?;
            client
                .call("hunter.register", json!({ "skills": skills }))
                .await?
        }
        Commands::Publish {
            name,
            details,
            required_skill,
            depends_on,
            task_type,
        } => {
            client
                .call(
                    "task.publish",
                    json!({
                        "name": name,
                        "details": details,
                        "required_skill": required_skill,
                        "depends_on": depends_on,
                        "task_type": task_type,
                    }),
                )
                .await?
        }
        Commands::Claim { task_id } => {
            client.call("task.claim", json!({ "task_id": task_id })).await?
        }
        Commands::Start { task_id } => {
            client.call("task.start", json!({ "task_id": task_id })).await?
        }
        Commands::Complete {
            task_id,
            result,
            status,
        } => {
            client
                .call(
                    "task.complete",
                    json!({
                        "task_id": task_id,
                        "result": result,
                        "final_status": status,
                    }),
                )
                .await?
        }
        Commands::Tasks {
            status,
            required_skill,
            hunter,
        } => {
            client
                .call(
                    "task.list",
                    json!({
                        "status": status,
                        "required_skill": required_skill,
                        "hunter_id": hunter,
                    }),
                )
                .await?
        }
        Commands::Archive { task_id } => {
            client
                .call("task.archive", json!({ "task_id": task_id }))
                .await?
        }
        Commands::Delete { task_id, force } => {
            client
                .call("task.delete", json!({ "task_id": task_id, "force": force }))
                .await?
        }
        Commands::Report {
            task_id,
            status,
            result,
            details,
        } => {
            client
                .call(
                    "report.submit",
                    json!({
                        "task_id": task_id,
                        "status": status,
                        "result": result,
                        "details": details,
                    }),
                )
                .await?
        }
        Commands::Evaluate {
            report_id,
            score,
            feedback,
            skill,
        } => {
            let skill_updates = parse_pairs(skill)?;
            client
                .call(
                    "report.evaluate",
                    json!({
                        "report_id": report_id,
                        "score": score,
                        "feedback": feedback,
                        "skill_updates": skill_updates,
                    }),
                )
                .await?
        }
        Commands::Reports { task, hunter } => {
            client
                .call(
                    "report.list",
                    json!({ "task_id": task, "hunter_id": hunter }),
                )
                .await?
        }
        Commands::Post { content } => {
            client
                .call("discussion.post", json!({ "content": content }))
                .await?
        }
        Commands::Unread { keep_unread } => {
            let messages = client.call("discussion.unread", json!({})).await?;
            if !keep_unread {
                client.call("discussion.mark_read", json!({})).await?;
            }
            messages
        }
        Commands::Hunters => client.call("hunter.list", json!({})).await?,
        Commands::Study { knowledge_id } => {
            client
                .call("hunter.study", json!({ "knowledge_id": knowledge_id }))
                .await?
        }
        Commands::Search { query, limit } => {
            client
                .call(
                    "knowledge.search",
                    json!({ "query": query, "limit": limit }),
                )
                .await?
        }
        Commands::Stats => client.call("system.stats", json!({})).await?,
    };

    print_json(&result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pairs() {
        let parsed = parse_pairs(&["python=50".to_string(), "review=7".to_string()]).unwrap();
        assert_eq!(parsed["python"], json!(50));
        assert_eq!(parsed["review"], json!(7));
    }

    #[test]
    fn test_parse_pairs_rejects_bad_input() {
        assert!(parse_pairs(&["python".to_string()]).is_err());
        assert!(parse_pairs(&["python=a lot".to_string()]).is_err());
    }
}
