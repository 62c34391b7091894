use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use crate::tools::ToolRequest;

/// What the planner saw so far this turn, oldest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TranscriptEntry {
    Customer(String),
    ToolCall { name: String, arguments: serde_json::Value },
    ToolResult { name: String, payload: serde_json::Value },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlannerDecision {
    Call(ToolRequest),
    Reply(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PlannerError {
    #[error("planner did not answer in time")]
    Timeout,
    #[error("planner unavailable: {0}")]
    Unavailable(String),
    #[error("planner produced an unusable decision: {0}")]
    Malformed(String),
}

/// The reasoning seam. Implementations translate the prompt into the next
/// decision and nothing more; domain rules stay on this side of the trait.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, prompt: &str) -> Result<PlannerDecision, PlannerError>;
}

/// Deterministic planner for tests: replays a fixed script of decisions.
#[derive(Default)]
pub struct ScriptedPlanner {
    script: Mutex<VecDeque<Result<PlannerDecision, PlannerError>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedPlanner {
    pub fn new(decisions: Vec<PlannerDecision>) -> Self {
        Self {
            script: Mutex::new(decisions.into_iter().map(Ok).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(script: Vec<Result<PlannerDecision, PlannerError>>) -> Self {
        Self { script: Mutex::new(script.into()), prompts: Mutex::new(Vec::new()) }
    }

    /// Prompts observed so far, for asserting what the planner was shown.
    pub fn seen_prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl Planner for ScriptedPlanner {
    async fn plan(&self, prompt: &str) -> Result<PlannerDecision, PlannerError> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_owned());
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
            .unwrap_or_else(|| {
                Err(PlannerError::Malformed("scripted planner ran out of decisions".to_owned()))
            })
    }
}
