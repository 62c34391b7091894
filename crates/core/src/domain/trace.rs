use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::domain::customer::CustomerId;
use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TurnId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToolResultStatus {
    Ok,
    Recoverable,
    Failed,
}

impl ToolResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Recoverable => "recoverable",
            Self::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ok" => Some(Self::Ok),
            "recoverable" => Some(Self::Recoverable),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One tool invocation inside a turn, in execution order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallTrace {
    pub sequence: u32,
    pub tool_name: String,
    pub arguments: serde_json::Value,
    pub result_status: ToolResultStatus,
    pub result_summary: String,
    pub latency_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnOutcome {
    Reply(String),
    BudgetExhausted,
    Aborted(String),
}

impl TurnOutcome {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Reply(_) => "reply",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Aborted(_) => "aborted",
        }
    }
}

/// Full record of one think/act loop: every planner decision and tool call
/// between an inbound message and the reply sent back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnTrace {
    pub id: TurnId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub inbound_message: String,
    pub tool_calls: Vec<ToolCallTrace>,
    pub planner_latency_ms: u64,
    pub outcome: TurnOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Destination for turn traces. Recording is observability, never control
/// flow: implementations must not fail the turn.
pub trait TraceSink: Send + Sync {
    fn record(&self, trace: TurnTrace);
}

#[derive(Clone, Default)]
pub struct InMemoryTraceSink {
    traces: Arc<Mutex<Vec<TurnTrace>>>,
}

impl InMemoryTraceSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> Vec<TurnTrace> {
        self.traces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl TraceSink for InMemoryTraceSink {
    fn record(&self, trace: TurnTrace) {
        self.traces
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(trace);
    }
}
