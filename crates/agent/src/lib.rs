//! Conversation runtime for the multi-tenant sales agent.
//!
//! Each inbound customer message runs one constrained think/act loop:
//! 1. **Planning** (`llm`) - the planner proposes the next tool call or the
//!    final reply. It is strictly a translator; it never touches storage.
//! 2. **Tool execution** (`tools`) - a per-turn registry bound to the
//!    resolved tenant and customer dispatches into the catalog gateway and
//!    the cart store.
//! 3. **Recording** (`recorder`) - the full turn, every tool call included,
//!    is persisted for later inspection. Recording never fails the turn.
//!
//! All commercial decisions (what is purchasable, what a cart totals to,
//! when to escalate to the owner) are deterministic domain logic. The
//! planner only chooses which operation to attempt next.

pub mod cart;
pub mod flywheel;
pub mod gateway;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod recorder;
pub mod tools;

pub use cart::{CartError, CartStore};
pub use flywheel::{
    EscalationNotifier, Flywheel, FlywheelError, RecordingNotifier, TracingNotifier,
};
pub use gateway::{AvailabilitySignal, CatalogGateway, GatewayError, ProductReport, SearchOutcome};
pub use llm::{Planner, PlannerDecision, PlannerError, ScriptedPlanner, TranscriptEntry};
pub use orchestrator::{
    InboundMessage, OrchestratorError, TurnLimits, TurnOrchestrator, TurnReply,
};
pub use recorder::TurnRecorder;
pub use tools::{build_registry, ToolCall, ToolError, ToolRegistry, ToolRequest, ToolSpec};
