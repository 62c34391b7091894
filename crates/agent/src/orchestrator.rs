use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use vendy_core::domain::customer::{Customer, CustomerId};
use vendy_core::domain::tenant::Tenant;
use vendy_core::domain::trace::{
    ToolCallTrace, ToolResultStatus, TurnId, TurnOutcome, TurnTrace,
};
use vendy_db::repositories::{CustomerRepository, RepositoryError, TenantRepository};

use crate::cart::CartStore;
use crate::gateway::CatalogGateway;
use crate::llm::{Planner, PlannerDecision, PlannerError, TranscriptEntry};
use crate::prompt::render_prompt;
use crate::recorder::TurnRecorder;
use crate::tools::{build_registry, ToolError, ToolRequest};

/// One inbound customer message, as the channel layer hands it over.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    /// Routing key for tenant resolution.
    pub whatsapp_number_id: String,
    pub customer_phone: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No tenant is registered for the inbound phone number id. The message
    /// cannot be answered because there is nobody to answer as.
    #[error("no tenant registered for whatsapp number {0}")]
    UnknownTenant(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Per-turn budgets. Derived from configuration at bootstrap.
#[derive(Clone, Copy, Debug)]
pub struct TurnLimits {
    pub max_tool_rounds: u32,
    pub tool_timeout: Duration,
    pub planner_timeout: Duration,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            max_tool_rounds: 6,
            tool_timeout: Duration::from_secs(10),
            planner_timeout: Duration::from_secs(30),
        }
    }
}

const FALLBACK_REPLY: &str =
    "Sorry, something went wrong on our side. Please send that again in a moment.";
const BUDGET_REPLY: &str =
    "I could not finish that request just now. Could you say it again, maybe in smaller steps?";

/// Drives one turn per inbound message: resolve the tenant and customer,
/// then alternate planner decisions and tool executions until the planner
/// replies or a budget runs out. A known tenant always gets a reply back,
/// even when the turn aborts.
pub struct TurnOrchestrator {
    tenants: Arc<dyn TenantRepository>,
    customers: Arc<dyn CustomerRepository>,
    gateway: Arc<CatalogGateway>,
    cart: Arc<CartStore>,
    planner: Arc<dyn Planner>,
    recorder: Arc<TurnRecorder>,
    limits: TurnLimits,
}

impl TurnOrchestrator {
    pub fn new(
        tenants: Arc<dyn TenantRepository>,
        customers: Arc<dyn CustomerRepository>,
        gateway: Arc<CatalogGateway>,
        cart: Arc<CartStore>,
        planner: Arc<dyn Planner>,
        recorder: Arc<TurnRecorder>,
        limits: TurnLimits,
    ) -> Self {
        Self { tenants, customers, gateway, cart, planner, recorder, limits }
    }

    pub async fn handle(&self, message: InboundMessage) -> Result<TurnReply, OrchestratorError> {
        self.handle_cancellable(message, &AtomicBool::new(false)).await
    }

    /// Like `handle`, but stops issuing planner round-trips once `abandoned`
    /// is set. An in-flight tool call still runs to completion so storage is
    /// never left mid-mutation.
    pub async fn handle_cancellable(
        &self,
        message: InboundMessage,
        abandoned: &AtomicBool,
    ) -> Result<TurnReply, OrchestratorError> {
        let tenant = self
            .tenants
            .find_by_whatsapp_number(&message.whatsapp_number_id)
            .await?
            .ok_or_else(|| OrchestratorError::UnknownTenant(message.whatsapp_number_id.clone()))?;

        let customer_id = CustomerId(message.customer_phone.clone());
        self.ensure_customer(&tenant, &customer_id).await?;

        let started_at = Utc::now();
        let mut transcript = vec![TranscriptEntry::Customer(message.text.clone())];
        let registry = build_registry(
            self.gateway.clone(),
            self.cart.clone(),
            tenant.id.clone(),
            customer_id.clone(),
        );

        let mut tool_calls: Vec<ToolCallTrace> = Vec::new();
        let mut planner_latency_ms: u64 = 0;
        let mut outcome: Option<TurnOutcome> = None;

        for _round in 0..self.limits.max_tool_rounds {
            if abandoned.load(Ordering::Relaxed) {
                info!(
                    event_name = "turn_abandoned",
                    tenant_id = %tenant.id.0,
                    "conversation abandoned, stopping planner round-trips"
                );
                outcome = Some(TurnOutcome::Aborted("conversation abandoned".to_owned()));
                break;
            }

            let prompt = render_prompt(&tenant, &registry.specs(), &transcript);

            let planner_started = Instant::now();
            let decision =
                tokio::time::timeout(self.limits.planner_timeout, self.planner.plan(&prompt))
                    .await
                    .unwrap_or(Err(PlannerError::Timeout));
            planner_latency_ms += planner_started.elapsed().as_millis() as u64;

            let request = match decision {
                Ok(PlannerDecision::Reply(text)) => {
                    outcome = Some(TurnOutcome::Reply(text));
                    break;
                }
                Ok(PlannerDecision::Call(request)) => request,
                Err(error) => {
                    warn!(
                        event_name = "planner_failed",
                        tenant_id = %tenant.id.0,
                        error = %error,
                        "turn aborted on planner failure"
                    );
                    outcome = Some(TurnOutcome::Aborted(error.to_string()));
                    break;
                }
            };

            let (trace, result) = self.execute_tool(&registry, &request, tool_calls.len()).await;
            let failed = trace.result_status == ToolResultStatus::Failed;
            tool_calls.push(trace);

            match result {
                Ok(payload) => {
                    transcript.push(TranscriptEntry::ToolCall {
                        name: request.name.clone(),
                        arguments: request.arguments.clone(),
                    });
                    transcript
                        .push(TranscriptEntry::ToolResult { name: request.name, payload });
                }
                Err(message) if !failed => {
                    // Recoverable: the planner gets to see what went wrong
                    // and try something else within the same turn.
                    transcript.push(TranscriptEntry::ToolCall {
                        name: request.name.clone(),
                        arguments: request.arguments.clone(),
                    });
                    transcript.push(TranscriptEntry::ToolResult {
                        name: request.name,
                        payload: serde_json::json!({ "error": message }),
                    });
                }
                Err(message) => {
                    warn!(
                        event_name = "tool_failed",
                        tenant_id = %tenant.id.0,
                        tool = %request.name,
                        error = %message,
                        "turn aborted on tool failure"
                    );
                    outcome = Some(TurnOutcome::Aborted(message));
                    break;
                }
            }
        }

        let outcome = outcome.unwrap_or(TurnOutcome::BudgetExhausted);
        let reply = match &outcome {
            TurnOutcome::Reply(text) => text.clone(),
            TurnOutcome::BudgetExhausted => BUDGET_REPLY.to_owned(),
            TurnOutcome::Aborted(_) => FALLBACK_REPLY.to_owned(),
        };

        info!(
            event_name = "turn_completed",
            tenant_id = %tenant.id.0,
            customer_id = %customer_id.0,
            outcome = outcome.kind(),
            tool_calls = tool_calls.len(),
            "turn finished"
        );

        self.recorder
            .record(TurnTrace {
                id: TurnId(Uuid::new_v4().to_string()),
                tenant_id: tenant.id.clone(),
                customer_id,
                inbound_message: message.text,
                tool_calls,
                planner_latency_ms,
                outcome,
                started_at,
                completed_at: Utc::now(),
            })
            .await;

        Ok(TurnReply { text: reply })
    }

    async fn ensure_customer(
        &self,
        tenant: &Tenant,
        customer_id: &CustomerId,
    ) -> Result<(), RepositoryError> {
        if self.customers.find(&tenant.id, customer_id).await?.is_none() {
            self.customers
                .save(
                    &tenant.id,
                    Customer { id: customer_id.clone(), name: None, address: None },
                )
                .await?;
        }
        Ok(())
    }

    async fn execute_tool(
        &self,
        registry: &crate::tools::ToolRegistry,
        request: &ToolRequest,
        sequence: usize,
    ) -> (ToolCallTrace, Result<serde_json::Value, String>) {
        let started = Instant::now();
        let dispatched =
            tokio::time::timeout(self.limits.tool_timeout, registry.dispatch(request)).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (status, summary, result) = match dispatched {
            Ok(Ok(payload)) => {
                (ToolResultStatus::Ok, summarize(&payload), Ok(payload))
            }
            Ok(Err(ToolError::Recoverable(message))) => {
                (ToolResultStatus::Recoverable, message.clone(), Err(message))
            }
            Ok(Err(ToolError::Failed(message))) => {
                (ToolResultStatus::Failed, message.clone(), Err(message))
            }
            Err(_elapsed) => {
                let message = format!("tool `{}` timed out", request.name);
                (ToolResultStatus::Failed, message.clone(), Err(message))
            }
        };

        let trace = ToolCallTrace {
            sequence: sequence as u32,
            tool_name: request.name.clone(),
            arguments: request.arguments.clone(),
            result_status: status,
            result_summary: summary,
            latency_ms,
        };
        (trace, result)
    }
}

fn summarize(payload: &serde_json::Value) -> String {
    let mut rendered = payload.to_string();
    if rendered.len() > 200 {
        let cut = rendered
            .char_indices()
            .take_while(|(index, _)| *index < 200)
            .last()
            .map(|(index, c)| index + c.len_utf8())
            .unwrap_or(0);
        rendered.truncate(cut);
        rendered.push_str("...");
    }
    rendered
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use serde_json::json;

    use vendy_core::catalog::{CatalogMatcher, DefaultMentionHeuristic};
    use vendy_core::domain::product::{Availability, Product, ProductId};
    use vendy_core::domain::tenant::{Tenant, TenantId};
    use vendy_core::domain::trace::{InMemoryTraceSink, ToolResultStatus, TurnOutcome};
    use vendy_db::repositories::{
        CustomerRepository, InMemoryCartRepository, InMemoryCustomerRepository,
        InMemoryEscalationRepository, InMemoryProductRepository, InMemoryTenantRepository,
        InMemoryTraceRepository, ProductRepository, TenantRepository,
    };

    use super::{InboundMessage, OrchestratorError, TurnLimits, TurnOrchestrator};
    use crate::cart::CartStore;
    use crate::flywheel::RecordingNotifier;
    use crate::gateway::CatalogGateway;
    use crate::llm::{PlannerDecision, PlannerError, ScriptedPlanner};
    use crate::recorder::TurnRecorder;
    use crate::tools::ToolRequest;

    struct Fixture {
        orchestrator: TurnOrchestrator,
        customers: Arc<InMemoryCustomerRepository>,
        sink: Arc<InMemoryTraceSink>,
    }

    async fn fixture(planner: ScriptedPlanner, limits: TurnLimits) -> Fixture {
        let tenants = Arc::new(InMemoryTenantRepository::new());
        tenants
            .save(Tenant {
                id: TenantId("t-1".to_string()),
                name: "La Lonchera".to_string(),
                whatsapp_number_id: "wa-123".to_string(),
                business_type: "sandwich shop".to_string(),
                personality: "Warm and brief.".to_string(),
            })
            .await
            .expect("seed tenant");

        let products = InMemoryProductRepository::new();
        for (id, sku, name, price, availability) in [
            ("p-1", "SND-01", "Sandwich", Some(Decimal::new(500, 2)), Availability::Confirmed),
            ("p-oos", "HRC-01", "Horchata", Some(Decimal::new(300, 2)), Availability::OutOfStock),
        ] {
            products
                .save(Product {
                    id: ProductId(id.to_string()),
                    tenant_id: TenantId("t-1".to_string()),
                    sku: sku.to_string(),
                    name: name.to_string(),
                    description: None,
                    price,
                    unit: "piece".to_string(),
                    availability,
                })
                .await
                .expect("seed product");
        }

        let escalations = InMemoryEscalationRepository::new(products.clone());
        let gateway = Arc::new(CatalogGateway::new(
            Arc::new(products.clone()),
            Arc::new(escalations),
            CatalogMatcher::default(),
            Arc::new(DefaultMentionHeuristic),
            Arc::new(RecordingNotifier::default()),
        ));
        let cart = Arc::new(CartStore::new(
            Arc::new(InMemoryCartRepository::new()),
            Arc::new(products),
        ));

        let customers = Arc::new(InMemoryCustomerRepository::new());
        let sink = Arc::new(InMemoryTraceSink::new());
        let recorder = Arc::new(
            TurnRecorder::new(Arc::new(InMemoryTraceRepository::new()))
                .with_observer(sink.clone()),
        );

        let orchestrator = TurnOrchestrator::new(
            tenants,
            customers.clone(),
            gateway,
            cart,
            Arc::new(planner),
            recorder,
            limits,
        );
        Fixture { orchestrator, customers, sink }
    }

    fn inbound(text: &str) -> InboundMessage {
        InboundMessage {
            whatsapp_number_id: "wa-123".to_string(),
            customer_phone: "5215550001".to_string(),
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn search_add_reply_happy_path() {
        let planner = ScriptedPlanner::new(vec![
            PlannerDecision::Call(ToolRequest::new(
                "search_product",
                json!({"query": "sandwich"}),
            )),
            PlannerDecision::Call(ToolRequest::new(
                "add_to_cart",
                json!({"product_id": "p-1", "quantity": 2}),
            )),
            PlannerDecision::Reply("Two sandwiches, that is $10.00. Anything else?".to_string()),
        ]);
        let fixture = fixture(planner, TurnLimits::default()).await;

        let reply = fixture
            .orchestrator
            .handle(inbound("two sandwiches please"))
            .await
            .expect("turn");
        assert!(reply.text.contains("$10.00"));

        let traces = fixture.sink.traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].tool_calls.len(), 2);
        assert_eq!(traces[0].tool_calls[0].tool_name, "search_product");
        assert_eq!(traces[0].tool_calls[1].tool_name, "add_to_cart");
        assert!(matches!(traces[0].outcome, TurnOutcome::Reply(_)));
    }

    #[tokio::test]
    async fn first_contact_registers_the_customer() {
        let planner = ScriptedPlanner::new(vec![PlannerDecision::Reply("Hola!".to_string())]);
        let fixture = fixture(planner, TurnLimits::default()).await;

        fixture.orchestrator.handle(inbound("hola")).await.expect("turn");

        let customer = fixture
            .customers
            .find(
                &TenantId("t-1".to_string()),
                &vendy_core::domain::customer::CustomerId("5215550001".to_string()),
            )
            .await
            .expect("lookup")
            .expect("registered");
        assert_eq!(customer.id.0, "5215550001");
    }

    #[tokio::test]
    async fn unknown_tenant_is_an_error() {
        let planner = ScriptedPlanner::new(vec![]);
        let fixture = fixture(planner, TurnLimits::default()).await;

        let error = fixture
            .orchestrator
            .handle(InboundMessage {
                whatsapp_number_id: "wa-unknown".to_string(),
                customer_phone: "5215550001".to_string(),
                text: "hola".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(error, OrchestratorError::UnknownTenant(_)));
    }

    #[tokio::test]
    async fn recoverable_tool_error_is_fed_back_to_the_planner() {
        let planner = ScriptedPlanner::new(vec![
            PlannerDecision::Call(ToolRequest::new(
                "add_to_cart",
                json!({"product_id": "p-404", "quantity": 1}),
            )),
            PlannerDecision::Reply("I could not find that one.".to_string()),
        ]);
        let fixture = fixture(planner, TurnLimits::default()).await;

        let reply = fixture.orchestrator.handle(inbound("add the mystery item")).await.expect("turn");
        assert_eq!(reply.text, "I could not find that one.");

        let traces = fixture.sink.traces();
        assert_eq!(traces[0].tool_calls.len(), 1);
        assert_eq!(traces[0].tool_calls[0].result_status, ToolResultStatus::Recoverable);
        assert!(matches!(traces[0].outcome, TurnOutcome::Reply(_)));
    }

    #[tokio::test]
    async fn out_of_stock_add_continues_and_shapes_the_reply() {
        let planner = ScriptedPlanner::new(vec![
            PlannerDecision::Call(ToolRequest::new(
                "add_to_cart",
                json!({"product_id": "p-oos", "quantity": 1}),
            )),
            PlannerDecision::Reply("Horchata is out of stock today, sorry.".to_string()),
        ]);
        let fixture = fixture(planner, TurnLimits::default()).await;

        let reply = fixture.orchestrator.handle(inbound("una horchata")).await.expect("turn");
        assert!(reply.text.contains("out of stock"));

        let traces = fixture.sink.traces();
        assert_eq!(traces[0].tool_calls[0].result_status, ToolResultStatus::Recoverable);
        assert!(traces[0].tool_calls[0].result_summary.contains("not purchasable"));
        assert!(matches!(traces[0].outcome, TurnOutcome::Reply(_)));
    }

    #[tokio::test]
    async fn budget_exhaustion_returns_the_canned_reply() {
        let planner = ScriptedPlanner::new(vec![
            PlannerDecision::Call(ToolRequest::new("view_cart", json!({}))),
            PlannerDecision::Call(ToolRequest::new("view_cart", json!({}))),
            PlannerDecision::Call(ToolRequest::new("view_cart", json!({}))),
        ]);
        let limits = TurnLimits { max_tool_rounds: 2, ..TurnLimits::default() };
        let fixture = fixture(planner, limits).await;

        let reply = fixture.orchestrator.handle(inbound("hmm")).await.expect("turn");
        assert_eq!(reply.text, super::BUDGET_REPLY);

        let traces = fixture.sink.traces();
        assert_eq!(traces[0].tool_calls.len(), 2);
        assert_eq!(traces[0].outcome, TurnOutcome::BudgetExhausted);
    }

    #[tokio::test]
    async fn abandoned_turn_skips_planner_round_trips() {
        let planner = ScriptedPlanner::new(vec![PlannerDecision::Reply("hola".to_string())]);
        let fixture = fixture(planner, TurnLimits::default()).await;

        let abandoned = std::sync::atomic::AtomicBool::new(true);
        let reply = fixture
            .orchestrator
            .handle_cancellable(inbound("hola"), &abandoned)
            .await
            .expect("turn");
        assert_eq!(reply.text, super::FALLBACK_REPLY);

        let traces = fixture.sink.traces();
        assert!(traces[0].tool_calls.is_empty());
        assert!(matches!(traces[0].outcome, TurnOutcome::Aborted(_)));
    }

    #[tokio::test]
    async fn planner_failure_aborts_with_the_fallback_reply() {
        let planner = ScriptedPlanner::with_script(vec![Err(PlannerError::Unavailable(
            "connection refused".to_string(),
        ))]);
        let fixture = fixture(planner, TurnLimits::default()).await;

        let reply = fixture.orchestrator.handle(inbound("hola")).await.expect("turn");
        assert_eq!(reply.text, super::FALLBACK_REPLY);

        let traces = fixture.sink.traces();
        assert!(matches!(traces[0].outcome, TurnOutcome::Aborted(_)));
    }
}
