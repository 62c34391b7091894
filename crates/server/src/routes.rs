//! HTTP surface:
//! - `GET  /webhook`                        — Meta verification handshake
//! - `POST /webhook`                        — signed message deliveries
//! - `POST /management/inventory-decision`  — owner decision for an escalation
//! - `POST /management/catalog/{tenant_id}` — CSV catalog ingestion
//! - `GET  /products/{tenant_id}`           — catalog listing

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use vendy_agent::{Flywheel, FlywheelError, InboundMessage, OrchestratorError, TurnOrchestrator};
use vendy_core::domain::escalation::{EscalationDecision, EscalationId, ResolutionOutcome};
use vendy_core::domain::tenant::TenantId;
use vendy_core::errors::DomainError;
use vendy_db::repositories::ProductRepository;
use vendy_db::{ingest_catalog_csv, IngestError};
use vendy_whatsapp::{parse_webhook, verify_signature, MessageSender};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<TurnOrchestrator>,
    pub flywheel: Arc<Flywheel>,
    pub products: Arc<dyn ProductRepository>,
    pub sender: Arc<dyn MessageSender>,
    pub verify_token: SecretString,
    pub app_secret: SecretString,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify_webhook).post(receive_webhook))
        .route("/management/inventory-decision", post(inventory_decision))
        .route("/management/catalog/{tenant_id}", post(ingest_catalog))
        .route("/products/{tenant_id}", get(list_products))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    (status, Json(ErrorResponse { error: message.into() })).into_response()
}

async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    let mode = params.get("hub.mode").map(String::as_str);
    let token = params.get("hub.verify_token").map(String::as_str);
    let challenge = params.get("hub.challenge");

    if mode == Some("subscribe")
        && token == Some(state.verify_token.expose_secret())
        && challenge.is_some()
    {
        info!(event_name = "webhook_verified", "verification handshake accepted");
        return (StatusCode::OK, challenge.cloned().unwrap_or_default()).into_response();
    }
    warn!(event_name = "webhook_verification_rejected", "verification handshake rejected");
    error_response(StatusCode::FORBIDDEN, "verification failed")
}

async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> axum::response::Response {
    let signature = headers
        .get("x-hub-signature-256")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if verify_signature(state.app_secret.expose_secret(), &body, signature).is_err() {
        warn!(event_name = "webhook_signature_rejected", "dropping unsigned delivery");
        return error_response(StatusCode::UNAUTHORIZED, "invalid signature");
    }

    let messages = match parse_webhook(&body) {
        Ok(messages) => messages,
        Err(parse_error) => {
            warn!(
                event_name = "webhook_payload_rejected",
                error = %parse_error,
                "dropping unparseable delivery"
            );
            return error_response(StatusCode::BAD_REQUEST, parse_error.to_string());
        }
    };

    // Meta retries non-2xx deliveries, so per-message failures are logged
    // and the delivery as a whole is acknowledged.
    for message in messages {
        let turn = state
            .orchestrator
            .handle(InboundMessage {
                whatsapp_number_id: message.phone_number_id.clone(),
                customer_phone: message.from.clone(),
                text: message.text,
            })
            .await;

        match turn {
            Ok(reply) => {
                if let Err(send_error) = state
                    .sender
                    .send_text(&message.phone_number_id, &message.from, &reply.text)
                    .await
                {
                    error!(
                        event_name = "reply_send_failed",
                        to = %message.from,
                        error = %send_error,
                        "reply was not delivered"
                    );
                }
            }
            Err(OrchestratorError::UnknownTenant(number)) => {
                warn!(
                    event_name = "unknown_tenant_number",
                    phone_number_id = %number,
                    "inbound message for an unregistered number"
                );
            }
            Err(OrchestratorError::Repository(repo_error)) => {
                error!(
                    event_name = "turn_storage_failed",
                    error = %repo_error,
                    "turn aborted before it could run"
                );
            }
        }
    }

    StatusCode::OK.into_response()
}

#[derive(Debug, Deserialize)]
struct DecisionRequest {
    escalation_id: String,
    decision: DecisionKind,
    price: Option<Decimal>,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DecisionKind {
    Confirmed,
    OutOfStock,
}

#[derive(Debug, Serialize)]
struct DecisionResponse {
    outcome: &'static str,
}

async fn inventory_decision(
    State(state): State<AppState>,
    Json(request): Json<DecisionRequest>,
) -> axum::response::Response {
    let decision = match request.decision {
        DecisionKind::Confirmed => match request.price {
            Some(price) if price > Decimal::ZERO => EscalationDecision::Confirmed { price },
            _ => {
                return error_response(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "confirmation requires a positive price",
                )
            }
        },
        DecisionKind::OutOfStock => EscalationDecision::OutOfStock,
    };

    match state.flywheel.resolve(&EscalationId(request.escalation_id), decision).await {
        Ok(ResolutionOutcome::Applied) => {
            (StatusCode::OK, Json(DecisionResponse { outcome: "applied" })).into_response()
        }
        Ok(ResolutionOutcome::AlreadyResolved) => {
            (StatusCode::OK, Json(DecisionResponse { outcome: "already_resolved" }))
                .into_response()
        }
        Err(FlywheelError::NotFound(id)) => {
            error_response(StatusCode::NOT_FOUND, format!("escalation {id} does not exist"))
        }
        Err(FlywheelError::Domain(DomainError::InvalidEscalationTransition { reason })) => {
            error_response(StatusCode::CONFLICT, reason)
        }
        Err(FlywheelError::Domain(domain_error)) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, domain_error.to_string())
        }
        Err(FlywheelError::Repository(repo_error)) => {
            error!(
                event_name = "decision_storage_failed",
                error = %repo_error,
                "owner decision was not applied"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
        }
    }
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    applied: u32,
    skipped: u32,
    errors: Vec<String>,
}

async fn ingest_catalog(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    body: String,
) -> axum::response::Response {
    match ingest_catalog_csv(state.products.as_ref(), &TenantId(tenant_id), &body).await {
        Ok(report) => (
            StatusCode::OK,
            Json(IngestResponse {
                applied: report.applied,
                skipped: report.skipped,
                errors: report.errors,
            }),
        )
            .into_response(),
        Err(error @ (IngestError::Empty | IngestError::MissingColumn(_))) => {
            error_response(StatusCode::UNPROCESSABLE_ENTITY, error.to_string())
        }
        Err(IngestError::Repository(repo_error)) => {
            error!(
                event_name = "catalog_ingest_failed",
                error = %repo_error,
                "catalog upload was not persisted"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
        }
    }
}

async fn list_products(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> axum::response::Response {
    match state.products.list_for_tenant(&TenantId(tenant_id)).await {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(repo_error) => {
            error!(
                event_name = "product_listing_failed",
                error = %repo_error,
                "catalog listing failed"
            );
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "storage failure")
        }
    }
}
