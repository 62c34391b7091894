use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use tracing::info;

use vendy_core::domain::escalation::{
    EscalationDecision, EscalationId, InventoryEscalation, ResolutionOutcome,
};
use vendy_core::errors::DomainError;
use vendy_db::repositories::{EscalationRepository, ProductRepository, RepositoryError};

/// Owner-facing channel for new escalations. Delivery is best effort; the
/// escalation row is already durable when this runs.
#[async_trait]
pub trait EscalationNotifier: Send + Sync {
    async fn pending_escalation(&self, escalation: &InventoryEscalation);
}

/// Fallback notifier: surfaces escalations in the logs only. Used whenever
/// no outbound channel is configured.
#[derive(Clone, Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl EscalationNotifier for TracingNotifier {
    async fn pending_escalation(&self, escalation: &InventoryEscalation) {
        info!(
            event_name = "owner_notification",
            escalation_id = %escalation.id.0,
            tenant_id = %escalation.tenant_id.0,
            phrase = %escalation.phrase,
            "escalation awaiting owner decision"
        );
    }
}

/// Test notifier that records the phrases it was asked to deliver.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    phrases: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn pending(&self) -> Vec<String> {
        self.phrases.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }
}

#[async_trait]
impl EscalationNotifier for RecordingNotifier {
    async fn pending_escalation(&self, escalation: &InventoryEscalation) {
        self.phrases
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(escalation.phrase.clone());
    }
}

#[derive(Debug, Error)]
pub enum FlywheelError {
    #[error("escalation {0} does not exist")]
    NotFound(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Applies owner decisions to pending escalations. The escalation and its
/// placeholder product move together or not at all.
pub struct Flywheel {
    escalations: Arc<dyn EscalationRepository>,
    products: Arc<dyn ProductRepository>,
}

impl Flywheel {
    pub fn new(
        escalations: Arc<dyn EscalationRepository>,
        products: Arc<dyn ProductRepository>,
    ) -> Self {
        Self { escalations, products }
    }

    pub async fn resolve(
        &self,
        id: &EscalationId,
        decision: EscalationDecision,
    ) -> Result<ResolutionOutcome, FlywheelError> {
        let mut escalation = self
            .escalations
            .find_by_id(id)
            .await?
            .ok_or_else(|| FlywheelError::NotFound(id.0.clone()))?;

        let outcome = escalation.resolve(decision.clone(), Utc::now())?;
        if outcome == ResolutionOutcome::AlreadyResolved {
            return Ok(outcome);
        }

        let mut product = self
            .products
            .find_by_id(&escalation.product_id)
            .await?
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!(
                    "escalation {} references missing product {}",
                    escalation.id.0, escalation.product_id.0
                ))
            })?;
        InventoryEscalation::apply_decision(&decision, &mut product);

        self.escalations.save_resolution(&escalation, &product).await?;

        info!(
            event_name = "escalation_resolved",
            escalation_id = %escalation.id.0,
            tenant_id = %escalation.tenant_id.0,
            product_id = %product.id.0,
            availability = product.availability.as_str(),
            "owner decision applied"
        );
        Ok(outcome)
    }
}
