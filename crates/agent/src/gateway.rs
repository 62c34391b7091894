use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use vendy_core::catalog::{normalize_phrase, CatalogMatcher, MentionHeuristic};
use vendy_core::domain::escalation::{EscalationId, InventoryEscalation};
use vendy_core::domain::product::{Availability, Product, ProductId};
use vendy_core::domain::tenant::TenantId;
use vendy_db::repositories::{EscalationRepository, ProductRepository, RepositoryError};

use crate::flywheel::EscalationNotifier;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What the conversation may say about one matched product. The signal is
/// derived, never stored: it collapses availability and price presence into
/// the cases the planner has to phrase differently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AvailabilitySignal {
    Available { price: Decimal },
    PriceNotFound,
    OutOfStock,
    Unconfirmed,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductReport {
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    pub unit: String,
    pub signal: AvailabilitySignal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub matches: Vec<ProductReport>,
    /// Set when the miss raised (or joined) a pending owner escalation.
    pub escalated: Option<String>,
}

fn signal_for(product: &Product) -> AvailabilitySignal {
    match (product.availability, product.price) {
        (Availability::Confirmed, Some(price)) => AvailabilitySignal::Available { price },
        (Availability::Confirmed, None) => AvailabilitySignal::PriceNotFound,
        (Availability::OutOfStock, _) => AvailabilitySignal::OutOfStock,
        (Availability::Unconfirmed, _) => AvailabilitySignal::Unconfirmed,
    }
}

/// Catalog search with the inventory flywheel attached: a query that looks
/// like a product mention but matches nothing becomes an Unconfirmed
/// placeholder plus a pending escalation for the owner.
pub struct CatalogGateway {
    products: Arc<dyn ProductRepository>,
    escalations: Arc<dyn EscalationRepository>,
    matcher: CatalogMatcher,
    heuristic: Arc<dyn MentionHeuristic>,
    notifier: Arc<dyn EscalationNotifier>,
}

impl CatalogGateway {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        escalations: Arc<dyn EscalationRepository>,
        matcher: CatalogMatcher,
        heuristic: Arc<dyn MentionHeuristic>,
        notifier: Arc<dyn EscalationNotifier>,
    ) -> Self {
        Self { products, escalations, matcher, heuristic, notifier }
    }

    pub async fn search(
        &self,
        tenant_id: &TenantId,
        query: &str,
    ) -> Result<SearchOutcome, GatewayError> {
        let catalog = self.products.list_for_tenant(tenant_id).await?;
        let ranked = self.matcher.rank(query, &catalog);

        if !ranked.is_empty() {
            let matches = ranked
                .into_iter()
                .map(|m| ProductReport {
                    product_id: m.product.id.0.clone(),
                    name: m.product.name.clone(),
                    description: m.product.description.clone(),
                    unit: m.product.unit.clone(),
                    signal: signal_for(&m.product),
                })
                .collect();
            return Ok(SearchOutcome { matches, escalated: None });
        }

        if !self.heuristic.is_product_mention(query) {
            return Ok(SearchOutcome { matches: Vec::new(), escalated: None });
        }

        let escalation_id = self.escalate_miss(tenant_id, query).await?;
        Ok(SearchOutcome { matches: Vec::new(), escalated: Some(escalation_id.0) })
    }

    async fn escalate_miss(
        &self,
        tenant_id: &TenantId,
        phrase: &str,
    ) -> Result<EscalationId, GatewayError> {
        let normalized = normalize_phrase(phrase);

        if let Some(existing) =
            self.escalations.find_pending_by_phrase(tenant_id, &normalized).await?
        {
            info!(
                event_name = "escalation_joined",
                escalation_id = %existing.id.0,
                phrase = %normalized,
                "repeat mention joined a pending escalation"
            );
            return Ok(existing.id);
        }

        let placeholder = self.ensure_placeholder(tenant_id, phrase, &normalized).await?;
        let escalation = InventoryEscalation::raise(
            EscalationId(Uuid::new_v4().to_string()),
            tenant_id.clone(),
            phrase.to_owned(),
            normalized.clone(),
            placeholder.id.clone(),
            Utc::now(),
        );

        match self.escalations.save(escalation.clone()).await {
            Ok(()) => {
                info!(
                    event_name = "escalation_raised",
                    escalation_id = %escalation.id.0,
                    tenant_id = %tenant_id.0,
                    phrase = %normalized,
                    "catalog miss escalated to the owner"
                );
                self.notifier.pending_escalation(&escalation).await;
                Ok(escalation.id)
            }
            Err(save_error) => {
                // A concurrent turn may have raised the same phrase; the
                // pending-phrase index makes one of the writers lose.
                if let Some(existing) =
                    self.escalations.find_pending_by_phrase(tenant_id, &normalized).await?
                {
                    warn!(
                        event_name = "escalation_race_resolved",
                        escalation_id = %existing.id.0,
                        "lost escalation insert race, joining existing"
                    );
                    return Ok(existing.id);
                }
                Err(save_error.into())
            }
        }
    }

    async fn ensure_placeholder(
        &self,
        tenant_id: &TenantId,
        phrase: &str,
        normalized: &str,
    ) -> Result<Product, GatewayError> {
        let sku = format!("ESC-{}", normalized.replace(' ', "-").to_uppercase());
        if let Some(existing) = self.products.find_by_sku(tenant_id, &sku).await? {
            return Ok(existing);
        }

        let placeholder = Product {
            id: ProductId(Uuid::new_v4().to_string()),
            tenant_id: tenant_id.clone(),
            sku,
            name: phrase.to_owned(),
            description: None,
            price: None,
            unit: "piece".to_owned(),
            availability: Availability::Unconfirmed,
        };
        self.products.save(placeholder.clone()).await?;
        Ok(placeholder)
    }
}
