use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::{Availability, Product, ProductId};
use crate::domain::tenant::TenantId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscalationId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationStatus {
    Pending,
    Resolved,
}

impl EscalationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Resolved => "resolved",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// Owner verdict on an escalated phrase. Confirming requires a positive
/// price; there is no path to a confirmed product with an unknown price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationDecision {
    Confirmed { price: Decimal },
    OutOfStock,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Applied,
    AlreadyResolved,
}

/// A customer mention the catalog could not satisfy, parked for a human.
/// The placeholder product it points at stays Unconfirmed until the owner
/// answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEscalation {
    pub id: EscalationId,
    pub tenant_id: TenantId,
    /// Verbatim customer wording, kept for the owner notification.
    pub phrase: String,
    /// Dedupe key: at most one pending escalation per (tenant, phrase).
    pub normalized_phrase: String,
    pub product_id: ProductId,
    pub status: EscalationStatus,
    pub decision: Option<EscalationDecision>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl InventoryEscalation {
    pub fn raise(
        id: EscalationId,
        tenant_id: TenantId,
        phrase: String,
        normalized_phrase: String,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id,
            phrase,
            normalized_phrase,
            product_id,
            status: EscalationStatus::Pending,
            decision: None,
            created_at: now,
            resolved_at: None,
        }
    }

    /// Applies an owner decision. Replaying the same decision is an
    /// idempotent no-op; a conflicting decision on a resolved escalation
    /// is rejected.
    pub fn resolve(
        &mut self,
        decision: EscalationDecision,
        now: DateTime<Utc>,
    ) -> Result<ResolutionOutcome, DomainError> {
        if let EscalationDecision::Confirmed { price } = &decision {
            if *price <= Decimal::ZERO {
                return Err(DomainError::InvalidEscalationTransition {
                    reason: format!("confirmation requires a positive price, got {price}"),
                });
            }
        }
        match self.status {
            EscalationStatus::Pending => {
                self.status = EscalationStatus::Resolved;
                self.decision = Some(decision);
                self.resolved_at = Some(now);
                Ok(ResolutionOutcome::Applied)
            }
            EscalationStatus::Resolved => {
                if self.decision.as_ref() == Some(&decision) {
                    Ok(ResolutionOutcome::AlreadyResolved)
                } else {
                    Err(DomainError::InvalidEscalationTransition {
                        reason: format!(
                            "escalation {} already resolved with a different decision",
                            self.id.0
                        ),
                    })
                }
            }
        }
    }

    /// Pushes the decision onto the placeholder product.
    pub fn apply_decision(decision: &EscalationDecision, product: &mut Product) {
        match decision {
            EscalationDecision::Confirmed { price } => {
                product.availability = Availability::Confirmed;
                product.price = Some(*price);
            }
            EscalationDecision::OutOfStock => {
                product.availability = Availability::OutOfStock;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{
        EscalationDecision, EscalationId, EscalationStatus, InventoryEscalation,
        ResolutionOutcome,
    };
    use crate::domain::product::{Availability, Product, ProductId};
    use crate::domain::tenant::TenantId;
    use crate::errors::DomainError;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn escalation() -> InventoryEscalation {
        InventoryEscalation::raise(
            EscalationId("esc-1".to_owned()),
            TenantId("t-1".to_owned()),
            "Vegan Burger".to_owned(),
            "vegan burger".to_owned(),
            ProductId("p-1".to_owned()),
            now(),
        )
    }

    #[test]
    fn confirming_requires_a_positive_price() {
        let mut escalation = escalation();
        let error = escalation
            .resolve(EscalationDecision::Confirmed { price: Decimal::ZERO }, now())
            .unwrap_err();
        assert!(matches!(error, DomainError::InvalidEscalationTransition { .. }));
        assert_eq!(escalation.status, EscalationStatus::Pending);
    }

    #[test]
    fn replaying_the_same_decision_is_a_no_op() {
        let mut escalation = escalation();
        let decision = EscalationDecision::Confirmed { price: Decimal::new(750, 2) };
        assert_eq!(
            escalation.resolve(decision.clone(), now()).unwrap(),
            ResolutionOutcome::Applied
        );
        assert_eq!(
            escalation.resolve(decision, now()).unwrap(),
            ResolutionOutcome::AlreadyResolved
        );
    }

    #[test]
    fn conflicting_decisions_are_rejected() {
        let mut escalation = escalation();
        escalation
            .resolve(EscalationDecision::Confirmed { price: Decimal::new(750, 2) }, now())
            .unwrap();
        let error = escalation.resolve(EscalationDecision::OutOfStock, now()).unwrap_err();
        assert!(matches!(error, DomainError::InvalidEscalationTransition { .. }));
    }

    #[test]
    fn confirmation_promotes_the_placeholder_product() {
        let mut product = Product {
            id: ProductId("p-1".to_owned()),
            tenant_id: TenantId("t-1".to_owned()),
            sku: "ESC-1".to_owned(),
            name: "Vegan Burger".to_owned(),
            description: None,
            price: None,
            unit: "piece".to_owned(),
            availability: Availability::Unconfirmed,
        };
        let decision = EscalationDecision::Confirmed { price: Decimal::new(750, 2) };
        InventoryEscalation::apply_decision(&decision, &mut product);
        assert_eq!(product.availability, Availability::Confirmed);
        assert_eq!(product.price, Some(Decimal::new(750, 2)));
    }

    #[test]
    fn out_of_stock_decision_keeps_the_price_unknown() {
        let mut product = Product {
            id: ProductId("p-1".to_owned()),
            tenant_id: TenantId("t-1".to_owned()),
            sku: "ESC-1".to_owned(),
            name: "Vegan Burger".to_owned(),
            description: None,
            price: None,
            unit: "piece".to_owned(),
            availability: Availability::Unconfirmed,
        };
        InventoryEscalation::apply_decision(&EscalationDecision::OutOfStock, &mut product);
        assert_eq!(product.availability, Availability::OutOfStock);
        assert_eq!(product.price, None);
    }
}
