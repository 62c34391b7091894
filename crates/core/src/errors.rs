use thiserror::Error;

use crate::domain::product::{Availability, ProductId};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("product {product_id:?} is not purchasable (availability {availability:?})")]
    NotPurchasable { product_id: ProductId, availability: Availability },
    #[error("invalid quantity {quantity}")]
    InvalidQuantity { quantity: i64 },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid escalation transition: {reason}")]
    InvalidEscalationTransition { reason: String },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl DomainError {
    /// Recoverable errors are serialized back into the conversation so the
    /// planner can react; everything else aborts the turn.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotPurchasable { .. } | Self::InvalidQuantity { .. } | Self::NotFound(_)
        )
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    /// Customer-safe wording for failures that must surface on the channel.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Domain(_) => "I couldn't complete that request. Could you rephrase it?",
            Self::Persistence(_) => {
                "I'm having trouble reaching the store systems. Please try again in a moment."
            }
            Self::Integration(_) => {
                "A service I depend on is temporarily unavailable. Please retry shortly."
            }
            Self::Configuration(_) => "Something went wrong on our side. Please try again later.",
        }
    }
}
