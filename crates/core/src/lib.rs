pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;

pub use catalog::{
    normalize_phrase, CatalogMatch, CatalogMatcher, DefaultMentionHeuristic, MatcherConfig,
    MentionHeuristic,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::cart::{Cart, CartId, CartLine, CartView};
pub use domain::customer::{Customer, CustomerId};
pub use domain::escalation::{
    EscalationDecision, EscalationId, EscalationStatus, InventoryEscalation, ResolutionOutcome,
};
pub use domain::product::{Availability, Product, ProductId};
pub use domain::tenant::{Tenant, TenantId};
pub use domain::trace::{
    InMemoryTraceSink, ToolCallTrace, ToolResultStatus, TraceSink, TurnId, TurnOutcome, TurnTrace,
};
pub use errors::{ApplicationError, DomainError};
