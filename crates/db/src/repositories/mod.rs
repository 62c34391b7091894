use async_trait::async_trait;
use thiserror::Error;

use vendy_core::domain::cart::Cart;
use vendy_core::domain::customer::{Customer, CustomerId};
use vendy_core::domain::escalation::{EscalationId, InventoryEscalation};
use vendy_core::domain::product::{Product, ProductId};
use vendy_core::domain::tenant::{Tenant, TenantId};
use vendy_core::domain::trace::TurnTrace;

pub mod cart;
pub mod customer;
pub mod escalation;
pub mod memory;
pub mod product;
pub mod tenant;
pub mod trace;

pub use cart::SqlCartRepository;
pub use customer::SqlCustomerRepository;
pub use escalation::SqlEscalationRepository;
pub use memory::{
    InMemoryCartRepository, InMemoryCustomerRepository, InMemoryEscalationRepository,
    InMemoryProductRepository, InMemoryTenantRepository, InMemoryTraceRepository,
};
pub use product::SqlProductRepository;
pub use tenant::SqlTenantRepository;
pub use trace::SqlTraceRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError>;
    async fn find_by_whatsapp_number(
        &self,
        whatsapp_number_id: &str,
    ) -> Result<Option<Tenant>, RepositoryError>;
    async fn save(&self, tenant: Tenant) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CustomerRepository: Send + Sync {
    async fn find(
        &self,
        tenant_id: &TenantId,
        id: &CustomerId,
    ) -> Result<Option<Customer>, RepositoryError>;
    async fn save(&self, tenant_id: &TenantId, customer: Customer)
        -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn find_by_sku(
        &self,
        tenant_id: &TenantId,
        sku: &str,
    ) -> Result<Option<Product>, RepositoryError>;
    async fn list_for_tenant(&self, tenant_id: &TenantId)
        -> Result<Vec<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn find_for_customer(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Cart>, RepositoryError>;
    /// Persists the whole aggregate: the cart row and all its lines land in
    /// one transaction, so readers never observe a half-written cart.
    async fn save(&self, cart: Cart) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait EscalationRepository: Send + Sync {
    async fn find_by_id(
        &self,
        id: &EscalationId,
    ) -> Result<Option<InventoryEscalation>, RepositoryError>;
    async fn find_pending_by_phrase(
        &self,
        tenant_id: &TenantId,
        normalized_phrase: &str,
    ) -> Result<Option<InventoryEscalation>, RepositoryError>;
    async fn list_pending(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<InventoryEscalation>, RepositoryError>;
    async fn save(&self, escalation: InventoryEscalation) -> Result<(), RepositoryError>;
    /// Writes the resolved escalation and the promoted product in a single
    /// transaction. Either both land or neither does.
    async fn save_resolution(
        &self,
        escalation: &InventoryEscalation,
        product: &Product,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait TraceRepository: Send + Sync {
    async fn append(&self, trace: TurnTrace) -> Result<(), RepositoryError>;
}
