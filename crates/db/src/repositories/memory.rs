//! In-memory repository fakes for agent and server tests. They mirror the
//! SQL implementations' observable behavior, including the one-pending-
//! escalation-per-phrase rule the schema enforces.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use vendy_core::domain::cart::Cart;
use vendy_core::domain::customer::{Customer, CustomerId};
use vendy_core::domain::escalation::{EscalationId, EscalationStatus, InventoryEscalation};
use vendy_core::domain::product::{Product, ProductId};
use vendy_core::domain::tenant::{Tenant, TenantId};
use vendy_core::domain::trace::TurnTrace;

use super::{
    CartRepository, CustomerRepository, EscalationRepository, ProductRepository, RepositoryError,
    TenantRepository, TraceRepository,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Clone, Default)]
pub struct InMemoryTenantRepository {
    tenants: Arc<Mutex<HashMap<String, Tenant>>>,
}

impl InMemoryTenantRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TenantRepository for InMemoryTenantRepository {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        Ok(lock(&self.tenants).get(&id.0).cloned())
    }

    async fn find_by_whatsapp_number(
        &self,
        whatsapp_number_id: &str,
    ) -> Result<Option<Tenant>, RepositoryError> {
        Ok(lock(&self.tenants)
            .values()
            .find(|tenant| tenant.whatsapp_number_id == whatsapp_number_id)
            .cloned())
    }

    async fn save(&self, tenant: Tenant) -> Result<(), RepositoryError> {
        lock(&self.tenants).insert(tenant.id.0.clone(), tenant);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCustomerRepository {
    customers: Arc<Mutex<HashMap<(String, String), Customer>>>,
}

impl InMemoryCustomerRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CustomerRepository for InMemoryCustomerRepository {
    async fn find(
        &self,
        tenant_id: &TenantId,
        id: &CustomerId,
    ) -> Result<Option<Customer>, RepositoryError> {
        Ok(lock(&self.customers).get(&(tenant_id.0.clone(), id.0.clone())).cloned())
    }

    async fn save(
        &self,
        tenant_id: &TenantId,
        customer: Customer,
    ) -> Result<(), RepositoryError> {
        lock(&self.customers).insert((tenant_id.0.clone(), customer.id.0.clone()), customer);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryProductRepository {
    products: Arc<Mutex<HashMap<String, Product>>>,
}

impl InMemoryProductRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(lock(&self.products).get(&id.0).cloned())
    }

    async fn find_by_sku(
        &self,
        tenant_id: &TenantId,
        sku: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        Ok(lock(&self.products)
            .values()
            .find(|product| product.tenant_id == *tenant_id && product.sku == sku)
            .cloned())
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut products: Vec<Product> = lock(&self.products)
            .values()
            .filter(|product| product.tenant_id == *tenant_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        lock(&self.products).insert(product.id.0.clone(), product);
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCartRepository {
    carts: Arc<Mutex<HashMap<(String, String), Cart>>>,
}

impl InMemoryCartRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn find_for_customer(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Cart>, RepositoryError> {
        Ok(lock(&self.carts).get(&(tenant_id.0.clone(), customer_id.0.clone())).cloned())
    }

    async fn save(&self, cart: Cart) -> Result<(), RepositoryError> {
        lock(&self.carts).insert((cart.tenant_id.0.clone(), cart.customer_id.0.clone()), cart);
        Ok(())
    }
}

/// Escalation fake. Holds a handle to the product fake so resolutions can
/// update both stores the way the SQL transaction does.
#[derive(Clone, Default)]
pub struct InMemoryEscalationRepository {
    escalations: Arc<Mutex<HashMap<String, InventoryEscalation>>>,
    products: InMemoryProductRepository,
}

impl InMemoryEscalationRepository {
    pub fn new(products: InMemoryProductRepository) -> Self {
        Self { escalations: Arc::default(), products }
    }
}

#[async_trait]
impl EscalationRepository for InMemoryEscalationRepository {
    async fn find_by_id(
        &self,
        id: &EscalationId,
    ) -> Result<Option<InventoryEscalation>, RepositoryError> {
        Ok(lock(&self.escalations).get(&id.0).cloned())
    }

    async fn find_pending_by_phrase(
        &self,
        tenant_id: &TenantId,
        normalized_phrase: &str,
    ) -> Result<Option<InventoryEscalation>, RepositoryError> {
        Ok(lock(&self.escalations)
            .values()
            .find(|escalation| {
                escalation.tenant_id == *tenant_id
                    && escalation.normalized_phrase == normalized_phrase
                    && escalation.status == EscalationStatus::Pending
            })
            .cloned())
    }

    async fn list_pending(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<InventoryEscalation>, RepositoryError> {
        let mut pending: Vec<InventoryEscalation> = lock(&self.escalations)
            .values()
            .filter(|escalation| {
                escalation.tenant_id == *tenant_id
                    && escalation.status == EscalationStatus::Pending
            })
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    async fn save(&self, escalation: InventoryEscalation) -> Result<(), RepositoryError> {
        let mut escalations = lock(&self.escalations);
        if escalation.status == EscalationStatus::Pending {
            let duplicate = escalations.values().any(|existing| {
                existing.id != escalation.id
                    && existing.tenant_id == escalation.tenant_id
                    && existing.normalized_phrase == escalation.normalized_phrase
                    && existing.status == EscalationStatus::Pending
            });
            if duplicate {
                return Err(RepositoryError::Decode(format!(
                    "pending escalation already exists for phrase `{}`",
                    escalation.normalized_phrase
                )));
            }
        }
        escalations.insert(escalation.id.0.clone(), escalation);
        Ok(())
    }

    async fn save_resolution(
        &self,
        escalation: &InventoryEscalation,
        product: &Product,
    ) -> Result<(), RepositoryError> {
        lock(&self.escalations).insert(escalation.id.0.clone(), escalation.clone());
        self.products.save(product.clone()).await
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTraceRepository {
    traces: Arc<Mutex<Vec<TurnTrace>>>,
}

impl InMemoryTraceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<TurnTrace> {
        lock(&self.traces).clone()
    }
}

#[async_trait]
impl TraceRepository for InMemoryTraceRepository {
    async fn append(&self, trace: TurnTrace) -> Result<(), RepositoryError> {
        lock(&self.traces).push(trace);
        Ok(())
    }
}
