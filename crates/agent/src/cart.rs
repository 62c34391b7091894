use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use vendy_core::domain::cart::{Cart, CartId, CartView};
use vendy_core::domain::customer::CustomerId;
use vendy_core::domain::product::ProductId;
use vendy_core::domain::tenant::TenantId;
use vendy_core::errors::DomainError;
use vendy_db::repositories::{CartRepository, ProductRepository, RepositoryError};

#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CartError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Domain(domain) => domain.is_recoverable(),
            Self::Repository(_) => false,
        }
    }
}

/// Serialized cart mutation per (tenant, customer). Every operation loads
/// the aggregate, mutates a copy, and persists the whole thing, so a failed
/// step leaves the stored cart untouched.
pub struct CartStore {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
    locks: Mutex<HashMap<(String, String), Arc<tokio::sync::Mutex<()>>>>,
}

impl CartStore {
    pub fn new(carts: Arc<dyn CartRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { carts, products, locks: Mutex::new(HashMap::new()) }
    }

    fn lock_for(&self, tenant_id: &TenantId, customer_id: &CustomerId) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks
            .entry((tenant_id.0.clone(), customer_id.0.clone()))
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    async fn load_or_new(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Cart, RepositoryError> {
        match self.carts.find_for_customer(tenant_id, customer_id).await? {
            Some(cart) => Ok(cart),
            None => Ok(Cart::new(
                CartId(Uuid::new_v4().to_string()),
                tenant_id.clone(),
                customer_id.clone(),
                Utc::now(),
            )),
        }
    }

    pub async fn add(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        let key_lock = self.lock_for(tenant_id, customer_id);
        let _guard = key_lock.lock().await;

        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(DomainError::InvalidQuantity { quantity })?;

        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or_else(|| DomainError::NotFound(format!("product {}", product_id.0)))?;
        if product.tenant_id != *tenant_id {
            return Err(DomainError::NotFound(format!("product {}", product_id.0)).into());
        }

        let mut cart = self.load_or_new(tenant_id, customer_id).await?;
        cart.add_line(&product, quantity, Utc::now())?;
        self.carts.save(cart.clone()).await?;
        Ok(cart.view())
    }

    pub async fn remove(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        product_id: &ProductId,
    ) -> Result<CartView, CartError> {
        let key_lock = self.lock_for(tenant_id, customer_id);
        let _guard = key_lock.lock().await;

        let mut cart = self.load_or_new(tenant_id, customer_id).await?;
        if cart.remove_line(product_id, Utc::now()) {
            self.carts.save(cart.clone()).await?;
        }
        Ok(cart.view())
    }

    pub async fn set_quantity(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        let key_lock = self.lock_for(tenant_id, customer_id);
        let _guard = key_lock.lock().await;

        let mut cart = self.load_or_new(tenant_id, customer_id).await?;
        cart.set_line_quantity(product_id, quantity, Utc::now())?;
        self.carts.save(cart.clone()).await?;
        Ok(cart.view())
    }

    pub async fn view(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<CartView, CartError> {
        let cart = self.load_or_new(tenant_id, customer_id).await?;
        Ok(cart.view())
    }
}
