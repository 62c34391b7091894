use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::customer::CustomerId;
use crate::domain::product::{Product, ProductId};
use crate::domain::tenant::TenantId;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartId(pub String);

/// A cart line snapshots the product name and unit price at add time so a
/// later price change never silently reprices an open cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Option<Decimal>,
    pub quantity: u32,
}

impl CartLine {
    /// Billable subtotal; priceless lines contribute nothing.
    pub fn subtotal(&self) -> Decimal {
        match self.unit_price {
            Some(price) => price * Decimal::from(self.quantity),
            None => Decimal::ZERO,
        }
    }
}

/// The single open cart for one (tenant, customer) pair. All mutation is
/// pure: callers load, mutate a copy, and persist the whole aggregate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    pub lines: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CartView {
    pub lines: Vec<CartLine>,
    pub total: Decimal,
}

impl Cart {
    pub fn new(
        id: CartId,
        tenant_id: TenantId,
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> Self {
        Self { id, tenant_id, customer_id, lines: Vec::new(), created_at: now, updated_at: now }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Adds a purchasable product. Re-adding an existing line accumulates
    /// its quantity rather than duplicating the line.
    pub fn add_line(
        &mut self,
        product: &Product,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity: 0 });
        }
        if !product.is_purchasable() {
            return Err(DomainError::NotPurchasable {
                product_id: product.id.clone(),
                availability: product.availability,
            });
        }
        match self.lines.iter_mut().find(|line| line.product_id == product.id) {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(quantity);
            }
            None => {
                self.lines.push(CartLine {
                    product_id: product.id.clone(),
                    name: product.name.clone(),
                    unit_price: product.price,
                    quantity,
                });
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// Removing a product that is not in the cart is a no-op.
    pub fn remove_line(&mut self, product_id: &ProductId, now: DateTime<Utc>) -> bool {
        let before = self.lines.len();
        self.lines.retain(|line| &line.product_id != product_id);
        let removed = self.lines.len() != before;
        if removed {
            self.updated_at = now;
        }
        removed
    }

    /// Sets an existing line to an exact quantity. Zero removes the line;
    /// negative quantities are rejected before they reach storage.
    pub fn set_line_quantity(
        &mut self,
        product_id: &ProductId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if quantity < 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        if quantity == 0 {
            self.remove_line(product_id, now);
            return Ok(());
        }
        let line = self
            .lines
            .iter_mut()
            .find(|line| &line.product_id == product_id)
            .ok_or_else(|| DomainError::NotFound(format!("cart line {}", product_id.0)))?;
        line.quantity = u32::try_from(quantity)
            .map_err(|_| DomainError::InvalidQuantity { quantity })?;
        self.updated_at = now;
        Ok(())
    }

    pub fn view(&self) -> CartView {
        let total = self.lines.iter().map(CartLine::subtotal).sum();
        CartView { lines: self.lines.clone(), total }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    use super::{Cart, CartId};
    use crate::domain::customer::CustomerId;
    use crate::domain::product::{Availability, Product, ProductId};
    use crate::domain::tenant::TenantId;
    use crate::errors::DomainError;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn cart() -> Cart {
        Cart::new(
            CartId("c-1".to_owned()),
            TenantId("t-1".to_owned()),
            CustomerId("5215550001".to_owned()),
            now(),
        )
    }

    fn product(id: &str, price: Option<Decimal>, availability: Availability) -> Product {
        Product {
            id: ProductId(id.to_owned()),
            tenant_id: TenantId("t-1".to_owned()),
            sku: format!("SKU-{id}"),
            name: format!("Product {id}"),
            description: None,
            price,
            unit: "piece".to_owned(),
            availability,
        }
    }

    #[test]
    fn re_adding_a_product_accumulates_quantity() {
        let mut cart = cart();
        let sandwich = product("p-1", Some(Decimal::new(500, 2)), Availability::Confirmed);
        cart.add_line(&sandwich, 2, now()).unwrap();
        cart.add_line(&sandwich, 3, now()).unwrap();
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 5);
    }

    #[test]
    fn unconfirmed_products_cannot_be_added() {
        let mut cart = cart();
        let ghost = product("p-2", None, Availability::Unconfirmed);
        let error = cart.add_line(&ghost, 1, now()).unwrap_err();
        assert!(matches!(error, DomainError::NotPurchasable { .. }));
        assert!(cart.is_empty());
    }

    #[test]
    fn out_of_stock_products_cannot_be_added() {
        let mut cart = cart();
        let gone = product("p-3", Some(Decimal::ONE), Availability::OutOfStock);
        assert!(cart.add_line(&gone, 1, now()).is_err());
    }

    #[test]
    fn zero_quantity_add_is_rejected() {
        let mut cart = cart();
        let item = product("p-1", Some(Decimal::ONE), Availability::Confirmed);
        let error = cart.add_line(&item, 0, now()).unwrap_err();
        assert_eq!(error, DomainError::InvalidQuantity { quantity: 0 });
    }

    #[test]
    fn removing_an_absent_product_is_a_no_op() {
        let mut cart = cart();
        assert!(!cart.remove_line(&ProductId("p-9".to_owned()), now()));
    }

    #[test]
    fn set_quantity_zero_removes_the_line() {
        let mut cart = cart();
        let item = product("p-1", Some(Decimal::ONE), Availability::Confirmed);
        cart.add_line(&item, 4, now()).unwrap();
        cart.set_line_quantity(&item.id, 0, now()).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn negative_quantity_is_rejected() {
        let mut cart = cart();
        let item = product("p-1", Some(Decimal::ONE), Availability::Confirmed);
        cart.add_line(&item, 4, now()).unwrap();
        let error = cart.set_line_quantity(&item.id, -1, now()).unwrap_err();
        assert_eq!(error, DomainError::InvalidQuantity { quantity: -1 });
        assert_eq!(cart.lines[0].quantity, 4);
    }

    #[test]
    fn set_quantity_on_absent_line_reports_not_found() {
        let mut cart = cart();
        let error = cart.set_line_quantity(&ProductId("p-9".to_owned()), 2, now()).unwrap_err();
        assert!(matches!(error, DomainError::NotFound(_)));
    }

    #[test]
    fn set_quantity_reprices_the_line() {
        let mut cart = cart();
        let sandwich = product("p-1", Some(Decimal::new(500, 2)), Availability::Confirmed);
        cart.add_line(&sandwich, 2, now()).unwrap();
        assert_eq!(cart.view().total, Decimal::new(1000, 2));

        cart.set_line_quantity(&sandwich.id, 1, now()).unwrap();
        let view = cart.view();
        assert_eq!(view.lines[0].quantity, 1);
        assert_eq!(view.total, Decimal::new(500, 2));
    }

    #[test]
    fn priceless_lines_are_excluded_from_the_total() {
        let mut cart = cart();
        let sandwich = product("p-1", Some(Decimal::new(500, 2)), Availability::Confirmed);
        let extra_cheese = product("p-2", None, Availability::Confirmed);
        cart.add_line(&sandwich, 2, now()).unwrap();
        cart.add_line(&extra_cheese, 1, now()).unwrap();
        let view = cart.view();
        assert_eq!(view.lines.len(), 2);
        assert_eq!(view.total, Decimal::new(1000, 2));
    }

    #[test]
    fn line_snapshots_survive_later_price_changes() {
        let mut cart = cart();
        let mut sandwich = product("p-1", Some(Decimal::new(500, 2)), Availability::Confirmed);
        cart.add_line(&sandwich, 1, now()).unwrap();
        sandwich.price = Some(Decimal::new(900, 2));
        assert_eq!(cart.view().total, Decimal::new(500, 2));
    }
}
