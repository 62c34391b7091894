use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use vendy_core::domain::product::{Availability, Product, ProductId};
use vendy_core::domain::tenant::TenantId;

use super::{ProductRepository, RepositoryError};
use crate::DbPool;

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_price(value: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    value
        .map(|raw| {
            Decimal::from_str(&raw)
                .map_err(|_| RepositoryError::Decode(format!("invalid price `{raw}`")))
        })
        .transpose()
}

fn row_to_product(row: &sqlx::sqlite::SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tenant_id: String =
        row.try_get("tenant_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sku: String = row.try_get("sku").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: Option<String> =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: Option<String> =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit: String = row.try_get("unit").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let availability_str: String =
        row.try_get("availability").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let availability = Availability::parse(&availability_str).ok_or_else(|| {
        RepositoryError::Decode(format!("invalid availability `{availability_str}`"))
    })?;

    Ok(Product {
        id: ProductId(id),
        tenant_id: TenantId(tenant_id),
        sku,
        name,
        description,
        price: parse_price(price_str)?,
        unit,
        availability,
    })
}

const PRODUCT_COLUMNS: &str = "id, tenant_id, sku, name, description, price, unit, availability";

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_sku(
        &self,
        tenant_id: &TenantId,
        sku: &str,
    ) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE tenant_id = ? AND sku = ?"
        ))
        .bind(&tenant_id.0)
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM product WHERE tenant_id = ? ORDER BY name ASC"
        ))
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let price_str = product.price.map(|p| p.to_string());

        sqlx::query(
            "INSERT INTO product (id, tenant_id, sku, name, description, price, unit, availability)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 sku = excluded.sku,
                 name = excluded.name,
                 description = excluded.description,
                 price = excluded.price,
                 unit = excluded.unit,
                 availability = excluded.availability",
        )
        .bind(&product.id.0)
        .bind(&product.tenant_id.0)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&price_str)
        .bind(&product.unit)
        .bind(product.availability.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
