use chrono::{DateTime, Utc};
use sqlx::Row;

use vendy_core::domain::cart::{Cart, CartId, CartLine};
use vendy_core::domain::customer::CustomerId;
use vendy_core::domain::product::ProductId;
use vendy_core::domain::tenant::TenantId;

use super::product::parse_price;
use super::{CartRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCartRepository {
    pool: DbPool,
}

impl SqlCartRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {e}")))
}

fn row_to_line(row: &sqlx::sqlite::SqliteRow) -> Result<CartLine, RepositoryError> {
    let product_id: String =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let unit_price_str: Option<String> =
        row.try_get("unit_price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let quantity: i64 =
        row.try_get("quantity").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(CartLine {
        product_id: ProductId(product_id),
        name,
        unit_price: parse_price(unit_price_str)?,
        quantity: u32::try_from(quantity)
            .map_err(|_| RepositoryError::Decode(format!("invalid quantity `{quantity}`")))?,
    })
}

#[async_trait::async_trait]
impl CartRepository for SqlCartRepository {
    async fn find_for_customer(
        &self,
        tenant_id: &TenantId,
        customer_id: &CustomerId,
    ) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, tenant_id, customer_id, created_at, updated_at
             FROM cart WHERE tenant_id = ? AND customer_id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&customer_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let created_at_str: String =
            row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let updated_at_str: String =
            row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

        let line_rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT product_id, name, unit_price, quantity
             FROM cart_line WHERE cart_id = ? ORDER BY rowid ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let lines = line_rows.iter().map(row_to_line).collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Cart {
            id: CartId(id),
            tenant_id: tenant_id.clone(),
            customer_id: customer_id.clone(),
            lines,
            created_at: parse_timestamp(&created_at_str)?,
            updated_at: parse_timestamp(&updated_at_str)?,
        }))
    }

    async fn save(&self, cart: Cart) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO cart (id, tenant_id, customer_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at",
        )
        .bind(&cart.id.0)
        .bind(&cart.tenant_id.0)
        .bind(&cart.customer_id.0)
        .bind(cart.created_at.to_rfc3339())
        .bind(cart.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // Lines are replaced wholesale so the stored cart always mirrors the
        // aggregate that was validated in memory.
        sqlx::query("DELETE FROM cart_line WHERE cart_id = ?")
            .bind(&cart.id.0)
            .execute(&mut *tx)
            .await?;

        for line in &cart.lines {
            sqlx::query(
                "INSERT INTO cart_line (cart_id, product_id, name, unit_price, quantity)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&cart.id.0)
            .bind(&line.product_id.0)
            .bind(&line.name)
            .bind(line.unit_price.map(|p| p.to_string()))
            .bind(i64::from(line.quantity))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
