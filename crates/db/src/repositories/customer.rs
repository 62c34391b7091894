use sqlx::Row;

use vendy_core::domain::customer::{Customer, CustomerId};
use vendy_core::domain::tenant::TenantId;

use super::{CustomerRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCustomerRepository {
    pool: DbPool,
}

impl SqlCustomerRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_customer(row: &sqlx::sqlite::SqliteRow) -> Result<Customer, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: Option<String> =
        row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let address: Option<String> =
        row.try_get("address").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Customer { id: CustomerId(id), name, address })
}

#[async_trait::async_trait]
impl CustomerRepository for SqlCustomerRepository {
    async fn find(
        &self,
        tenant_id: &TenantId,
        id: &CustomerId,
    ) -> Result<Option<Customer>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, address FROM customer WHERE tenant_id = ? AND id = ?",
        )
        .bind(&tenant_id.0)
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_customer(r)?)),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        tenant_id: &TenantId,
        customer: Customer,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO customer (tenant_id, id, name, address)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(tenant_id, id) DO UPDATE SET
                 name = excluded.name,
                 address = excluded.address",
        )
        .bind(&tenant_id.0)
        .bind(&customer.id.0)
        .bind(&customer.name)
        .bind(&customer.address)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
