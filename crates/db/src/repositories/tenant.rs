use sqlx::Row;

use vendy_core::domain::tenant::{Tenant, TenantId};

use super::{RepositoryError, TenantRepository};
use crate::DbPool;

pub struct SqlTenantRepository {
    pool: DbPool,
}

impl SqlTenantRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_tenant(row: &sqlx::sqlite::SqliteRow) -> Result<Tenant, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let whatsapp_number_id: String =
        row.try_get("whatsapp_number_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let business_type: String =
        row.try_get("business_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let personality: String =
        row.try_get("personality").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Tenant { id: TenantId(id), name, whatsapp_number_id, business_type, personality })
}

#[async_trait::async_trait]
impl TenantRepository for SqlTenantRepository {
    async fn find_by_id(&self, id: &TenantId) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, whatsapp_number_id, business_type, personality
             FROM tenant WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_tenant(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_whatsapp_number(
        &self,
        whatsapp_number_id: &str,
    ) -> Result<Option<Tenant>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, name, whatsapp_number_id, business_type, personality
             FROM tenant WHERE whatsapp_number_id = ?",
        )
        .bind(whatsapp_number_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_tenant(r)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, tenant: Tenant) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO tenant (id, name, whatsapp_number_id, business_type, personality)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 whatsapp_number_id = excluded.whatsapp_number_id,
                 business_type = excluded.business_type,
                 personality = excluded.personality",
        )
        .bind(&tenant.id.0)
        .bind(&tenant.name)
        .bind(&tenant.whatsapp_number_id)
        .bind(&tenant.business_type)
        .bind(&tenant.personality)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use vendy_core::domain::tenant::{Tenant, TenantId};

    use super::SqlTenantRepository;
    use crate::repositories::TenantRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_tenant(id: &str, number: &str) -> Tenant {
        Tenant {
            id: TenantId(id.to_string()),
            name: "La Esquina".to_string(),
            whatsapp_number_id: number.to_string(),
            business_type: "restaurant".to_string(),
            personality: "warm and brief".to_string(),
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id() {
        let pool = setup().await;
        let repo = SqlTenantRepository::new(pool);

        repo.save(sample_tenant("t-1", "1555000")).await.expect("save");
        let found = repo.find_by_id(&TenantId("t-1".to_string())).await.expect("find");
        assert_eq!(found.expect("tenant exists").name, "La Esquina");
    }

    #[tokio::test]
    async fn routing_lookup_uses_whatsapp_number() {
        let pool = setup().await;
        let repo = SqlTenantRepository::new(pool);

        repo.save(sample_tenant("t-1", "1555000")).await.expect("save t-1");
        repo.save(sample_tenant("t-2", "1555999")).await.expect("save t-2");

        let found = repo.find_by_whatsapp_number("1555999").await.expect("find");
        assert_eq!(found.expect("tenant exists").id, TenantId("t-2".to_string()));
        assert!(repo.find_by_whatsapp_number("000").await.expect("find none").is_none());
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let pool = setup().await;
        let repo = SqlTenantRepository::new(pool);

        repo.save(sample_tenant("t-1", "1555000")).await.expect("save");
        let mut updated = sample_tenant("t-1", "1555000");
        updated.personality = "formal".to_string();
        repo.save(updated).await.expect("resave");

        let found = repo.find_by_id(&TenantId("t-1".to_string())).await.expect("find");
        assert_eq!(found.expect("tenant exists").personality, "formal");
    }
}
