use chrono::{DateTime, Utc};
use sqlx::Row;

use vendy_core::domain::escalation::{
    EscalationDecision, EscalationId, EscalationStatus, InventoryEscalation,
};
use vendy_core::domain::product::{Product, ProductId};
use vendy_core::domain::tenant::TenantId;

use super::{EscalationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlEscalationRepository {
    pool: DbPool,
}

impl SqlEscalationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {e}")))
}

fn row_to_escalation(row: &sqlx::sqlite::SqliteRow) -> Result<InventoryEscalation, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let tenant_id: String =
        row.try_get("tenant_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let phrase: String =
        row.try_get("phrase").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let normalized_phrase: String =
        row.try_get("normalized_phrase").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let product_id: String =
        row.try_get("product_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let decision_json: Option<String> =
        row.try_get("decision").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resolved_at_str: Option<String> =
        row.try_get("resolved_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let status = EscalationStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("invalid status `{status_str}`")))?;
    let decision = decision_json
        .map(|raw| {
            serde_json::from_str::<EscalationDecision>(&raw)
                .map_err(|e| RepositoryError::Decode(format!("invalid decision payload: {e}")))
        })
        .transpose()?;
    let resolved_at = resolved_at_str.as_deref().map(parse_timestamp).transpose()?;

    Ok(InventoryEscalation {
        id: EscalationId(id),
        tenant_id: TenantId(tenant_id),
        phrase,
        normalized_phrase,
        product_id: ProductId(product_id),
        status,
        decision,
        created_at: parse_timestamp(&created_at_str)?,
        resolved_at,
    })
}

const ESCALATION_COLUMNS: &str = "id, tenant_id, phrase, normalized_phrase, product_id, status, \
                                  decision, created_at, resolved_at";

fn encode_decision(
    decision: &Option<EscalationDecision>,
) -> Result<Option<String>, RepositoryError> {
    decision
        .as_ref()
        .map(|d| {
            serde_json::to_string(d)
                .map_err(|e| RepositoryError::Decode(format!("encode decision: {e}")))
        })
        .transpose()
}

#[async_trait::async_trait]
impl EscalationRepository for SqlEscalationRepository {
    async fn find_by_id(
        &self,
        id: &EscalationId,
    ) -> Result<Option<InventoryEscalation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ESCALATION_COLUMNS} FROM inventory_escalation WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_escalation(r)?)),
            None => Ok(None),
        }
    }

    async fn find_pending_by_phrase(
        &self,
        tenant_id: &TenantId,
        normalized_phrase: &str,
    ) -> Result<Option<InventoryEscalation>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ESCALATION_COLUMNS} FROM inventory_escalation
             WHERE tenant_id = ? AND normalized_phrase = ? AND status = 'pending'"
        ))
        .bind(&tenant_id.0)
        .bind(normalized_phrase)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_escalation(r)?)),
            None => Ok(None),
        }
    }

    async fn list_pending(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<InventoryEscalation>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {ESCALATION_COLUMNS} FROM inventory_escalation
             WHERE tenant_id = ? AND status = 'pending'
             ORDER BY created_at ASC"
        ))
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_escalation).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, escalation: InventoryEscalation) -> Result<(), RepositoryError> {
        let decision_json = encode_decision(&escalation.decision)?;

        sqlx::query(
            "INSERT INTO inventory_escalation
                 (id, tenant_id, phrase, normalized_phrase, product_id, status, decision,
                  created_at, resolved_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 decision = excluded.decision,
                 resolved_at = excluded.resolved_at",
        )
        .bind(&escalation.id.0)
        .bind(&escalation.tenant_id.0)
        .bind(&escalation.phrase)
        .bind(&escalation.normalized_phrase)
        .bind(&escalation.product_id.0)
        .bind(escalation.status.as_str())
        .bind(&decision_json)
        .bind(escalation.created_at.to_rfc3339())
        .bind(escalation.resolved_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_resolution(
        &self,
        escalation: &InventoryEscalation,
        product: &Product,
    ) -> Result<(), RepositoryError> {
        let decision_json = encode_decision(&escalation.decision)?;
        let price_str = product.price.map(|p| p.to_string());

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE inventory_escalation
             SET status = ?, decision = ?, resolved_at = ?
             WHERE id = ?",
        )
        .bind(escalation.status.as_str())
        .bind(&decision_json)
        .bind(escalation.resolved_at.map(|dt| dt.to_rfc3339()))
        .bind(&escalation.id.0)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE product SET price = ?, availability = ? WHERE id = ?")
            .bind(&price_str)
            .bind(product.availability.as_str())
            .bind(&product.id.0)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
