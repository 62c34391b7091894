use vendy_core::domain::trace::{TurnOutcome, TurnTrace};

use super::{RepositoryError, TraceRepository};
use crate::DbPool;

pub struct SqlTraceRepository {
    pool: DbPool,
}

impl SqlTraceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn outcome_detail(outcome: &TurnOutcome) -> Option<&str> {
    match outcome {
        TurnOutcome::Reply(text) => Some(text),
        TurnOutcome::BudgetExhausted => None,
        TurnOutcome::Aborted(reason) => Some(reason),
    }
}

#[async_trait::async_trait]
impl TraceRepository for SqlTraceRepository {
    async fn append(&self, trace: TurnTrace) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO turn_trace
                 (id, tenant_id, customer_id, inbound_message, planner_latency_ms,
                  outcome_kind, outcome_detail, started_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&trace.id.0)
        .bind(&trace.tenant_id.0)
        .bind(&trace.customer_id.0)
        .bind(&trace.inbound_message)
        .bind(trace.planner_latency_ms as i64)
        .bind(trace.outcome.kind())
        .bind(outcome_detail(&trace.outcome))
        .bind(trace.started_at.to_rfc3339())
        .bind(trace.completed_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for call in &trace.tool_calls {
            let arguments = serde_json::to_string(&call.arguments)
                .map_err(|e| RepositoryError::Decode(format!("encode arguments: {e}")))?;
            sqlx::query(
                "INSERT INTO tool_call_trace
                     (turn_id, sequence, tool_name, arguments, result_status,
                      result_summary, latency_ms)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&trace.id.0)
            .bind(i64::from(call.sequence))
            .bind(&call.tool_name)
            .bind(arguments)
            .bind(call.result_status.as_str())
            .bind(&call.result_summary)
            .bind(call.latency_ms as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use sqlx::Row;

    use vendy_core::domain::customer::CustomerId;
    use vendy_core::domain::tenant::TenantId;
    use vendy_core::domain::trace::{
        ToolCallTrace, ToolResultStatus, TurnId, TurnOutcome, TurnTrace,
    };

    use super::SqlTraceRepository;
    use crate::repositories::TraceRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_trace(id: &str, calls: u32) -> TurnTrace {
        let now = Utc::now();
        TurnTrace {
            id: TurnId(id.to_string()),
            tenant_id: TenantId("t-1".to_string()),
            customer_id: CustomerId("5215550001".to_string()),
            inbound_message: "two sandwiches".to_string(),
            tool_calls: (0..calls)
                .map(|sequence| ToolCallTrace {
                    sequence,
                    tool_name: "search_product".to_string(),
                    arguments: serde_json::json!({"query": "sandwich"}),
                    result_status: ToolResultStatus::Ok,
                    result_summary: "1 match".to_string(),
                    latency_ms: 3,
                })
                .collect(),
            planner_latency_ms: 87,
            outcome: TurnOutcome::Reply("Added!".to_string()),
            started_at: now,
            completed_at: now,
        }
    }

    #[tokio::test]
    async fn append_writes_the_turn_and_its_tool_calls() {
        let pool = setup().await;
        let repo = SqlTraceRepository::new(pool.clone());

        repo.append(sample_trace("turn-1", 3)).await.expect("append");

        let turn_count = sqlx::query("SELECT COUNT(*) AS count FROM turn_trace")
            .fetch_one(&pool)
            .await
            .expect("count turns")
            .get::<i64, _>("count");
        let call_count = sqlx::query("SELECT COUNT(*) AS count FROM tool_call_trace")
            .fetch_one(&pool)
            .await
            .expect("count calls")
            .get::<i64, _>("count");
        assert_eq!(turn_count, 1);
        assert_eq!(call_count, 3);
    }

    #[tokio::test]
    async fn outcome_detail_carries_the_reply_text() {
        let pool = setup().await;
        let repo = SqlTraceRepository::new(pool.clone());

        repo.append(sample_trace("turn-1", 0)).await.expect("append");

        let row = sqlx::query("SELECT outcome_kind, outcome_detail FROM turn_trace")
            .fetch_one(&pool)
            .await
            .expect("load turn");
        assert_eq!(row.get::<String, _>("outcome_kind"), "reply");
        assert_eq!(row.get::<Option<String>, _>("outcome_detail"), Some("Added!".to_string()));
    }
}
