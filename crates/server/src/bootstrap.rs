use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use vendy_agent::{
    CartStore, CatalogGateway, Flywheel, TracingNotifier, TurnLimits, TurnOrchestrator,
    TurnRecorder,
};
use vendy_core::catalog::{CatalogMatcher, DefaultMentionHeuristic};
use vendy_core::config::{AppConfig, ConfigError, LoadOptions};
use vendy_db::repositories::{
    SqlCartRepository, SqlCustomerRepository, SqlEscalationRepository, SqlProductRepository,
    SqlTenantRepository, SqlTraceRepository,
};
use vendy_db::{connect_from_config, migrations, DbPool};
use vendy_whatsapp::{MessageSender, NoopSender, WhatsAppClient};

use crate::llm::HttpPlanner;
use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_started", "starting application bootstrap");

    let db_pool = connect_from_config(&config.database)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "migrations_applied", "database migrations applied");

    let tenants = Arc::new(SqlTenantRepository::new(db_pool.clone()));
    let customers = Arc::new(SqlCustomerRepository::new(db_pool.clone()));
    let products = Arc::new(SqlProductRepository::new(db_pool.clone()));
    let carts = Arc::new(SqlCartRepository::new(db_pool.clone()));
    let escalations = Arc::new(SqlEscalationRepository::new(db_pool.clone()));
    let traces = Arc::new(SqlTraceRepository::new(db_pool.clone()));

    let gateway = Arc::new(CatalogGateway::new(
        products.clone(),
        escalations.clone(),
        CatalogMatcher::default(),
        Arc::new(DefaultMentionHeuristic),
        Arc::new(TracingNotifier),
    ));
    let cart_store = Arc::new(CartStore::new(carts, products.clone()));
    let flywheel = Arc::new(Flywheel::new(escalations, products.clone()));
    let recorder = Arc::new(TurnRecorder::new(traces));
    let planner = Arc::new(HttpPlanner::from_config(&config.llm));

    let limits = TurnLimits {
        max_tool_rounds: config.agent.max_tool_rounds,
        tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
        planner_timeout: Duration::from_secs(config.llm.timeout_secs),
    };
    let orchestrator = Arc::new(TurnOrchestrator::new(
        tenants,
        customers,
        gateway,
        cart_store,
        planner,
        recorder,
        limits,
    ));

    let sender: Arc<dyn MessageSender> = if config.whatsapp.enabled {
        Arc::new(WhatsAppClient::from_config(&config.whatsapp))
    } else {
        Arc::new(NoopSender)
    };
    info!(
        event_name = "outbound_channel_selected",
        mode = if config.whatsapp.enabled { "graph_api" } else { "noop" },
        "outbound message channel initialized"
    );

    let state = AppState {
        orchestrator,
        flywheel,
        products,
        sender,
        verify_token: config.whatsapp.verify_token.clone(),
        app_secret: config.whatsapp.app_secret.clone(),
    };

    Ok(Application { config, db_pool, state })
}

#[cfg(test)]
mod tests {
    use vendy_core::config::{ConfigOverrides, LoadOptions};

    use super::bootstrap;

    fn memory_options() -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:?cache=shared".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_applies_the_baseline_schema() {
        let app = bootstrap(memory_options()).await.expect("bootstrap");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master \
             WHERE type = 'table' AND name IN \
             ('tenant', 'product', 'cart', 'cart_line', 'inventory_escalation', 'turn_trace')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count tables");
        assert_eq!(table_count, 6);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_when_whatsapp_is_enabled_without_credentials() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                whatsapp_enabled: Some(true),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("whatsapp"));
    }
}
