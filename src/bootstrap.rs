// Wires configuration to a concrete backend

use std::sync::Arc;

use crate::config::{ModerationConfig, StoreBackend};
use crate::db;
use crate::telemetry;
use crate::error::ModerationResult;
use crate::moderation::{
    DynModerationService, MemoryModerationStore, MemoryReviewCatalog, ModerationService,
    ModerationStore, PgModerationStore, PgReviewCatalog, ReviewCatalog,
};

/// Build a service for the configured backend
///
/// For `postgres` the pool is created and migrations are applied. When no
/// catalog is given, the backend's own review table is used (an empty
/// in-memory catalog for `memory`).
pub async fn build_service(
    config: &ModerationConfig,
    catalog: Option<Arc<dyn ReviewCatalog>>,
) -> ModerationResult<DynModerationService> {
    let (store, catalog): (Arc<dyn ModerationStore>, Arc<dyn ReviewCatalog>) = match config.backend
    {
        StoreBackend::Memory => {
            tracing::info!("Using in-memory moderation store");
            let catalog = catalog
                .unwrap_or_else(|| Arc::new(MemoryReviewCatalog::new()) as Arc<dyn ReviewCatalog>);
            (Arc::new(MemoryModerationStore::new()) as Arc<dyn ModerationStore>, catalog)
        }
        StoreBackend::Postgres => {
            let database = config
                .database
                .as_ref()
                .ok_or_else(|| sqlx::Error::Configuration("DATABASE_URL must be set".into()))?;
            let pool = db::create_pool(database).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("Using PostgreSQL moderation store");
            let catalog = catalog.unwrap_or_else(|| {
                Arc::new(PgReviewCatalog::new(pool.clone())) as Arc<dyn ReviewCatalog>
            });
            (Arc::new(PgModerationStore::new(pool)) as Arc<dyn ModerationStore>, catalog)
        }
    };

    Ok(ModerationService::new(store, catalog).with_duplicate_policy(config.duplicate_policy))
}

/// Install tracing with the configured filter, then build the service
pub async fn init(
    config: &ModerationConfig,
    catalog: Option<Arc<dyn ReviewCatalog>>,
) -> ModerationResult<DynModerationService> {
    if !telemetry::init_tracing(&config.log_filter) {
        tracing::debug!("Tracing subscriber already installed");
    }
    build_service(config, catalog).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModerationError;
    use crate::moderation::{DuplicateReportPolicy, Review, SubmitReportRequest};

    fn memory_config(policy: DuplicateReportPolicy) -> ModerationConfig {
        ModerationConfig {
            backend: StoreBackend::Memory,
            database: None,
            duplicate_policy: policy,
            log_filter: "debug".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_service_uses_given_catalog_and_policy() {
        let catalog = MemoryReviewCatalog::with_reviews(vec![Review {
            movie_title: "Heat".to_string(),
            user: "alice".to_string(),
            rating: Some(4.0),
            useful_votes: None,
            total_votes: None,
            report_count: None,
            title: "Tense".to_string(),
            body: "The bank scene holds up.".to_string(),
        }]);
        let service = build_service(
            &memory_config(DuplicateReportPolicy::RejectPending),
            Some(Arc::new(catalog)),
        )
        .await
        .unwrap();

        let request = || SubmitReportRequest {
            reason_type: "spam".to_string(),
            reason: None,
        };
        service
            .submit_report("Heat", "alice", "bob", request())
            .await
            .unwrap();
        let second = service.submit_report("Heat", "alice", "bob", request()).await;
        assert!(matches!(second, Err(ModerationError::DuplicateReport)));
    }

    #[tokio::test]
    async fn test_init_installs_tracing_once() {
        let config = memory_config(DuplicateReportPolicy::Allow);
        let service = init(&config, None).await.unwrap();
        assert!(service.list_reports(None).await.unwrap().is_empty());

        // The global subscriber is taken by now
        assert!(!telemetry::init_tracing(&config.log_filter));
        init(&config, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_memory_service_defaults_to_empty_catalog() {
        let service = build_service(&memory_config(DuplicateReportPolicy::Allow), None)
            .await
            .unwrap();

        let result = service
            .submit_report(
                "Heat",
                "alice",
                "bob",
                SubmitReportRequest {
                    reason_type: "spam".to_string(),
                    reason: None,
                },
            )
            .await;
        assert!(matches!(result, Err(ModerationError::NotFound { .. })));
    }
}
