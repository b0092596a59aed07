use std::sync::Arc;

use leaveflow_cache::{CacheStore, Caches};
use leaveflow_core::config::{AppConfig, ConfigError};
use leaveflow_core::ports::{CacheError, EmployeeDirectory, EmployeeStore};
use leaveflow_core::services::{EmployeeService, LeaveService};
use leaveflow_db::repositories::{SqlEmployeeRepository, SqlLeaveRepository};
use leaveflow_db::{connect, migrations, DbPool};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub cache: Arc<dyn CacheStore>,
    pub employees: Arc<EmployeeService>,
    pub leaves: Arc<LeaveService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("cache connection failed: {0}")]
    Cache(#[source] CacheError),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        cache_backend = config.cache.backend.as_str(),
        "starting application bootstrap"
    );

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let cache = leaveflow_cache::connect(&config.cache).await.map_err(BootstrapError::Cache)?;
    info!(
        event_name = "system.bootstrap.cache_connected",
        correlation_id = "bootstrap",
        cache_backend = cache.backend_name(),
        "cache backend ready"
    );

    let caches = Caches::over(cache.clone(), &config.cache);
    let employee_repo = Arc::new(SqlEmployeeRepository::new(db_pool.clone()));
    let directory: Arc<dyn EmployeeDirectory> = employee_repo.clone();
    let employee_store: Arc<dyn EmployeeStore> = employee_repo;
    let leave_repo = Arc::new(SqlLeaveRepository::new(db_pool.clone()));

    Ok(Application {
        config,
        db_pool,
        cache,
        employees: Arc::new(EmployeeService::new(employee_store, caches.employees)),
        leaves: Arc::new(LeaveService::new(directory, leave_repo, caches.leaves)),
    })
}
