use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use tokio_postgres::NoTls;

use crate::error::{AppError, AppResult};

const POOL_MAX_SIZE: usize = 16;

pub fn init_pool(database_url: &str) -> AppResult<Pool> {
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e| AppError::Config(format!("DATABASE_URL: {e}")))?;

    let manager = Manager::from_config(
        pg_config,
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );

    Pool::builder(manager)
        .max_size(POOL_MAX_SIZE)
        .build()
        .map_err(|e| AppError::StartServer(format!("db pool: {e}")))
}

/// Apply the schema at startup. The DDL is idempotent, so repeated starts
/// are safe.
pub async fn run_migrations(pool: &Pool) -> AppResult<()> {
    let client = pool.get().await?;
    client
        .batch_execute(include_str!("../migrations/0001_create_messages.sql"))
        .await?;

    tracing::info!("database migrations applied");
    Ok(())
}
