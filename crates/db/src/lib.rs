//! Database layer: pool bootstrap, migrations, models, and repositories.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;

/// Shared connection pool type used across the workspace.
pub type DbPool = sqlx::PgPool;

/// Create a connection pool against `database_url`.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Cheap liveness probe used by startup and the health endpoint.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply embedded migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
