//! Database schema migrations.

use sqlx::PgPool;
use tracing::info;

use sellsync_core::{AppError, AppResult, ErrorKind};

/// Applies all pending migrations from the workspace `migrations/` directory.
pub async fn run_migrations(pool: &PgPool) -> AppResult<()> {
    info!("Running database migrations");

    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Migration failed", e))?;

    info!("Database migrations complete");
    Ok(())
}
