use std::path::PathBuf;

use sqlx_core::migrate::{MigrateError, Migrator};

const MIGRATIONS_DIR_ENV: &str = "MIGRATIONS_DIR";
const MIGRATIONS_DIR_CANDIDATES: [&str; 2] = ["server/migrations", "./migrations"];

/// `MIGRATIONS_DIR` wins; otherwise the first existing candidate, so the binary works from
/// the workspace root or from `server/`.
fn migrations_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(MIGRATIONS_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir.trim());
    }
    MIGRATIONS_DIR_CANDIDATES
        .iter()
        .map(PathBuf::from)
        .find(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(MIGRATIONS_DIR_CANDIDATES[1]))
}

pub async fn run(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    let dir = migrations_dir();
    let migrator = Migrator::new(dir.as_path()).await?;
    tracing::debug!(dir = %dir.display(), count = migrator.iter().count(), "applying migrations");
    migrator.run(pool).await
}
