use std::path::Path;

use sqlx::SqlitePool;

pub mod attachments;
pub mod catalogo;
pub mod clientes;
pub mod db;
mod error;
pub mod historia;
pub mod mascotas;
pub mod migrate;
pub mod stats;
pub mod storage;
mod time;
pub mod turnos;
pub mod usuarios;
pub mod vacunas;

pub use error::{AppError, AppResult};
pub use storage::UploadStore;

/// Install the tracing subscriber. Filter defaults to `tomesvet=info` and
/// can be overridden with `TOMESVET_LOG`.
pub fn init_logging() {
    let _ = tracing_log::LogTracer::init();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("TOMESVET_LOG").unwrap_or_else(|_| "tomesvet=info,sqlx=warn".into()),
        )
        .json()
        .with_target(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .try_init();
}

pub struct Bootstrap {
    pub pool: SqlitePool,
    pub uploads: UploadStore,
    pub report: migrate::EvolutionReport,
}

/// Startup sequence: open the pool, bring the schema up to date, make sure
/// the upload root exists. Runs before any request handling; a failure here
/// is fatal and the process must not serve traffic.
pub async fn bootstrap(db_path: &Path, data_dir: &Path) -> anyhow::Result<Bootstrap> {
    let pool = db::open_sqlite_pool(db_path).await?;
    let report = migrate::run_schema_evolution(&pool).await?;
    let uploads = UploadStore::new(data_dir);
    uploads.ensure_root()?;
    tracing::info!(
        target = "tomesvet",
        event = "bootstrap_done",
        applied = report.applied.len(),
        skipped = report.skipped.len()
    );
    Ok(Bootstrap {
        pool,
        uploads,
        report,
    })
}
