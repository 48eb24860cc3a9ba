use serde::Serialize;
use sqlx::SqlitePool;

use crate::{AppError, AppResult};

/// Record counts shown on the landing page.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardCounts {
    pub clientes: i64,
    pub mascotas: i64,
    pub usuarios: i64,
    pub historias: i64,
    pub turnos: i64,
}

pub async fn dashboard_counts(pool: &SqlitePool) -> AppResult<DashboardCounts> {
    Ok(DashboardCounts {
        clientes: count(pool, "clientes").await?,
        mascotas: count(pool, "mascotas").await?,
        usuarios: count(pool, "usuarios").await?,
        historias: count(pool, "historia_clinica").await?,
        turnos: count(pool, "turnos").await?,
    })
}

async fn count(pool: &SqlitePool, table: &str) -> AppResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM {table}");
    sqlx::query_scalar(&sql)
        .fetch_one(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("table", table.to_string()))
}
