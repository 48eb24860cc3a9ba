use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::time::now_ms;
use crate::{AppError, AppResult};

pub const ERR_VACUNA_NOT_FOUND: &str = "VACUNA/NOT_FOUND";

#[derive(Debug, Clone, Deserialize)]
pub struct NewVacuna {
    pub mascota_id: i64,
    pub producto: String,
    pub tipo: String,
    pub fecha_aplicacion: Option<String>,
    pub proxima_dosis: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vacuna {
    pub id: i64,
    pub mascota_id: i64,
    pub producto: String,
    pub tipo: String,
    pub fecha_aplicacion: Option<String>,
    pub proxima_dosis: Option<String>,
    pub creado_en: i64,
}

/// Register a vaccination. Only the most recent scheduling for a given
/// (pet, product, type) triple is meaningful, so setting proxima_dosis
/// clears it on every sibling row. Clear and insert share one transaction.
pub async fn create_vacuna(pool: &SqlitePool, input: &NewVacuna) -> AppResult<i64> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "create_vacuna"))?;

    if input.proxima_dosis.is_some() {
        let res = sqlx::query(
            "UPDATE vacunas SET proxima_dosis = NULL \
             WHERE mascota_id = ?1 AND producto = ?2 AND tipo = ?3 \
               AND proxima_dosis IS NOT NULL",
        )
        .bind(input.mascota_id)
        .bind(&input.producto)
        .bind(&input.tipo)
        .execute(&mut *tx)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "clear_siblings"))?;
        if res.rows_affected() > 0 {
            info!(
                target = "tomesvet",
                event = "proxima_dosis_cleared",
                mascota_id = input.mascota_id,
                cleared = res.rows_affected()
            );
        }
    }

    let res = sqlx::query(
        "INSERT INTO vacunas (mascota_id, producto, tipo, fecha_aplicacion, proxima_dosis, creado_en) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(input.mascota_id)
    .bind(&input.producto)
    .bind(&input.tipo)
    .bind(&input.fecha_aplicacion)
    .bind(&input.proxima_dosis)
    .bind(now_ms())
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "insert_vacuna"))?;
    let id = res.last_insert_rowid();

    tx.commit()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "create_vacuna_commit"))?;
    Ok(id)
}

/// Update a vaccination's scheduling fields. Sibling clearing excludes the
/// row being updated.
pub async fn update_vacuna(
    pool: &SqlitePool,
    id: i64,
    fecha_aplicacion: Option<&str>,
    proxima_dosis: Option<&str>,
) -> AppResult<()> {
    let mut tx = pool
        .begin()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "update_vacuna"))?;

    let row = sqlx::query("SELECT mascota_id, producto, tipo FROM vacunas WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "load_vacuna"))?;
    let row = row.ok_or_else(|| {
        AppError::new(ERR_VACUNA_NOT_FOUND, "Vaccination not found")
            .with_context("id", id.to_string())
    })?;
    let mascota_id: i64 = row.try_get("mascota_id").map_err(AppError::from)?;
    let producto: String = row.try_get("producto").map_err(AppError::from)?;
    let tipo: String = row.try_get("tipo").map_err(AppError::from)?;

    if proxima_dosis.is_some() {
        sqlx::query(
            "UPDATE vacunas SET proxima_dosis = NULL \
             WHERE mascota_id = ?1 AND producto = ?2 AND tipo = ?3 \
               AND id <> ?4 AND proxima_dosis IS NOT NULL",
        )
        .bind(mascota_id)
        .bind(&producto)
        .bind(&tipo)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "clear_siblings"))?;
    }

    sqlx::query("UPDATE vacunas SET fecha_aplicacion = ?1, proxima_dosis = ?2 WHERE id = ?3")
        .bind(fecha_aplicacion)
        .bind(proxima_dosis)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "update_vacuna_row"))?;

    tx.commit()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "update_vacuna_commit"))?;
    Ok(())
}

pub async fn list_vacunas(pool: &SqlitePool, mascota_id: i64) -> AppResult<Vec<Vacuna>> {
    let rows = sqlx::query(
        "SELECT id, mascota_id, producto, tipo, fecha_aplicacion, proxima_dosis, creado_en \
           FROM vacunas WHERE mascota_id = ?1 \
          ORDER BY fecha_aplicacion DESC, id DESC",
    )
    .bind(mascota_id)
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "list_vacunas"))?;

    rows.into_iter()
        .map(|row| {
            Ok(Vacuna {
                id: row.try_get("id")?,
                mascota_id: row.try_get("mascota_id")?,
                producto: row.try_get("producto")?,
                tipo: row.try_get("tipo")?,
                fecha_aplicacion: row.try_get("fecha_aplicacion")?,
                proxima_dosis: row.try_get("proxima_dosis")?,
                creado_en: row.try_get("creado_en")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(AppError::from)
}
