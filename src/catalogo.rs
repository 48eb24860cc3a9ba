use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct Raza {
    pub id: i64,
    pub nombre: String,
    pub especie_id: i64,
    pub especie_nombre: String,
}

pub async fn create_especie(pool: &SqlitePool, nombre: &str) -> AppResult<i64> {
    let res = sqlx::query("INSERT INTO mascotas_especies (nombre) VALUES (?1)")
        .bind(nombre)
        .execute(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "create_especie"))?;
    Ok(res.last_insert_rowid())
}

/// Duplicate (nombre, especie_id) pairs surface as a constraint error.
pub async fn create_raza(pool: &SqlitePool, nombre: &str, especie_id: i64) -> AppResult<i64> {
    let res = sqlx::query("INSERT INTO mascotas_razas (nombre, especie_id) VALUES (?1, ?2)")
        .bind(nombre)
        .bind(especie_id)
        .execute(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "create_raza"))?;
    Ok(res.last_insert_rowid())
}

pub async fn list_razas(pool: &SqlitePool) -> AppResult<Vec<Raza>> {
    let rows = sqlx::query(
        "SELECT r.id, r.nombre, r.especie_id, e.nombre AS especie_nombre \
           FROM mascotas_razas r \
           JOIN mascotas_especies e ON e.id = r.especie_id \
          ORDER BY e.nombre, r.nombre",
    )
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "list_razas"))?;

    rows.into_iter()
        .map(|row| {
            Ok(Raza {
                id: row.try_get("id")?,
                nombre: row.try_get("nombre")?,
                especie_id: row.try_get("especie_id")?,
                especie_nombre: row.try_get("especie_nombre")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(AppError::from)
}
