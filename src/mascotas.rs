use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::time::now_ms;
use crate::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewMascota {
    pub nombre: String,
    pub especie: Option<String>,
    pub raza: Option<String>,
    pub fecha_nacimiento: Option<String>,
    pub cliente_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Mascota {
    pub id: i64,
    pub nombre: String,
    pub especie: Option<String>,
    pub raza: Option<String>,
    pub fecha_nacimiento: Option<String>,
    pub cliente_id: i64,
    pub cliente_nombre: String,
    /// Explicit breed link; NULL until the free-text pair matches the
    /// catalog.
    pub raza_id: Option<i64>,
    pub creado_en: i64,
}

pub async fn create_mascota(pool: &SqlitePool, input: &NewMascota) -> AppResult<i64> {
    let res = sqlx::query(
        "INSERT INTO mascotas (nombre, especie, raza, fecha_nacimiento, cliente_id, creado_en) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(&input.nombre)
    .bind(&input.especie)
    .bind(&input.raza)
    .bind(&input.fecha_nacimiento)
    .bind(input.cliente_id)
    .bind(now_ms())
    .execute(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "create_mascota"))?;
    Ok(res.last_insert_rowid())
}

pub async fn list_mascotas(pool: &SqlitePool) -> AppResult<Vec<Mascota>> {
    let rows = sqlx::query(
        "SELECT mascotas.*, clientes.nombre AS cliente_nombre \
           FROM mascotas \
           JOIN clientes ON clientes.id = mascotas.cliente_id \
          ORDER BY mascotas.id DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "list_mascotas"))?;

    rows.into_iter()
        .map(|row| {
            Ok(Mascota {
                id: row.try_get("id")?,
                nombre: row.try_get("nombre")?,
                especie: row.try_get("especie")?,
                raza: row.try_get("raza")?,
                fecha_nacimiento: row.try_get("fecha_nacimiento")?,
                cliente_id: row.try_get("cliente_id")?,
                cliente_nombre: row.try_get("cliente_nombre")?,
                raza_id: row.try_get("raza_id")?,
                creado_en: row.try_get("creado_en")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(AppError::from)
}
