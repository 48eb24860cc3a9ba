use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::time::now_ms;
use crate::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewTurno {
    pub cliente_id: i64,
    pub mascota_id: i64,
    pub fecha: String,
    pub hora: Option<String>,
    pub motivo: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Turno {
    pub id: i64,
    pub cliente_id: i64,
    pub cliente_nombre: String,
    pub mascota_id: i64,
    pub mascota_nombre: String,
    pub fecha: String,
    pub hora: Option<String>,
    pub motivo: Option<String>,
    pub creado_en: i64,
}

pub async fn create_turno(pool: &SqlitePool, input: &NewTurno) -> AppResult<i64> {
    let res = sqlx::query(
        "INSERT INTO turnos (cliente_id, mascota_id, fecha, hora, motivo, creado_en) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(input.cliente_id)
    .bind(input.mascota_id)
    .bind(&input.fecha)
    .bind(&input.hora)
    .bind(&input.motivo)
    .bind(now_ms())
    .execute(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "create_turno"))?;
    Ok(res.last_insert_rowid())
}

pub async fn list_turnos(pool: &SqlitePool) -> AppResult<Vec<Turno>> {
    let rows = sqlx::query(
        "SELECT turnos.*, clientes.nombre AS cliente_nombre, mascotas.nombre AS mascota_nombre \
           FROM turnos \
           JOIN clientes ON clientes.id = turnos.cliente_id \
           JOIN mascotas ON mascotas.id = turnos.mascota_id \
          ORDER BY turnos.fecha DESC, turnos.hora DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "list_turnos"))?;

    rows.into_iter()
        .map(|row| {
            Ok(Turno {
                id: row.try_get("id")?,
                cliente_id: row.try_get("cliente_id")?,
                cliente_nombre: row.try_get("cliente_nombre")?,
                mascota_id: row.try_get("mascota_id")?,
                mascota_nombre: row.try_get("mascota_nombre")?,
                fecha: row.try_get("fecha")?,
                hora: row.try_get("hora")?,
                motivo: row.try_get("motivo")?,
                creado_en: row.try_get("creado_en")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(AppError::from)
}
