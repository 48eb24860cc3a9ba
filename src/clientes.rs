use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::time::now_ms;
use crate::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NewCliente {
    pub nombre: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub direccion: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Cliente {
    pub id: i64,
    pub nombre: String,
    pub telefono: Option<String>,
    pub email: Option<String>,
    pub direccion: Option<String>,
    pub creado_en: i64,
}

pub async fn create_cliente(pool: &SqlitePool, input: &NewCliente) -> AppResult<i64> {
    let res = sqlx::query(
        "INSERT INTO clientes (nombre, telefono, email, direccion, creado_en) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(&input.nombre)
    .bind(&input.telefono)
    .bind(&input.email)
    .bind(&input.direccion)
    .bind(now_ms())
    .execute(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "create_cliente"))?;
    Ok(res.last_insert_rowid())
}

pub async fn list_clientes(pool: &SqlitePool) -> AppResult<Vec<Cliente>> {
    let rows = sqlx::query("SELECT * FROM clientes ORDER BY id DESC")
        .fetch_all(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "list_clientes"))?;

    rows.into_iter()
        .map(|row| {
            Ok(Cliente {
                id: row.try_get("id")?,
                nombre: row.try_get("nombre")?,
                telefono: row.try_get("telefono")?,
                email: row.try_get("email")?,
                direccion: row.try_get("direccion")?,
                creado_en: row.try_get("creado_en")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(AppError::from)
}
