use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use thiserror::Error;

use crate::time::now_ms;
use crate::{AppError, AppResult};

/// Staff role. The list is intentionally finite; the column stores the
/// snake_case identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rol {
    Veterinario,
    Recepcionista,
    Admin,
}

impl Rol {
    pub const ALL: [Rol; 3] = [Rol::Veterinario, Rol::Recepcionista, Rol::Admin];

    pub const fn as_str(self) -> &'static str {
        match self {
            Rol::Veterinario => "veterinario",
            Rol::Recepcionista => "recepcionista",
            Rol::Admin => "admin",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid staff role: {value}")]
pub struct InvalidRol {
    pub value: String,
}

impl FromStr for Rol {
    type Err = InvalidRol;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Rol::ALL
            .into_iter()
            .find(|rol| rol.as_str() == value)
            .ok_or_else(|| InvalidRol {
                value: value.to_string(),
            })
    }
}

impl fmt::Display for Rol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUsuario {
    pub nombre: String,
    pub rol: Rol,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Usuario {
    pub id: i64,
    pub nombre: String,
    pub rol: String,
    pub email: Option<String>,
    pub creado_en: i64,
}

pub async fn create_usuario(pool: &SqlitePool, input: &NewUsuario) -> AppResult<i64> {
    let res = sqlx::query("INSERT INTO usuarios (nombre, rol, email, creado_en) VALUES (?1, ?2, ?3, ?4)")
        .bind(&input.nombre)
        .bind(input.rol.as_str())
        .bind(&input.email)
        .bind(now_ms())
        .execute(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "create_usuario"))?;
    Ok(res.last_insert_rowid())
}

pub async fn list_usuarios(pool: &SqlitePool) -> AppResult<Vec<Usuario>> {
    let rows = sqlx::query("SELECT * FROM usuarios ORDER BY id DESC")
        .fetch_all(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "list_usuarios"))?;

    rows.into_iter()
        .map(|row| {
            Ok(Usuario {
                id: row.try_get("id")?,
                nombre: row.try_get("nombre")?,
                rol: row.try_get("rol")?,
                email: row.try_get("email")?,
                creado_en: row.try_get("creado_en")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(AppError::from)
}
