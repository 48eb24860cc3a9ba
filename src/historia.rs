use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::attachments::{self, AttachmentUpload};
use crate::storage::UploadStore;
use crate::time::now_ms;
use crate::{AppError, AppResult};

pub const ERR_HISTORIA_NOT_FOUND: &str = "HISTORIA/NOT_FOUND";

#[derive(Debug, Clone, Deserialize)]
pub struct NewHistoria {
    pub mascota_id: i64,
    pub fecha: String,
    pub motivo: Option<String>,
    pub diagnostico: Option<String>,
    pub tratamiento: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Historia {
    pub id: i64,
    pub mascota_id: i64,
    pub mascota_nombre: String,
    pub fecha: String,
    pub motivo: Option<String>,
    pub diagnostico: Option<String>,
    pub tratamiento: Option<String>,
    pub creado_en: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Documento {
    pub id: i64,
    pub historia_id: i64,
    pub nombre_original: String,
    pub ruta_publica: String,
    pub creado_en: i64,
}

/// Create a visit record, with an optional PDF attachment. The attachment is
/// validated before anything is written; when present, the file goes to disk
/// first and both inserts share one transaction.
pub async fn create_record(
    pool: &SqlitePool,
    store: &UploadStore,
    input: &NewHistoria,
    attachment: Option<&AttachmentUpload>,
) -> AppResult<i64> {
    let pdf = attachments::decode_optional(attachment)?;
    let stored = match &pdf {
        Some(pdf) => Some(store.store_pdf(&pdf.bytes)?),
        None => None,
    };

    let now = now_ms();
    let mut tx = pool.begin().await.map_err(begin_err)?;
    let res = sqlx::query(
        "INSERT INTO historia_clinica (mascota_id, fecha, motivo, diagnostico, tratamiento, creado_en) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    )
    .bind(input.mascota_id)
    .bind(&input.fecha)
    .bind(&input.motivo)
    .bind(&input.diagnostico)
    .bind(&input.tratamiento)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "create_record"))?;
    let historia_id = res.last_insert_rowid();

    if let (Some(pdf), Some(stored)) = (&pdf, &stored) {
        sqlx::query(
            "INSERT INTO historia_documentos (historia_id, nombre_original, ruta_publica, creado_en) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(historia_id)
        .bind(pdf.display_name())
        .bind(&stored.public_path)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "create_record_document"))?;
    }

    tx.commit()
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "create_record_commit"))?;

    info!(
        target = "tomesvet",
        event = "historia_created",
        id = historia_id,
        with_document = stored.is_some()
    );
    Ok(historia_id)
}

/// Attach one more PDF to an existing record. The attachment is mandatory
/// here, and the owning record must exist before the file is written.
pub async fn add_document(
    pool: &SqlitePool,
    store: &UploadStore,
    historia_id: i64,
    attachment: Option<&AttachmentUpload>,
) -> AppResult<Documento> {
    let pdf = attachments::decode_required(attachment)?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM historia_clinica WHERE id = ?1")
        .bind(historia_id)
        .fetch_optional(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "add_document"))?;
    if exists.is_none() {
        return Err(AppError::new(ERR_HISTORIA_NOT_FOUND, "Clinical record not found")
            .with_context("historia_id", historia_id.to_string()));
    }

    let stored = store.store_pdf(&pdf.bytes)?;
    let now = now_ms();
    let res = sqlx::query(
        "INSERT INTO historia_documentos (historia_id, nombre_original, ruta_publica, creado_en) \
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(historia_id)
    .bind(pdf.display_name())
    .bind(&stored.public_path)
    .bind(now)
    .execute(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "add_document_insert"))?;

    info!(
        target = "tomesvet",
        event = "documento_added",
        historia_id = historia_id,
        file = %stored.file_name
    );
    Ok(Documento {
        id: res.last_insert_rowid(),
        historia_id,
        nombre_original: pdf.display_name().to_string(),
        ruta_publica: stored.public_path,
        creado_en: now,
    })
}

/// Documents for one record, newest first. Purely additive history; ties on
/// creation time fall back to insertion order.
pub async fn list_documents(pool: &SqlitePool, historia_id: i64) -> AppResult<Vec<Documento>> {
    let rows = sqlx::query(
        "SELECT id, historia_id, nombre_original, ruta_publica, creado_en \
           FROM historia_documentos WHERE historia_id = ?1 \
          ORDER BY creado_en DESC, id DESC",
    )
    .bind(historia_id)
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "list_documents"))?;

    rows.into_iter()
        .map(|row| {
            Ok(Documento {
                id: row.try_get("id")?,
                historia_id: row.try_get("historia_id")?,
                nombre_original: row.try_get("nombre_original")?,
                ruta_publica: row.try_get("ruta_publica")?,
                creado_en: row.try_get("creado_en")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(AppError::from)
}

pub async fn list_records(pool: &SqlitePool) -> AppResult<Vec<Historia>> {
    let rows = sqlx::query(
        "SELECT historia_clinica.*, mascotas.nombre AS mascota_nombre \
           FROM historia_clinica \
           JOIN mascotas ON mascotas.id = historia_clinica.mascota_id \
          ORDER BY historia_clinica.fecha DESC",
    )
    .fetch_all(pool)
    .await
    .map_err(|err| AppError::from(err).with_context("operation", "list_records"))?;

    rows.into_iter()
        .map(|row| {
            Ok(Historia {
                id: row.try_get("id")?,
                mascota_id: row.try_get("mascota_id")?,
                mascota_nombre: row.try_get("mascota_nombre")?,
                fecha: row.try_get("fecha")?,
                motivo: row.try_get("motivo")?,
                diagnostico: row.try_get("diagnostico")?,
                tratamiento: row.try_get("tratamiento")?,
                creado_en: row.try_get("creado_en")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(AppError::from)
}

/// Delete a record; its documents go with it via the cascade.
pub async fn delete_record(pool: &SqlitePool, historia_id: i64) -> AppResult<()> {
    let res = sqlx::query("DELETE FROM historia_clinica WHERE id = ?1")
        .bind(historia_id)
        .execute(pool)
        .await
        .map_err(|err| AppError::from(err).with_context("operation", "delete_record"))?;
    if res.rows_affected() == 0 {
        return Err(AppError::new(ERR_HISTORIA_NOT_FOUND, "Clinical record not found")
            .with_context("historia_id", historia_id.to_string()));
    }
    Ok(())
}

fn begin_err(err: sqlx::Error) -> AppError {
    AppError::from(err).with_context("operation", "begin_tx")
}
