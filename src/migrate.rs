use futures::future::BoxFuture;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{error, info, warn};

use crate::attachments::DEFAULT_DOCUMENT_LABEL;
use crate::{AppError, AppResult};

pub const ERR_SCHEMA_PROBE: &str = "SCHEMA/PROBE";
pub const ERR_SCHEMA_APPLY: &str = "SCHEMA/APPLY";
pub const ERR_SCHEMA_POSTCONDITION: &str = "SCHEMA/POSTCONDITION";

type StepFuture<'a, T> = BoxFuture<'a, Result<T, sqlx::Error>>;

/// One idempotent schema-evolution step.
///
/// `check` probes the connected database and reports whether the step still
/// needs to run; `apply` performs the structural change or backfill. Steps
/// run strictly in declaration order because later backfills depend on
/// earlier structural changes.
pub struct EvolutionStep {
    pub name: &'static str,
    check: for<'a> fn(&'a SqlitePool) -> StepFuture<'a, bool>,
    apply: for<'a> fn(&'a SqlitePool) -> StepFuture<'a, ()>,
}

pub static STEPS: &[EvolutionStep] = &[
    EvolutionStep {
        name: "baseline_tables",
        check: baseline_pending,
        apply: baseline_apply,
    },
    EvolutionStep {
        name: "vacunas_table",
        check: vacunas_pending,
        apply: vacunas_apply,
    },
    EvolutionStep {
        name: "vacunas_proxima_dosis",
        check: proxima_dosis_pending,
        apply: proxima_dosis_apply,
    },
    EvolutionStep {
        name: "historia_documento_columns",
        check: documento_columns_pending,
        apply: documento_columns_apply,
    },
    EvolutionStep {
        name: "historia_documentos_table",
        check: documentos_table_pending,
        apply: documentos_table_apply,
    },
    EvolutionStep {
        name: "historia_documentos_backfill",
        check: documentos_backfill_pending,
        apply: documentos_backfill_apply,
    },
    EvolutionStep {
        name: "especies_table",
        check: especies_pending,
        apply: especies_apply,
    },
    EvolutionStep {
        name: "razas_table",
        check: razas_pending,
        apply: razas_apply,
    },
    EvolutionStep {
        name: "mascotas_raza_id",
        check: raza_id_pending,
        apply: raza_id_apply,
    },
    EvolutionStep {
        name: "mascotas_raza_backfill",
        check: raza_backfill_pending,
        apply: raza_backfill_apply,
    },
];

#[derive(Debug, Serialize)]
pub struct EvolutionReport {
    pub applied: Vec<&'static str>,
    pub skipped: Vec<&'static str>,
    /// Pets whose free-text species/breed matched no catalog pair. Left
    /// NULL for operator review, never treated as a failure.
    pub mascotas_sin_raza: u64,
}

#[derive(Debug, Serialize)]
pub struct StepStatus {
    pub name: &'static str,
    pub pending: bool,
}

/// Bring the schema up to the shape the current code expects. Runs at
/// process start, before any request handling; safe to re-run, a no-op
/// after the first successful pass. Any failing step aborts the sequence
/// with no rollback.
pub async fn run_schema_evolution(pool: &SqlitePool) -> AppResult<EvolutionReport> {
    let mut applied = Vec::new();
    let mut skipped = Vec::new();

    for step in STEPS {
        if !check_step(pool, step).await? {
            info!(target = "tomesvet", event = "schema_step_skip", step = %step.name);
            skipped.push(step.name);
            continue;
        }

        info!(target = "tomesvet", event = "schema_step_apply", step = %step.name);
        (step.apply)(pool).await.map_err(|err| {
            error!(
                target = "tomesvet",
                event = "schema_step_error",
                step = %step.name,
                error = %err
            );
            AppError::new(ERR_SCHEMA_APPLY, "Schema evolution step failed")
                .with_context("step", step.name)
                .with_cause(AppError::from(err))
        })?;

        if check_step(pool, step).await? {
            return Err(
                AppError::new(ERR_SCHEMA_POSTCONDITION, "Step still pending after apply")
                    .with_context("step", step.name),
            );
        }
        applied.push(step.name);
    }

    let mascotas_sin_raza = count_unlinked_mascotas(pool).await?;
    if mascotas_sin_raza > 0 {
        warn!(
            target = "tomesvet",
            event = "raza_backfill_unmatched",
            count = mascotas_sin_raza
        );
    }

    Ok(EvolutionReport {
        applied,
        skipped,
        mascotas_sin_raza,
    })
}

/// Read-only view over every step's precondition probe.
pub async fn evolution_status(pool: &SqlitePool) -> AppResult<Vec<StepStatus>> {
    let mut out = Vec::with_capacity(STEPS.len());
    for step in STEPS {
        out.push(StepStatus {
            name: step.name,
            pending: check_step(pool, step).await?,
        });
    }
    Ok(out)
}

async fn check_step(pool: &SqlitePool, step: &EvolutionStep) -> AppResult<bool> {
    (step.check)(pool).await.map_err(|err| {
        AppError::new(ERR_SCHEMA_PROBE, "Schema probe failed")
            .with_context("step", step.name)
            .with_cause(AppError::from(err))
    })
}

/// Pets still without a breed link after the reconciliation pass.
pub async fn count_unlinked_mascotas(pool: &SqlitePool) -> AppResult<u64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM mascotas \
         WHERE raza_id IS NULL AND raza IS NOT NULL AND raza <> ''",
    )
    .fetch_one(pool)
    .await
    .map_err(AppError::from)?;
    Ok(count as u64)
}

// Catalog probes. Scoped to the connected database; table and column names
// are internal constants, never caller input.

async fn table_exists(pool: &SqlitePool, table: &str) -> Result<bool, sqlx::Error> {
    let row: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")
            .bind(table)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

async fn column_exists(pool: &SqlitePool, table: &str, column: &str) -> Result<bool, sqlx::Error> {
    let sql = format!("SELECT 1 FROM pragma_table_info('{table}') WHERE name = '{column}'");
    let row: Option<i64> = sqlx::query_scalar(&sql).fetch_optional(pool).await?;
    Ok(row.is_some())
}

// Step 1: the first application snapshot's tables.

const BASELINE_TABLES: &[&str] = &["clientes", "mascotas", "usuarios", "historia_clinica", "turnos"];

fn baseline_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move {
        for table in BASELINE_TABLES {
            if !table_exists(pool, table).await? {
                return Ok(true);
            }
        }
        Ok(false)
    })
}

fn baseline_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        let statements = [
            "CREATE TABLE IF NOT EXISTS clientes (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               nombre TEXT NOT NULL,\
               telefono TEXT,\
               email TEXT,\
               direccion TEXT,\
               creado_en INTEGER NOT NULL\
             )",
            "CREATE TABLE IF NOT EXISTS mascotas (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               nombre TEXT NOT NULL,\
               especie TEXT,\
               raza TEXT,\
               fecha_nacimiento TEXT,\
               cliente_id INTEGER NOT NULL REFERENCES clientes(id) ON DELETE CASCADE,\
               creado_en INTEGER NOT NULL\
             )",
            "CREATE TABLE IF NOT EXISTS usuarios (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               nombre TEXT NOT NULL,\
               rol TEXT NOT NULL,\
               email TEXT,\
               creado_en INTEGER NOT NULL\
             )",
            "CREATE TABLE IF NOT EXISTS historia_clinica (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               mascota_id INTEGER NOT NULL REFERENCES mascotas(id) ON DELETE CASCADE,\
               fecha TEXT NOT NULL,\
               motivo TEXT,\
               diagnostico TEXT,\
               tratamiento TEXT,\
               creado_en INTEGER NOT NULL\
             )",
            "CREATE TABLE IF NOT EXISTS turnos (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               cliente_id INTEGER NOT NULL REFERENCES clientes(id) ON DELETE CASCADE,\
               mascota_id INTEGER NOT NULL REFERENCES mascotas(id) ON DELETE CASCADE,\
               fecha TEXT NOT NULL,\
               hora TEXT,\
               motivo TEXT,\
               creado_en INTEGER NOT NULL\
             )",
        ];
        for sql in statements {
            sqlx::query(sql).execute(pool).await?;
        }
        Ok(())
    })
}

// Step 2: vaccinations, as they first shipped (no next-dose column yet).

fn vacunas_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move { Ok(!table_exists(pool, "vacunas").await?) })
}

fn vacunas_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS vacunas (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               mascota_id INTEGER NOT NULL REFERENCES mascotas(id) ON DELETE CASCADE,\
               producto TEXT NOT NULL,\
               tipo TEXT NOT NULL,\
               fecha_aplicacion TEXT,\
               creado_en INTEGER NOT NULL\
             )",
        )
        .execute(pool)
        .await?;
        Ok(())
    })
}

// Step 3: next-dose-due scheduling. Nullable so existing rows stay valid.

fn proxima_dosis_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move { Ok(!column_exists(pool, "vacunas", "proxima_dosis").await?) })
}

fn proxima_dosis_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        sqlx::query("ALTER TABLE vacunas ADD COLUMN proxima_dosis TEXT")
            .execute(pool)
            .await?;
        Ok(())
    })
}

// Step 4: the legacy single-attachment column pair. Each column is guarded
// individually so a rerun after a mid-step crash stays safe.

fn documento_columns_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move {
        Ok(!column_exists(pool, "historia_clinica", "documento_nombre").await?
            || !column_exists(pool, "historia_clinica", "documento_ruta").await?)
    })
}

fn documento_columns_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        for column in ["documento_nombre", "documento_ruta"] {
            if column_exists(pool, "historia_clinica", column).await? {
                continue;
            }
            let sql = format!("ALTER TABLE historia_clinica ADD COLUMN {column} TEXT");
            sqlx::query(&sql).execute(pool).await?;
        }
        Ok(())
    })
}

// Step 5: normalized many-to-one documents.

fn documentos_table_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move { Ok(!table_exists(pool, "historia_documentos").await?) })
}

fn documentos_table_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS historia_documentos (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               historia_id INTEGER NOT NULL REFERENCES historia_clinica(id) ON DELETE CASCADE,\
               nombre_original TEXT NOT NULL,\
               ruta_publica TEXT NOT NULL,\
               creado_en INTEGER NOT NULL\
             )",
        )
        .execute(pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_historia_documentos_historia \
             ON historia_documentos(historia_id)",
        )
        .execute(pool)
        .await?;
        Ok(())
    })
}

// Step 6: mirror the legacy pair into the document collection. After this
// runs, the legacy columns are no longer the source of truth for new
// writes. Skips already-mirrored records so a mid-way rerun stays clean.

const UNMIRRORED_FILTER: &str = "h.documento_ruta IS NOT NULL AND h.documento_ruta <> '' \
     AND NOT EXISTS (SELECT 1 FROM historia_documentos d \
                      WHERE d.historia_id = h.id AND d.ruta_publica = h.documento_ruta)";

fn documentos_backfill_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move {
        // Earlier structural steps may not have run yet when this probe is
        // used read-only; without them the backfill is by definition pending.
        if !table_exists(pool, "historia_documentos").await?
            || !column_exists(pool, "historia_clinica", "documento_ruta").await?
        {
            return Ok(true);
        }
        let sql = format!("SELECT COUNT(*) FROM historia_clinica h WHERE {UNMIRRORED_FILTER}");
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        Ok(count > 0)
    })
}

fn documentos_backfill_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        // Mirrored rows keep the record's own creation time so the
        // newest-first listing stays meaningful.
        let sql = format!(
            "INSERT INTO historia_documentos (historia_id, nombre_original, ruta_publica, creado_en) \
             SELECT h.id, \
                    COALESCE(NULLIF(TRIM(h.documento_nombre), ''), '{DEFAULT_DOCUMENT_LABEL}'), \
                    h.documento_ruta, \
                    h.creado_en \
               FROM historia_clinica h WHERE {UNMIRRORED_FILTER}"
        );
        let res = sqlx::query(&sql).execute(pool).await?;
        info!(
            target = "tomesvet",
            event = "documentos_backfill",
            mirrored = res.rows_affected()
        );
        Ok(())
    })
}

// Steps 7-8: the species/breed catalog. A breed belongs to exactly one
// species; the pair is unique.

fn especies_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move { Ok(!table_exists(pool, "mascotas_especies").await?) })
}

fn especies_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS mascotas_especies (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               nombre TEXT NOT NULL UNIQUE\
             )",
        )
        .execute(pool)
        .await?;
        Ok(())
    })
}

fn razas_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move { Ok(!table_exists(pool, "mascotas_razas").await?) })
}

fn razas_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS mascotas_razas (\
               id INTEGER PRIMARY KEY AUTOINCREMENT,\
               nombre TEXT NOT NULL,\
               especie_id INTEGER NOT NULL REFERENCES mascotas_especies(id) ON DELETE CASCADE,\
               UNIQUE(nombre, especie_id)\
             )",
        )
        .execute(pool)
        .await?;
        Ok(())
    })
}

// Step 9: explicit breed link on pets. Nullable, existing rows stay valid.

fn raza_id_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move { Ok(!column_exists(pool, "mascotas", "raza_id").await?) })
}

fn raza_id_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        sqlx::query("ALTER TABLE mascotas ADD COLUMN raza_id INTEGER REFERENCES mascotas_razas(id)")
            .execute(pool)
            .await?;
        Ok(())
    })
}

// Step 10: best-effort reconciliation of the free-text (especie, raza) pair
// against the catalog. Only rows that still lack a link and have a match
// are touched; everything else stays NULL.

const MATCHABLE_FILTER: &str = "raza_id IS NULL \
     AND EXISTS (SELECT 1 FROM mascotas_razas r \
                  JOIN mascotas_especies e ON e.id = r.especie_id \
                 WHERE r.nombre = mascotas.raza AND e.nombre = mascotas.especie)";

fn raza_backfill_pending(pool: &SqlitePool) -> StepFuture<'_, bool> {
    Box::pin(async move {
        if !table_exists(pool, "mascotas_razas").await?
            || !column_exists(pool, "mascotas", "raza_id").await?
        {
            return Ok(true);
        }
        let sql = format!("SELECT COUNT(*) FROM mascotas WHERE {MATCHABLE_FILTER}");
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(pool).await?;
        Ok(count > 0)
    })
}

fn raza_backfill_apply(pool: &SqlitePool) -> StepFuture<'_, ()> {
    Box::pin(async move {
        let sql = format!(
            "UPDATE mascotas SET raza_id = \
               (SELECT r.id FROM mascotas_razas r \
                 JOIN mascotas_especies e ON e.id = r.especie_id \
                WHERE r.nombre = mascotas.raza AND e.nombre = mascotas.especie) \
             WHERE {MATCHABLE_FILTER}"
        );
        let res = sqlx::query(&sql).execute(pool).await?;
        info!(
            target = "tomesvet",
            event = "raza_backfill",
            linked = res.rows_affected()
        );
        Ok(())
    })
}
