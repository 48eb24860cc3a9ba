#![allow(clippy::unwrap_used, clippy::expect_used)]

mod util;

use sqlx::{Row, SqlitePool};
use tomesvet::catalogo;
use tomesvet::mascotas::{self, NewMascota};
use tomesvet::migrate::{self, STEPS};

async fn catalog_dump(pool: &SqlitePool) -> Vec<(String, String)> {
    let rows = sqlx::query(
        "SELECT name, sql FROM sqlite_master WHERE sql IS NOT NULL ORDER BY name",
    )
    .fetch_all(pool)
    .await
    .expect("dump sqlite_master");
    rows.into_iter()
        .map(|row| {
            (
                row.get::<String, _>("name"),
                row.get::<String, _>("sql"),
            )
        })
        .collect()
}

#[tokio::test]
async fn fresh_database_applies_structural_steps_and_rerun_is_noop() {
    let pool = util::temp_pool().await;

    let report = migrate::run_schema_evolution(&pool).await.expect("first run");
    // Both backfills have nothing to do on an empty database.
    assert_eq!(report.applied.len(), STEPS.len() - 2);
    assert_eq!(
        report.skipped,
        vec!["historia_documentos_backfill", "mascotas_raza_backfill"]
    );
    assert_eq!(report.mascotas_sin_raza, 0);

    let after_first = catalog_dump(&pool).await;

    let rerun = migrate::run_schema_evolution(&pool).await.expect("second run");
    assert!(rerun.applied.is_empty());
    assert_eq!(rerun.skipped.len(), STEPS.len());
    assert_eq!(catalog_dump(&pool).await, after_first);
}

#[tokio::test]
async fn status_reports_every_step_pending_then_present() {
    let pool = util::temp_pool().await;

    let before = migrate::evolution_status(&pool).await.expect("status");
    assert!(before.iter().all(|s| s.pending));

    migrate::run_schema_evolution(&pool).await.expect("evolve");

    let after = migrate::evolution_status(&pool).await.expect("status");
    assert!(after.iter().all(|s| !s.pending));
}

/// A database left behind by an earlier snapshot of the application: all
/// five baseline tables, the legacy attachment pair inline, and no
/// normalized document table yet.
async fn build_legacy_database(pool: &SqlitePool) {
    let statements = [
        "CREATE TABLE clientes (\
           id INTEGER PRIMARY KEY AUTOINCREMENT,\
           nombre TEXT NOT NULL,\
           telefono TEXT,\
           email TEXT,\
           direccion TEXT,\
           creado_en INTEGER NOT NULL\
         )",
        "CREATE TABLE mascotas (\
           id INTEGER PRIMARY KEY AUTOINCREMENT,\
           nombre TEXT NOT NULL,\
           especie TEXT,\
           raza TEXT,\
           fecha_nacimiento TEXT,\
           cliente_id INTEGER NOT NULL REFERENCES clientes(id) ON DELETE CASCADE,\
           creado_en INTEGER NOT NULL\
         )",
        "CREATE TABLE usuarios (\
           id INTEGER PRIMARY KEY AUTOINCREMENT,\
           nombre TEXT NOT NULL,\
           rol TEXT NOT NULL,\
           email TEXT,\
           creado_en INTEGER NOT NULL\
         )",
        "CREATE TABLE historia_clinica (\
           id INTEGER PRIMARY KEY AUTOINCREMENT,\
           mascota_id INTEGER NOT NULL REFERENCES mascotas(id) ON DELETE CASCADE,\
           fecha TEXT NOT NULL,\
           motivo TEXT,\
           diagnostico TEXT,\
           tratamiento TEXT,\
           creado_en INTEGER NOT NULL,\
           documento_nombre TEXT,\
           documento_ruta TEXT\
         )",
        "CREATE TABLE turnos (\
           id INTEGER PRIMARY KEY AUTOINCREMENT,\
           cliente_id INTEGER NOT NULL REFERENCES clientes(id) ON DELETE CASCADE,\
           mascota_id INTEGER NOT NULL REFERENCES mascotas(id) ON DELETE CASCADE,\
           fecha TEXT NOT NULL,\
           hora TEXT,\
           motivo TEXT,\
           creado_en INTEGER NOT NULL\
         )",
        "INSERT INTO clientes (nombre, creado_en) VALUES ('Ana Torres', 1000)",
        "INSERT INTO mascotas (nombre, especie, raza, cliente_id, creado_en) \
         VALUES ('Rocky', 'Perro', 'Caniche', 1, 1000)",
        "INSERT INTO historia_clinica \
           (mascota_id, fecha, motivo, creado_en, documento_nombre, documento_ruta) \
         VALUES (1, '2025-06-01', 'Radiografia', 2000, 'radiografia.pdf', \
                 '/uploads/historia-clinica/1717000000000-aaaa1111.pdf')",
        "INSERT INTO historia_clinica \
           (mascota_id, fecha, motivo, creado_en, documento_nombre, documento_ruta) \
         VALUES (1, '2025-07-10', 'Analisis', 3000, '', \
                 '/uploads/historia-clinica/1720000000000-bbbb2222.pdf')",
        "INSERT INTO historia_clinica (mascota_id, fecha, motivo, creado_en) \
         VALUES (1, '2025-08-20', 'Control', 4000)",
    ];
    for sql in statements {
        sqlx::query(sql).execute(pool).await.expect("legacy setup");
    }
}

#[tokio::test]
async fn legacy_attachment_pairs_are_mirrored_exactly_once() {
    let pool = util::temp_pool().await;
    build_legacy_database(&pool).await;

    let report = migrate::run_schema_evolution(&pool).await.expect("evolve legacy");
    assert!(report.skipped.contains(&"baseline_tables"));
    assert!(report.skipped.contains(&"historia_documento_columns"));
    assert!(report.applied.contains(&"historia_documentos_table"));
    assert!(report.applied.contains(&"historia_documentos_backfill"));

    let rows = sqlx::query(
        "SELECT historia_id, nombre_original, ruta_publica, creado_en \
           FROM historia_documentos ORDER BY historia_id",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(rows.len(), 2);

    let first = &rows[0];
    assert_eq!(first.get::<i64, _>("historia_id"), 1);
    assert_eq!(first.get::<String, _>("nombre_original"), "radiografia.pdf");
    // Mirrored rows keep the owning record's creation time.
    assert_eq!(first.get::<i64, _>("creado_en"), 2000);

    // Blank legacy names fall back to the generic label.
    let second = &rows[1];
    assert_eq!(second.get::<String, _>("nombre_original"), "documento.pdf");

    // Pre-existing pets survive the structural steps with the new column NULL.
    let raza_id: Option<i64> = sqlx::query_scalar("SELECT raza_id FROM mascotas WHERE id = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(raza_id, None);

    // Re-running mirrors nothing new.
    let rerun = migrate::run_schema_evolution(&pool).await.expect("rerun");
    assert!(rerun.applied.is_empty());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM historia_documentos")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 2);
}

#[tokio::test]
async fn breed_backfill_links_matches_and_leaves_unmatched_null() {
    let pool = util::evolved_pool().await;
    let cliente_id = util::seed_cliente(&pool).await;

    let especie_id = catalogo::create_especie(&pool, "Perro").await.expect("especie");
    let raza_id = catalogo::create_raza(&pool, "Caniche", especie_id)
        .await
        .expect("raza");

    // Matches the catalog by name equality.
    let matched = util::seed_mascota(&pool, cliente_id).await;
    // No catalog pair for this free text.
    let unmatched = mascotas::create_mascota(
        &pool,
        &NewMascota {
            nombre: "Misha".into(),
            especie: Some("Gato".into()),
            raza: Some("Siames".into()),
            fecha_nacimiento: None,
            cliente_id,
        },
    )
    .await
    .expect("unmatched mascota");

    let report = migrate::run_schema_evolution(&pool).await.expect("reconcile");
    assert_eq!(report.applied, vec!["mascotas_raza_backfill"]);
    assert_eq!(report.mascotas_sin_raza, 1);

    let linked: Option<i64> = sqlx::query_scalar("SELECT raza_id FROM mascotas WHERE id = ?1")
        .bind(matched)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(linked, Some(raza_id));

    let still_null: Option<i64> = sqlx::query_scalar("SELECT raza_id FROM mascotas WHERE id = ?1")
        .bind(unmatched)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(still_null, None);
}

#[tokio::test]
async fn duplicate_breed_per_species_is_rejected() {
    let pool = util::evolved_pool().await;

    let perro = catalogo::create_especie(&pool, "Perro").await.unwrap();
    let gato = catalogo::create_especie(&pool, "Gato").await.unwrap();
    catalogo::create_raza(&pool, "Criollo", perro).await.unwrap();

    // Same breed name under another species is fine.
    catalogo::create_raza(&pool, "Criollo", gato).await.unwrap();

    let err = catalogo::create_raza(&pool, "Criollo", perro)
        .await
        .unwrap_err();
    assert!(err.code().starts_with("Sqlite/"), "got {}", err.code());

    let razas = catalogo::list_razas(&pool).await.unwrap();
    assert_eq!(razas.len(), 2);
}
