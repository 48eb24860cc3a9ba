#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use tomesvet::clientes::{self, NewCliente};
use tomesvet::mascotas::{self, NewMascota};
use tomesvet::migrate;

pub async fn temp_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect sqlite::memory:");
    sqlx::query("PRAGMA foreign_keys=ON;")
        .execute(&pool)
        .await
        .unwrap();
    pool
}

/// Fresh in-memory database brought up to the current schema.
pub async fn evolved_pool() -> SqlitePool {
    let pool = temp_pool().await;
    migrate::run_schema_evolution(&pool)
        .await
        .expect("schema evolution");
    pool
}

pub async fn seed_cliente(pool: &SqlitePool) -> i64 {
    clientes::create_cliente(
        pool,
        &NewCliente {
            nombre: "Ana Torres".into(),
            telefono: Some("555-0101".into()),
            email: None,
            direccion: None,
        },
    )
    .await
    .expect("seed cliente")
}

pub async fn seed_mascota(pool: &SqlitePool, cliente_id: i64) -> i64 {
    mascotas::create_mascota(
        pool,
        &NewMascota {
            nombre: "Rocky".into(),
            especie: Some("Perro".into()),
            raza: Some("Caniche".into()),
            fecha_nacimiento: Some("2021-03-14".into()),
            cliente_id,
        },
    )
    .await
    .expect("seed mascota")
}

pub async fn seed_historia(pool: &SqlitePool, mascota_id: i64) -> i64 {
    let res = sqlx::query(
        "INSERT INTO historia_clinica (mascota_id, fecha, motivo, creado_en) \
         VALUES (?1, '2026-01-15', 'Control anual', ?2)",
    )
    .bind(mascota_id)
    .bind(1_700_000_000_000i64)
    .execute(pool)
    .await
    .expect("seed historia");
    res.last_insert_rowid()
}
