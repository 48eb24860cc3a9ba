#![allow(clippy::unwrap_used, clippy::expect_used)]

mod util;

use tomesvet::vacunas::{self, NewVacuna, ERR_VACUNA_NOT_FOUND};

fn vacuna(mascota_id: i64, producto: &str, tipo: &str, proxima: Option<&str>) -> NewVacuna {
    NewVacuna {
        mascota_id,
        producto: producto.to_string(),
        tipo: tipo.to_string(),
        fecha_aplicacion: Some("2026-03-01".to_string()),
        proxima_dosis: proxima.map(str::to_string),
    }
}

async fn proxima_of(pool: &sqlx::SqlitePool, id: i64) -> Option<String> {
    sqlx::query_scalar("SELECT proxima_dosis FROM vacunas WHERE id = ?1")
        .bind(id)
        .fetch_one(pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn inserting_a_new_dose_clears_the_sibling_schedule() {
    let pool = util::evolved_pool().await;
    let cliente_id = util::seed_cliente(&pool).await;
    let mascota_id = util::seed_mascota(&pool, cliente_id).await;

    let a = vacunas::create_vacuna(
        &pool,
        &vacuna(mascota_id, "Nobivac", "rabia", Some("2026-09-01")),
    )
    .await
    .unwrap();
    let b = vacunas::create_vacuna(
        &pool,
        &vacuna(mascota_id, "Nobivac", "rabia", Some("2026-12-01")),
    )
    .await
    .unwrap();

    assert_eq!(proxima_of(&pool, a).await, None);
    assert_eq!(proxima_of(&pool, b).await, Some("2026-12-01".to_string()));
}

#[tokio::test]
async fn clearing_is_scoped_to_the_pet_product_type_triple() {
    let pool = util::evolved_pool().await;
    let cliente_id = util::seed_cliente(&pool).await;
    let mascota_id = util::seed_mascota(&pool, cliente_id).await;
    let other_mascota = util::seed_mascota(&pool, cliente_id).await;

    let same_product_other_type = vacunas::create_vacuna(
        &pool,
        &vacuna(mascota_id, "Nobivac", "moquillo", Some("2026-10-01")),
    )
    .await
    .unwrap();
    let other_product = vacunas::create_vacuna(
        &pool,
        &vacuna(mascota_id, "Vanguard", "rabia", Some("2026-10-15")),
    )
    .await
    .unwrap();
    let other_pet = vacunas::create_vacuna(
        &pool,
        &vacuna(other_mascota, "Nobivac", "rabia", Some("2026-11-01")),
    )
    .await
    .unwrap();

    vacunas::create_vacuna(
        &pool,
        &vacuna(mascota_id, "Nobivac", "rabia", Some("2026-12-01")),
    )
    .await
    .unwrap();

    assert_eq!(
        proxima_of(&pool, same_product_other_type).await,
        Some("2026-10-01".to_string())
    );
    assert_eq!(
        proxima_of(&pool, other_product).await,
        Some("2026-10-15".to_string())
    );
    assert_eq!(
        proxima_of(&pool, other_pet).await,
        Some("2026-11-01".to_string())
    );
}

#[tokio::test]
async fn inserting_without_a_schedule_clears_nothing() {
    let pool = util::evolved_pool().await;
    let cliente_id = util::seed_cliente(&pool).await;
    let mascota_id = util::seed_mascota(&pool, cliente_id).await;

    let a = vacunas::create_vacuna(
        &pool,
        &vacuna(mascota_id, "Nobivac", "rabia", Some("2026-09-01")),
    )
    .await
    .unwrap();
    vacunas::create_vacuna(&pool, &vacuna(mascota_id, "Nobivac", "rabia", None))
        .await
        .unwrap();

    assert_eq!(proxima_of(&pool, a).await, Some("2026-09-01".to_string()));
}

#[tokio::test]
async fn updating_a_schedule_excludes_the_row_itself() {
    let pool = util::evolved_pool().await;
    let cliente_id = util::seed_cliente(&pool).await;
    let mascota_id = util::seed_mascota(&pool, cliente_id).await;

    let a = vacunas::create_vacuna(
        &pool,
        &vacuna(mascota_id, "Nobivac", "rabia", Some("2026-09-01")),
    )
    .await
    .unwrap();
    let b = vacunas::create_vacuna(
        &pool,
        &vacuna(mascota_id, "Nobivac", "rabia", Some("2026-12-01")),
    )
    .await
    .unwrap();

    // Rescheduling A steals the pending dose back from B.
    vacunas::update_vacuna(&pool, a, Some("2026-03-01"), Some("2027-01-15"))
        .await
        .unwrap();
    assert_eq!(proxima_of(&pool, a).await, Some("2027-01-15".to_string()));
    assert_eq!(proxima_of(&pool, b).await, None);

    // Clearing A's own date touches no other row.
    vacunas::update_vacuna(&pool, a, Some("2026-03-01"), None)
        .await
        .unwrap();
    assert_eq!(proxima_of(&pool, a).await, None);
    assert_eq!(proxima_of(&pool, b).await, None);
}

#[tokio::test]
async fn updating_a_missing_vaccination_reports_not_found() {
    let pool = util::evolved_pool().await;
    let err = vacunas::update_vacuna(&pool, 404, None, Some("2026-12-01"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), ERR_VACUNA_NOT_FOUND);
}

#[tokio::test]
async fn vaccinations_list_per_pet_newest_application_first() {
    let pool = util::evolved_pool().await;
    let cliente_id = util::seed_cliente(&pool).await;
    let mascota_id = util::seed_mascota(&pool, cliente_id).await;

    let mut first = vacuna(mascota_id, "Nobivac", "rabia", None);
    first.fecha_aplicacion = Some("2025-01-10".to_string());
    vacunas::create_vacuna(&pool, &first).await.unwrap();

    let mut second = vacuna(mascota_id, "Vanguard", "moquillo", None);
    second.fecha_aplicacion = Some("2026-02-20".to_string());
    vacunas::create_vacuna(&pool, &second).await.unwrap();

    let listed = vacunas::list_vacunas(&pool, mascota_id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].producto, "Vanguard");
    assert_eq!(listed[1].producto, "Nobivac");
}
