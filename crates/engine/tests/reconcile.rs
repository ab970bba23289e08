use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, EntityKind};
use migration::MigratorTrait;

async fn engine_with_db() -> (Engine, DatabaseConnection) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder()
        .database(db.clone())
        .build()
        .await
        .unwrap();
    (engine, db)
}

struct Seed {
    mineral: String,
    vehicle: String,
    company: String,
    scale: String,
}

async fn seed(engine: &Engine) -> Seed {
    let unit = engine.new_unit("Cubic meter", 75).await.unwrap();
    let mineral = engine.new_mineral("Marble", 2500, &unit).await.unwrap();
    let vehicle_type = engine
        .new_vehicle_type("Flatbed", 4, 22_000)
        .await
        .unwrap();
    let vehicle = engine
        .new_vehicle("NGR-0042", "Homayoun", 8_100, &vehicle_type)
        .await
        .unwrap();
    let company = engine
        .new_company("Nangarhar Marble", "Z. Safi", "LIC-509", "TIN-71339", "Quarrying")
        .await
        .unwrap();
    let scale = engine
        .new_scale("Torkham Gate", "Border Road", "Nangarhar")
        .await
        .unwrap();
    engine.assign_vehicle(&company, &vehicle).await.unwrap();
    Seed {
        mineral,
        vehicle,
        company,
        scale,
    }
}

#[tokio::test]
async fn recalculate_repairs_a_corrupted_amount() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    let purchase = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Quarry 12", 1000, 2500, "RR-100")
        .await
        .unwrap();
    engine
        .new_weighing(&purchase, &s.vehicle, &s.scale, 300, "B-40", "Depot 3")
        .await
        .unwrap();

    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "UPDATE balances SET amount = 9999".to_string(),
    ))
    .await
    .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 9999);

    let report = engine.recalculate_all().await.unwrap();
    assert_eq!(report.companies_processed, 1);
    assert_eq!(report.minerals_processed, 1);
    assert_eq!(report.balances_created, 1);
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 700);
}

#[tokio::test]
async fn recalculate_recreates_missing_rows() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Quarry 9", 1000, 2500, "RR-110")
        .await
        .unwrap();

    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "DELETE FROM balances".to_string(),
    ))
    .await
    .unwrap();

    let report = engine.recalculate_all().await.unwrap();
    assert_eq!(report.balances_created, 1);
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 1000);
}

#[tokio::test]
async fn recalculate_retires_rows_whose_events_are_gone() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    let purchase = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Quarry 2", 1000, 2500, "RR-120")
        .await
        .unwrap();
    engine
        .soft_delete(EntityKind::Purchase, &purchase)
        .await
        .unwrap();

    // The row survives the purchase deletion at zero; corrupt it.
    let backend = db.get_database_backend();
    db.execute(Statement::from_string(
        backend,
        "UPDATE balances SET amount = 777 WHERE deleted_at IS NULL".to_string(),
    ))
    .await
    .unwrap();

    // No active event is left for the pair, so no replacement row appears
    // and the corrupted one is retired.
    let report = engine.recalculate_all().await.unwrap();
    assert_eq!(report.companies_processed, 0);
    assert_eq!(report.balances_created, 0);
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 0);

    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT COUNT(*) AS cnt FROM balances WHERE deleted_at IS NULL".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    let active: i64 = row.try_get("", "cnt").unwrap();
    assert_eq!(active, 0);
}

#[tokio::test]
async fn recalculate_leaves_orphaned_events_unapplied() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Quarry 3", 500, 2500, "RR-150")
        .await
        .unwrap();

    // Data surgery: stamp the company deleted without a cascade. Its
    // purchase stays active but the pair gets no replacement row, so the
    // purchase must not be marked applied.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "UPDATE companies SET deleted_at = created_at WHERE id = ?",
        vec![s.company.clone().into()],
    ))
    .await
    .unwrap();
    db.execute(Statement::from_string(
        backend,
        "UPDATE purchases SET applied = 0".to_string(),
    ))
    .await
    .unwrap();

    let report = engine.recalculate_all().await.unwrap();
    assert_eq!(report.companies_processed, 0);
    assert_eq!(report.balances_created, 0);

    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT applied FROM purchases".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    let applied: bool = row.try_get("", "applied").unwrap();
    assert!(!applied);
}

#[tokio::test]
async fn merge_collapses_duplicate_active_rows() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Quarry 5", 30, 2500, "RR-130")
        .await
        .unwrap();

    // Duplicates can only exist in databases that predate the partial
    // unique index, so drop it before planting them.
    db.execute_unprepared("DROP INDEX \"idx-balances-pair-active\"")
        .await
        .unwrap();
    let backend = db.get_database_backend();
    for (id, amount) in [("dup-1", 50i64), ("dup-2", 20i64)] {
        db.execute(Statement::from_sql_and_values(
            backend,
            "INSERT INTO balances (id, amount, company_id, mineral_id, company_type, created_at) \
             SELECT ?, ?, company_id, mineral_id, company_type, created_at FROM balances \
             WHERE company_id = ? LIMIT 1",
            vec![id.into(), amount.into(), s.company.clone().into()],
        ))
        .await
        .unwrap();
    }

    let report = engine.merge_duplicates().await.unwrap();
    assert_eq!(report.group_count, 1);
    assert_eq!(report.fixed_count, 2);
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 100);

    // The survivors of the merge are soft-deleted, not gone.
    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT COUNT(*) AS cnt FROM balances WHERE deleted_at IS NOT NULL".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    let deleted: i64 = row.try_get("", "cnt").unwrap();
    assert_eq!(deleted, 2);
}

#[tokio::test]
async fn merge_is_a_no_op_without_duplicates() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Quarry 1", 40, 2500, "RR-140")
        .await
        .unwrap();

    let report = engine.merge_duplicates().await.unwrap();
    assert_eq!(report.group_count, 0);
    assert_eq!(report.fixed_count, 0);
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 40);
}
