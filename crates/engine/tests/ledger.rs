use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, EngineError};
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
    let unit = engine.new_unit("Ton", 50).await.unwrap();
    let mineral = engine.new_mineral("Talc", 800, &unit).await.unwrap();
    let vehicle_type = engine
        .new_vehicle_type("Six-wheeler", 3, 15_000)
        .await
        .unwrap();
    let vehicle = engine
        .new_vehicle("HRT-2210", "Jawed", 6_200, &vehicle_type)
        .await
        .unwrap();
    let company = engine
        .new_company("Helmand Stone", "A. Wahidi", "LIC-118", "TIN-55102", "Extraction")
        .await
        .unwrap();
    let scale = engine
        .new_scale("Lashkar Gah", "Route 601", "Helmand")
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
async fn purchases_credit_and_weighings_debit_in_sequence() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    let p1 = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 2", 1000, 800, "RR-10")
        .await
        .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 1000);

    let w1 = engine
        .new_weighing(&p1, &s.vehicle, &s.scale, 300, "B-1", "Depot 9")
        .await
        .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 700);

    assert_eq!(engine.reverse_weighing(&w1).await.unwrap(), 1000);

    engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 2", 500, 800, "RR-11")
        .await
        .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 1500);

    engine
        .new_weighing(&p1, &s.vehicle, &s.scale, 1200, "B-2", "Depot 9")
        .await
        .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 300);
}

#[tokio::test]
async fn insufficient_weighing_leaves_no_trace() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    let purchase = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 7", 100, 800, "RR-20")
        .await
        .unwrap();

    let err = engine
        .new_weighing(&purchase, &s.vehicle, &s.scale, 500, "B-3", "Depot 4")
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InsufficientBalance {
            available: 100,
            requested: 500,
        }
    );

    // The transaction rolled back: no weighing row, untouched balance.
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 100);
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT COUNT(*) AS cnt FROM weighings".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    let count: i64 = row.try_get("", "cnt").unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn apply_and_reverse_are_idempotent() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    let purchase = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 3", 250, 800, "RR-30")
        .await
        .unwrap();

    // Already applied on creation; a second apply changes nothing.
    assert_eq!(engine.apply_purchase(&purchase).await.unwrap(), 250);
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 250);

    assert_eq!(engine.reverse_purchase(&purchase).await.unwrap(), 0);
    assert_eq!(engine.reverse_purchase(&purchase).await.unwrap(), 0);

    assert_eq!(engine.apply_purchase(&purchase).await.unwrap(), 250);
}

#[tokio::test]
async fn weighing_apply_reverse_round_trip() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    let purchase = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 5", 400, 800, "RR-40")
        .await
        .unwrap();
    let weighing = engine
        .new_weighing(&purchase, &s.vehicle, &s.scale, 150, "B-8", "Depot 1")
        .await
        .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 250);

    assert_eq!(engine.apply_weighing(&weighing).await.unwrap(), 250);
    assert_eq!(engine.reverse_weighing(&weighing).await.unwrap(), 400);
    assert_eq!(engine.reverse_weighing(&weighing).await.unwrap(), 400);
    assert_eq!(engine.apply_weighing(&weighing).await.unwrap(), 250);
}

#[tokio::test]
async fn reversal_without_balance_row_goes_negative() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    let purchase = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 6", 1000, 800, "RR-50")
        .await
        .unwrap();

    // Hard-delete the balance row behind the engine's back.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "DELETE FROM balances WHERE company_id = ?",
        vec![s.company.clone().into()],
    ))
    .await
    .unwrap();

    // The reversal recreates the row and posts through it, so the anomaly
    // is visible instead of silently skipped.
    assert_eq!(engine.reverse_purchase(&purchase).await.unwrap(), -1000);
    assert_eq!(
        engine.get_balance(&s.company, &s.mineral).await.unwrap(),
        -1000
    );
}

#[tokio::test]
async fn unknown_pair_reads_as_zero() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 0);
}

#[tokio::test]
async fn rejects_nonpositive_quantities() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    let err = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 1", 0, 800, "RR-60")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));

    let err = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 1", -5, 800, "RR-61")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAmount(_)));
}
