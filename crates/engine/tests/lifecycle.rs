use sea_orm::{ConnectionTrait, Database, DatabaseConnection, Statement};

use engine::{Engine, EngineError, EntityKind, LifecycleState};
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
    unit: String,
    mineral: String,
    vehicle_type: String,
    vehicle: String,
    company: String,
    scale: String,
}

async fn seed(engine: &Engine) -> Seed {
    let unit = engine.new_unit("Ton", 50).await.unwrap();
    let mineral = engine.new_mineral("Chromite", 1200, &unit).await.unwrap();
    let vehicle_type = engine
        .new_vehicle_type("Ten-wheeler", 5, 26_000)
        .await
        .unwrap();
    let vehicle = engine
        .new_vehicle("KBL-7431", "Farid", 9_500, &vehicle_type)
        .await
        .unwrap();
    let company = engine
        .new_company("Aria Minerals", "N. Rahimi", "LIC-204", "TIN-88210", "Trading")
        .await
        .unwrap();
    let scale = engine
        .new_scale("Pul-e Charkhi", "Kabul East", "Kabul")
        .await
        .unwrap();
    engine.assign_vehicle(&company, &vehicle).await.unwrap();
    Seed {
        unit,
        mineral,
        vehicle_type,
        vehicle,
        company,
        scale,
    }
}

async fn state(engine: &Engine, kind: EntityKind, id: &str) -> LifecycleState {
    engine.lifecycle(kind, id).await.unwrap()
}

#[tokio::test]
async fn delete_restore_round_trip_with_state_guards() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    engine
        .soft_delete(EntityKind::Mineral, &s.mineral)
        .await
        .unwrap();
    assert_eq!(
        state(&engine, EntityKind::Mineral, &s.mineral).await,
        LifecycleState::Deleted
    );

    let err = engine
        .soft_delete(EntityKind::Mineral, &s.mineral)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AlreadyDeleted(_)));

    engine
        .restore(EntityKind::Mineral, &s.mineral)
        .await
        .unwrap();
    assert_eq!(
        state(&engine, EntityKind::Mineral, &s.mineral).await,
        LifecycleState::Active
    );

    let err = engine
        .restore(EntityKind::Mineral, &s.mineral)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotDeleted(_)));
}

#[tokio::test]
async fn missing_record_is_key_not_found() {
    let (engine, _db) = engine_with_db().await;

    let err = engine
        .soft_delete(EntityKind::Company, "no-such-id")
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::KeyNotFound(_)));
}

#[tokio::test]
async fn unit_cascade_takes_minerals_down_and_back() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    engine.soft_delete(EntityKind::Unit, &s.unit).await.unwrap();
    assert_eq!(
        state(&engine, EntityKind::Mineral, &s.mineral).await,
        LifecycleState::Deleted
    );

    engine.restore(EntityKind::Unit, &s.unit).await.unwrap();
    assert_eq!(
        state(&engine, EntityKind::Mineral, &s.mineral).await,
        LifecycleState::Active
    );
}

#[tokio::test]
async fn independently_deleted_dependent_stays_deleted() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    // The mineral goes down on its own, then its unit follows.
    engine
        .soft_delete(EntityKind::Mineral, &s.mineral)
        .await
        .unwrap();
    engine.soft_delete(EntityKind::Unit, &s.unit).await.unwrap();

    // Restoring the unit must not revive the mineral: its deletion was not
    // caused by the unit's cascade.
    engine.restore(EntityKind::Unit, &s.unit).await.unwrap();
    assert_eq!(
        state(&engine, EntityKind::Unit, &s.unit).await,
        LifecycleState::Active
    );
    assert_eq!(
        state(&engine, EntityKind::Mineral, &s.mineral).await,
        LifecycleState::Deleted
    );
}

#[tokio::test]
async fn shared_vehicle_survives_until_last_owner_goes() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    let second = engine
        .new_company("Badakhshan Ore", "S. Karimi", "LIC-377", "TIN-90433", "Trading")
        .await
        .unwrap();
    engine.assign_vehicle(&second, &s.vehicle).await.unwrap();

    // First owner down: the vehicle still has an active owner.
    engine
        .soft_delete(EntityKind::Company, &s.company)
        .await
        .unwrap();
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &s.vehicle).await,
        LifecycleState::Active
    );
    let links = engine
        .tracked_links(EntityKind::Company, &s.company, Some(EntityKind::Vehicle))
        .await
        .unwrap();
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].dependent_id, s.vehicle);

    // Last owner down: the vehicle follows.
    engine
        .soft_delete(EntityKind::Company, &second)
        .await
        .unwrap();
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &s.vehicle).await,
        LifecycleState::Deleted
    );

    // Restoring the last owner revives the vehicle and its link.
    engine.restore(EntityKind::Company, &second).await.unwrap();
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &s.vehicle).await,
        LifecycleState::Active
    );
    assert!(engine
        .tracked_links(EntityKind::Company, &second, None)
        .await
        .unwrap()
        .is_empty());

    // The first company's severed link is still tracked and comes back with
    // its own restore.
    engine
        .restore(EntityKind::Company, &s.company)
        .await
        .unwrap();
    assert!(engine
        .tracked_links(EntityKind::Company, &s.company, None)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn one_cascade_splits_exclusive_and_shared_vehicles() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    let second = engine
        .new_company("Kandahar Gravel", "M. Noori", "LIC-612", "TIN-41877", "Trading")
        .await
        .unwrap();
    let shared = engine
        .new_vehicle("KDR-5520", "Samim", 8_800, &s.vehicle_type)
        .await
        .unwrap();
    engine.assign_vehicle(&s.company, &shared).await.unwrap();
    engine.assign_vehicle(&second, &shared).await.unwrap();

    // One delete severs both links; only the exclusive vehicle falls.
    engine
        .soft_delete(EntityKind::Company, &s.company)
        .await
        .unwrap();
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &s.vehicle).await,
        LifecycleState::Deleted
    );
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &shared).await,
        LifecycleState::Active
    );
    let links = engine
        .tracked_links(EntityKind::Company, &s.company, Some(EntityKind::Vehicle))
        .await
        .unwrap();
    assert_eq!(links.len(), 2);

    // One restore re-links both and revives the exclusive vehicle.
    engine
        .restore(EntityKind::Company, &s.company)
        .await
        .unwrap();
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &s.vehicle).await,
        LifecycleState::Active
    );
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &shared).await,
        LifecycleState::Active
    );
    assert!(engine
        .tracked_links(EntityKind::Company, &s.company, None)
        .await
        .unwrap()
        .is_empty());

    // The restored link counts as an owner again: losing the second company
    // no longer takes the shared vehicle down.
    engine
        .soft_delete(EntityKind::Company, &second)
        .await
        .unwrap();
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &shared).await,
        LifecycleState::Active
    );
}

#[tokio::test]
async fn restore_tolerates_hand_recreated_links() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    engine
        .soft_delete(EntityKind::Company, &s.company)
        .await
        .unwrap();

    // Data surgery puts the link row back while the tracked row still
    // exists; restore must not trip over the composite pk.
    let backend = db.get_database_backend();
    db.execute(Statement::from_sql_and_values(
        backend,
        "INSERT INTO company_vehicles (company_id, vehicle_id, created_at) \
         SELECT id, ?, created_at FROM companies WHERE id = ?",
        vec![s.vehicle.clone().into(), s.company.clone().into()],
    ))
    .await
    .unwrap();

    engine
        .restore(EntityKind::Company, &s.company)
        .await
        .unwrap();
    assert_eq!(
        state(&engine, EntityKind::Vehicle, &s.vehicle).await,
        LifecycleState::Active
    );
    assert!(engine
        .tracked_links(EntityKind::Company, &s.company, None)
        .await
        .unwrap()
        .is_empty());

    let row = db
        .query_one(Statement::from_string(
            backend,
            "SELECT COUNT(*) AS cnt FROM company_vehicles".to_string(),
        ))
        .await
        .unwrap()
        .unwrap();
    let links: i64 = row.try_get("", "cnt").unwrap();
    assert_eq!(links, 1);
}

#[tokio::test]
async fn company_cascade_reverses_ledger_and_restore_reapplies() {
    let (engine, db) = engine_with_db().await;
    let s = seed(&engine).await;

    let purchase = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 4", 1000, 1200, "RR-1001")
        .await
        .unwrap();
    engine
        .new_weighing(&purchase, &s.vehicle, &s.scale, 300, "B-17", "Depot 2")
        .await
        .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 700);

    engine
        .soft_delete(EntityKind::Company, &s.company)
        .await
        .unwrap();

    // The stamped balance row holds zero: every event was reversed before
    // the row was taken down.
    let backend = db.get_database_backend();
    let row = db
        .query_one(Statement::from_sql_and_values(
            backend,
            "SELECT amount FROM balances WHERE company_id = ? AND deleted_at IS NOT NULL",
            vec![s.company.clone().into()],
        ))
        .await
        .unwrap()
        .unwrap();
    let stamped_amount: i64 = row.try_get("", "amount").unwrap();
    assert_eq!(stamped_amount, 0);
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 0);

    engine
        .restore(EntityKind::Company, &s.company)
        .await
        .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 700);
    assert_eq!(
        state(&engine, EntityKind::Purchase, &purchase).await,
        LifecycleState::Active
    );
}

#[tokio::test]
async fn purchase_delete_reverses_its_weighings_too() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    let purchase = engine
        .new_purchase(&s.company, &s.mineral, &s.scale, "Zone 1", 1000, 1200, "RR-2001")
        .await
        .unwrap();
    let weighing = engine
        .new_weighing(&purchase, &s.vehicle, &s.scale, 300, "B-20", "Depot 1")
        .await
        .unwrap();

    engine
        .soft_delete(EntityKind::Purchase, &purchase)
        .await
        .unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 0);
    assert_eq!(
        state(&engine, EntityKind::Weighing, &weighing).await,
        LifecycleState::Deleted
    );

    engine.restore(EntityKind::Purchase, &purchase).await.unwrap();
    assert_eq!(engine.get_balance(&s.company, &s.mineral).await.unwrap(), 700);
    assert_eq!(
        state(&engine, EntityKind::Weighing, &weighing).await,
        LifecycleState::Active
    );
}

#[tokio::test]
async fn track_and_untrack_links_by_hand() {
    let (engine, _db) = engine_with_db().await;
    let s = seed(&engine).await;

    engine
        .track_link(EntityKind::Company, &s.company, EntityKind::Vehicle, &s.vehicle)
        .await
        .unwrap();
    // Tracking the same tuple twice is a no-op.
    engine
        .track_link(EntityKind::Company, &s.company, EntityKind::Vehicle, &s.vehicle)
        .await
        .unwrap();
    assert_eq!(
        engine
            .tracked_links(EntityKind::Company, &s.company, None)
            .await
            .unwrap()
            .len(),
        1
    );

    // Untracking is idempotent the same way.
    engine
        .untrack_link(EntityKind::Company, &s.company, EntityKind::Vehicle, &s.vehicle)
        .await
        .unwrap();
    engine
        .untrack_link(EntityKind::Company, &s.company, EntityKind::Vehicle, &s.vehicle)
        .await
        .unwrap();
    assert!(engine
        .tracked_links(EntityKind::Company, &s.company, None)
        .await
        .unwrap()
        .is_empty());

    // The vehicle type never cascaded through here.
    assert_eq!(
        state(&engine, EntityKind::VehicleType, &s.vehicle_type).await,
        LifecycleState::Active
    );
}
