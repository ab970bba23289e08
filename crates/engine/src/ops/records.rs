//! Record creation and the company/vehicle link surface.
//!
//! Purchases and weighings are ledger events: their balance effect posts in
//! the same transaction that inserts the row, so an insufficient weighing
//! leaves no row behind at all.

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, SqlErr, TransactionTrait, prelude::*,
};
use uuid::Uuid;

use crate::{
    EngineError, ResultEngine, SoftDeletable, companies, company_vehicles, minerals, purchases,
    scales, units, vehicle_types, vehicles, weighings,
};

use super::{
    Engine, lifecycle::require_row, normalize_required_name, require_positive, with_tx,
};

impl Engine {
    pub async fn new_unit(&self, name: &str, weighing_price: i64) -> ResultEngine<String> {
        let name = normalize_required_name(name, "unit")?;
        let weighing_price = require_positive(weighing_price, "weighing price")?;
        let id = Uuid::new_v4().to_string();
        with_tx!(self, |db_tx| {
            units::ActiveModel {
                id: ActiveValue::Set(id.clone()),
                name: ActiveValue::Set(name.clone()),
                weighing_price: ActiveValue::Set(weighing_price),
                created_at: ActiveValue::Set(Utc::now()),
                deleted_at: ActiveValue::Set(None),
                deleted_by_kind: ActiveValue::Set(None),
                deleted_by_id: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            Ok(id.clone())
        })
    }

    pub async fn new_mineral(
        &self,
        name: &str,
        unit_price: i64,
        unit_id: &str,
    ) -> ResultEngine<String> {
        let name = normalize_required_name(name, "mineral")?;
        let unit_price = require_positive(unit_price, "unit price")?;
        let id = Uuid::new_v4().to_string();
        with_tx!(self, |db_tx| {
            require_active::<units::Entity>(&db_tx, unit_id).await?;
            minerals::ActiveModel {
                id: ActiveValue::Set(id.clone()),
                name: ActiveValue::Set(name.clone()),
                unit_price: ActiveValue::Set(unit_price),
                unit_id: ActiveValue::Set(unit_id.to_string()),
                created_at: ActiveValue::Set(Utc::now()),
                deleted_at: ActiveValue::Set(None),
                deleted_by_kind: ActiveValue::Set(None),
                deleted_by_id: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            Ok(id.clone())
        })
    }

    pub async fn new_vehicle_type(
        &self,
        name: &str,
        axle_count: i32,
        allowed_weight: i64,
    ) -> ResultEngine<String> {
        let name = normalize_required_name(name, "vehicle type")?;
        let allowed_weight = require_positive(allowed_weight, "allowed weight")?;
        let id = Uuid::new_v4().to_string();
        with_tx!(self, |db_tx| {
            vehicle_types::ActiveModel {
                id: ActiveValue::Set(id.clone()),
                name: ActiveValue::Set(name.clone()),
                axle_count: ActiveValue::Set(axle_count),
                allowed_weight: ActiveValue::Set(allowed_weight),
                created_at: ActiveValue::Set(Utc::now()),
                deleted_at: ActiveValue::Set(None),
                deleted_by_kind: ActiveValue::Set(None),
                deleted_by_id: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            Ok(id.clone())
        })
    }

    pub async fn new_vehicle(
        &self,
        plate_number: &str,
        driver_name: &str,
        empty_weight: i64,
        vehicle_type_id: &str,
    ) -> ResultEngine<String> {
        let plate_number = normalize_required_name(plate_number, "vehicle plate")?;
        let empty_weight = require_positive(empty_weight, "empty weight")?;
        let id = Uuid::new_v4().to_string();
        with_tx!(self, |db_tx| {
            require_active::<vehicle_types::Entity>(&db_tx, vehicle_type_id).await?;
            vehicles::ActiveModel {
                id: ActiveValue::Set(id.clone()),
                plate_number: ActiveValue::Set(plate_number.clone()),
                driver_name: ActiveValue::Set(driver_name.trim().to_string()),
                empty_weight: ActiveValue::Set(empty_weight),
                vehicle_type_id: ActiveValue::Set(vehicle_type_id.to_string()),
                created_at: ActiveValue::Set(Utc::now()),
                deleted_at: ActiveValue::Set(None),
                deleted_by_kind: ActiveValue::Set(None),
                deleted_by_id: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            Ok(id.clone())
        })
    }

    pub async fn new_company(
        &self,
        name: &str,
        leader_name: &str,
        license_number: &str,
        tin_number: &str,
        company_type: &str,
    ) -> ResultEngine<String> {
        let name = normalize_required_name(name, "company")?;
        let tin_number = normalize_required_name(tin_number, "tin")?;
        let company_type = normalize_required_name(company_type, "company type")?;
        let id = Uuid::new_v4().to_string();
        with_tx!(self, |db_tx| {
            let inserted = companies::ActiveModel {
                id: ActiveValue::Set(id.clone()),
                name: ActiveValue::Set(name.clone()),
                leader_name: ActiveValue::Set(leader_name.trim().to_string()),
                license_number: ActiveValue::Set(license_number.trim().to_string()),
                tin_number: ActiveValue::Set(tin_number.clone()),
                company_type: ActiveValue::Set(company_type.clone()),
                created_at: ActiveValue::Set(Utc::now()),
                deleted_at: ActiveValue::Set(None),
                deleted_by_kind: ActiveValue::Set(None),
                deleted_by_id: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await;
            match inserted {
                Ok(_) => Ok(id.clone()),
                Err(err) => match err.sql_err() {
                    Some(SqlErr::UniqueConstraintViolation(_)) => {
                        Err(EngineError::ConstraintViolation(format!(
                            "tin number {tin_number} already registered"
                        )))
                    }
                    _ => Err(err.into()),
                },
            }
        })
    }

    pub async fn new_scale(
        &self,
        name: &str,
        location: &str,
        province: &str,
    ) -> ResultEngine<String> {
        let name = normalize_required_name(name, "scale")?;
        let id = Uuid::new_v4().to_string();
        with_tx!(self, |db_tx| {
            scales::ActiveModel {
                id: ActiveValue::Set(id.clone()),
                name: ActiveValue::Set(name.clone()),
                location: ActiveValue::Set(location.trim().to_string()),
                province: ActiveValue::Set(province.trim().to_string()),
                created_at: ActiveValue::Set(Utc::now()),
                deleted_at: ActiveValue::Set(None),
                deleted_by_kind: ActiveValue::Set(None),
                deleted_by_id: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            Ok(id.clone())
        })
    }

    /// Link a vehicle to a company. Both sides must be active; linking an
    /// already-linked pair is a no-op.
    pub async fn assign_vehicle(&self, company_id: &str, vehicle_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            require_active::<companies::Entity>(&db_tx, company_id).await?;
            require_active::<vehicles::Entity>(&db_tx, vehicle_id).await?;

            let exists = company_vehicles::Entity::find()
                .filter(company_vehicles::Column::CompanyId.eq(company_id))
                .filter(company_vehicles::Column::VehicleId.eq(vehicle_id))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Ok(());
            }

            company_vehicles::ActiveModel {
                company_id: ActiveValue::Set(company_id.to_string()),
                vehicle_id: ActiveValue::Set(vehicle_id.to_string()),
                created_at: ActiveValue::Set(Utc::now()),
            }
            .insert(&db_tx)
            .await?;
            Ok(())
        })
    }

    /// Remove a company/vehicle link. Does not touch either record's
    /// lifecycle and leaves no tracked-relationship row behind. Removing an
    /// absent link is a no-op.
    pub async fn unassign_vehicle(&self, company_id: &str, vehicle_id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            company_vehicles::Entity::delete_many()
                .filter(company_vehicles::Column::CompanyId.eq(company_id))
                .filter(company_vehicles::Column::VehicleId.eq(vehicle_id))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// Record a purchase and credit the (company, mineral) balance in the
    /// same transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn new_purchase(
        &self,
        company_id: &str,
        mineral_id: &str,
        scale_id: &str,
        area: &str,
        quantity: i64,
        unit_price: i64,
        royalty_receipt_number: &str,
    ) -> ResultEngine<String> {
        let quantity = require_positive(quantity, "purchase quantity")?;
        let unit_price = require_positive(unit_price, "unit price")?;
        let id = Uuid::new_v4().to_string();
        with_tx!(self, |db_tx| {
            require_active::<companies::Entity>(&db_tx, company_id).await?;
            require_active::<minerals::Entity>(&db_tx, mineral_id).await?;
            require_active::<scales::Entity>(&db_tx, scale_id).await?;

            purchases::ActiveModel {
                id: ActiveValue::Set(id.clone()),
                area: ActiveValue::Set(area.trim().to_string()),
                quantity: ActiveValue::Set(quantity),
                unit_price: ActiveValue::Set(unit_price),
                royalty_receipt_number: ActiveValue::Set(royalty_receipt_number.trim().to_string()),
                applied: ActiveValue::Set(false),
                company_id: ActiveValue::Set(company_id.to_string()),
                mineral_id: ActiveValue::Set(mineral_id.to_string()),
                scale_id: ActiveValue::Set(scale_id.to_string()),
                created_at: ActiveValue::Set(Utc::now()),
                deleted_at: ActiveValue::Set(None),
                deleted_by_kind: ActiveValue::Set(None),
                deleted_by_id: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            self.apply_purchase_tx(&db_tx, &id).await?;
            Ok(id.clone())
        })
    }

    /// Record a weighing and debit the balance in the same transaction.
    ///
    /// The mineral comes from the purchase being drawn down. If the balance
    /// cannot cover the quantity the transaction rolls back and no weighing
    /// row survives.
    pub async fn new_weighing(
        &self,
        purchase_id: &str,
        vehicle_id: &str,
        scale_id: &str,
        quantity: i64,
        bill_number: &str,
        discharge_place: &str,
    ) -> ResultEngine<String> {
        let quantity = require_positive(quantity, "weighing quantity")?;
        let id = Uuid::new_v4().to_string();
        with_tx!(self, |db_tx| {
            let purchase = require_active::<purchases::Entity>(&db_tx, purchase_id).await?;
            require_active::<vehicles::Entity>(&db_tx, vehicle_id).await?;
            require_active::<scales::Entity>(&db_tx, scale_id).await?;

            weighings::ActiveModel {
                id: ActiveValue::Set(id.clone()),
                quantity: ActiveValue::Set(quantity),
                bill_number: ActiveValue::Set(bill_number.trim().to_string()),
                discharge_place: ActiveValue::Set(discharge_place.trim().to_string()),
                applied: ActiveValue::Set(false),
                purchase_id: ActiveValue::Set(purchase_id.to_string()),
                mineral_id: ActiveValue::Set(purchase.mineral_id.clone()),
                vehicle_id: ActiveValue::Set(vehicle_id.to_string()),
                scale_id: ActiveValue::Set(scale_id.to_string()),
                created_at: ActiveValue::Set(Utc::now()),
                deleted_at: ActiveValue::Set(None),
                deleted_by_kind: ActiveValue::Set(None),
                deleted_by_id: ActiveValue::Set(None),
            }
            .insert(&db_tx)
            .await?;
            self.apply_weighing_tx(&db_tx, &id, true).await?;
            Ok(id.clone())
        })
    }
}

async fn require_active<E: SoftDeletable>(
    db: &DatabaseTransaction,
    id: &str,
) -> ResultEngine<E::Model> {
    let model = require_row::<E>(db, id).await?;
    if E::model_deleted_at(&model).is_some() {
        return Err(EngineError::ConstraintViolation(format!(
            "{} {id} is deleted",
            E::KIND.as_str()
        )));
    }
    Ok(model)
}
