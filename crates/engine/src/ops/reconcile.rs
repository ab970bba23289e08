//! Reconciliation: rebuild balances from the event history and collapse
//! duplicate active rows.
//!
//! Both operations are full-table repairs meant for operator use after
//! manual data surgery or imports; day-to-day mutations keep balances
//! consistent on their own.

use std::collections::{BTreeMap, HashMap};

use chrono::Utc;
use sea_orm::{
    ActiveValue, QueryFilter, QueryOrder, TransactionTrait, prelude::*, sea_query::Expr,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::{ResultEngine, balances, companies, minerals, purchases, weighings};

use super::{
    Engine,
    ledger::post_amount,
    lifecycle::stamp_deleted,
    with_tx,
};

/// Outcome of [`Engine::recalculate_all`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RecalculationReport {
    pub companies_processed: u64,
    pub minerals_processed: u64,
    pub balances_created: u64,
}

/// Outcome of [`Engine::merge_duplicates`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    pub group_count: u64,
    pub fixed_count: u64,
}

impl Engine {
    /// Rebuild the active balance rows from the active purchases and
    /// weighings.
    ///
    /// Every active row is retired and a fresh one written per
    /// (company, mineral) pair that still has at least one active event, so
    /// corrupted amounts, missing rows, and stale pairs all come out the
    /// same way. Every event behind a rebuilt row ends up with
    /// `applied = true`: after this pass the flags agree with the amounts by
    /// construction.
    pub async fn recalculate_all(&self) -> ResultEngine<RecalculationReport> {
        with_tx!(self, |db_tx| {
            // Retire the current rows first; pairs with no surviving event
            // simply get no replacement.
            let stamp = Utc::now();
            balances::Entity::update_many()
                .col_expr(balances::Column::DeletedAt, Expr::value(Some(stamp)))
                .filter(balances::Column::DeletedAt.is_null())
                .exec(&db_tx)
                .await?;

            // Deleted purchases still resolve the company of any weighing
            // pointing at them, but only active ones contribute credits.
            let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
            let all_purchases = purchases::Entity::find().all(&db_tx).await?;
            let mut company_of: HashMap<&str, &str> = HashMap::new();
            for purchase in &all_purchases {
                company_of.insert(purchase.id.as_str(), purchase.company_id.as_str());
                if purchase.deleted_at.is_none() {
                    *totals
                        .entry((purchase.company_id.clone(), purchase.mineral_id.clone()))
                        .or_insert(0) += purchase.quantity;
                }
            }

            let active_weighings = weighings::Entity::find()
                .filter(weighings::Column::DeletedAt.is_null())
                .all(&db_tx)
                .await?;
            for weighing in &active_weighings {
                let Some(company_id) = company_of.get(weighing.purchase_id.as_str()) else {
                    continue;
                };
                *totals
                    .entry(((*company_id).to_string(), weighing.mineral_id.clone()))
                    .or_insert(0) -= weighing.quantity;
            }

            // Only active companies and minerals get replacement rows;
            // events orphaned by data surgery stay out of the ledger until
            // their owners come back.
            let mut active_companies: HashMap<String, String> = HashMap::new();
            for company in companies::Entity::find()
                .filter(companies::Column::DeletedAt.is_null())
                .all(&db_tx)
                .await?
            {
                active_companies.insert(company.id, company.company_type);
            }
            let active_minerals: std::collections::BTreeSet<String> = minerals::Entity::find()
                .filter(minerals::Column::DeletedAt.is_null())
                .all(&db_tx)
                .await?
                .into_iter()
                .map(|mineral| mineral.id)
                .collect();

            let mut report = RecalculationReport {
                companies_processed: 0,
                minerals_processed: 0,
                balances_created: 0,
            };
            let mut company_set = std::collections::BTreeSet::new();
            let mut mineral_set = std::collections::BTreeSet::new();
            let mut rebuilt_pairs: std::collections::BTreeSet<(String, String)> =
                std::collections::BTreeSet::new();

            for ((company_id, mineral_id), amount) in &totals {
                let Some(company_type) = active_companies.get(company_id).cloned() else {
                    continue;
                };
                if !active_minerals.contains(mineral_id) {
                    continue;
                }
                company_set.insert(company_id.clone());
                mineral_set.insert(mineral_id.clone());
                rebuilt_pairs.insert((company_id.clone(), mineral_id.clone()));

                balances::ActiveModel {
                    id: ActiveValue::Set(Uuid::new_v4().to_string()),
                    amount: ActiveValue::Set(*amount),
                    company_id: ActiveValue::Set(company_id.clone()),
                    mineral_id: ActiveValue::Set(mineral_id.clone()),
                    company_type: ActiveValue::Set(company_type),
                    created_at: ActiveValue::Set(Utc::now()),
                    deleted_at: ActiveValue::Set(None),
                    deleted_by_kind: ActiveValue::Set(None),
                    deleted_by_id: ActiveValue::Set(None),
                }
                .insert(&db_tx)
                .await?;
                report.balances_created += 1;
            }

            // Only the events behind a rebuilt row count as applied; events
            // orphaned by a deleted owner keep their flag as-is.
            let contributing_purchases: Vec<String> = all_purchases
                .iter()
                .filter(|purchase| {
                    purchase.deleted_at.is_none()
                        && rebuilt_pairs.contains(&(
                            purchase.company_id.clone(),
                            purchase.mineral_id.clone(),
                        ))
                })
                .map(|purchase| purchase.id.clone())
                .collect();
            if !contributing_purchases.is_empty() {
                purchases::Entity::update_many()
                    .col_expr(purchases::Column::Applied, Expr::value(true))
                    .filter(purchases::Column::Id.is_in(contributing_purchases))
                    .exec(&db_tx)
                    .await?;
            }
            let contributing_weighings: Vec<String> = active_weighings
                .iter()
                .filter(|weighing| {
                    company_of
                        .get(weighing.purchase_id.as_str())
                        .is_some_and(|company_id| {
                            rebuilt_pairs.contains(&(
                                (*company_id).to_string(),
                                weighing.mineral_id.clone(),
                            ))
                        })
                })
                .map(|weighing| weighing.id.clone())
                .collect();
            if !contributing_weighings.is_empty() {
                weighings::Entity::update_many()
                    .col_expr(weighings::Column::Applied, Expr::value(true))
                    .filter(weighings::Column::Id.is_in(contributing_weighings))
                    .exec(&db_tx)
                    .await?;
            }

            report.companies_processed = company_set.len() as u64;
            report.minerals_processed = mineral_set.len() as u64;
            info!(
                companies = report.companies_processed,
                minerals = report.minerals_processed,
                created = report.balances_created,
                "recalculated balances"
            );
            Ok(report)
        })
    }

    /// Collapse duplicate active balance rows per (company, mineral) pair.
    ///
    /// The oldest row survives with the summed amount; the rest are
    /// soft-deleted. Duplicates can only exist in databases that predate the
    /// partial unique index.
    pub async fn merge_duplicates(&self) -> ResultEngine<MergeReport> {
        with_tx!(self, |db_tx| {
            let rows = balances::Entity::find()
                .filter(balances::Column::DeletedAt.is_null())
                .order_by_asc(balances::Column::CreatedAt)
                .order_by_asc(balances::Column::Id)
                .all(&db_tx)
                .await?;

            let mut groups: BTreeMap<(String, String), Vec<balances::Model>> = BTreeMap::new();
            for row in rows {
                groups
                    .entry((row.company_id.clone(), row.mineral_id.clone()))
                    .or_default()
                    .push(row);
            }

            let mut report = MergeReport {
                group_count: 0,
                fixed_count: 0,
            };
            let stamp = Utc::now();
            for (_, group) in groups {
                if group.len() < 2 {
                    continue;
                }
                report.group_count += 1;

                let total: i64 = group.iter().map(|row| row.amount).sum();
                let mut iter = group.into_iter();
                let keeper = match iter.next() {
                    Some(row) => row,
                    None => continue,
                };
                post_amount(&db_tx, &keeper.id, total).await?;
                for extra in iter {
                    stamp_deleted::<balances::Entity>(&db_tx, &extra.id, stamp, None).await?;
                    report.fixed_count += 1;
                }
            }

            info!(
                groups = report.group_count,
                fixed = report.fixed_count,
                "merged duplicate balances"
            );
            Ok(report)
        })
    }
}
