use sea_orm::DatabaseConnection;

use crate::{EngineError, ResultEngine};

mod ledger;
mod lifecycle;
mod reconcile;
mod records;
mod tracked;

pub use reconcile::{MergeReport, RecalculationReport};

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// Pick the concrete entity type for a runtime [`crate::EntityKind`] value.
///
/// The cascade machinery is generic over `SoftDeletable`, but callers hand us
/// a kind at runtime; this is the single place where the two meet. The ident
/// passed as `$entity` becomes a type alias visible inside `$body`.
macro_rules! dispatch_kind {
    ($kind:expr, $entity:ident => $body:expr) => {{
        match $kind {
            crate::EntityKind::Unit => {
                type $entity = crate::units::Entity;
                $body
            }
            crate::EntityKind::Mineral => {
                type $entity = crate::minerals::Entity;
                $body
            }
            crate::EntityKind::VehicleType => {
                type $entity = crate::vehicle_types::Entity;
                $body
            }
            crate::EntityKind::Vehicle => {
                type $entity = crate::vehicles::Entity;
                $body
            }
            crate::EntityKind::Company => {
                type $entity = crate::companies::Entity;
                $body
            }
            crate::EntityKind::Scale => {
                type $entity = crate::scales::Entity;
                $body
            }
            crate::EntityKind::Purchase => {
                type $entity = crate::purchases::Entity;
                $body
            }
            crate::EntityKind::Weighing => {
                type $entity = crate::weighings::Entity;
                $body
            }
            crate::EntityKind::Balance => {
                type $entity = crate::balances::Entity;
                $body
            }
        }
    }};
}

pub(crate) use dispatch_kind;

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }
}

fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAmount(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

fn require_positive(value: i64, label: &str) -> ResultEngine<i64> {
    if value <= 0 {
        return Err(EngineError::InvalidAmount(format!(
            "{label} must be positive, got {value}"
        )));
    }
    Ok(value)
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub async fn build(self) -> ResultEngine<Engine> {
        Ok(Engine {
            database: self.database,
        })
    }
}
