//! Soft-delete cascade and balance ledger engine for the mineral registry.
//!
//! The engine owns two tightly coupled concerns:
//!
//! - lifecycle state (active/deleted) across the entity graph, with
//!   declarative cascade policies and reversible restoration;
//! - the per (company, mineral) running balance, credited by purchases and
//!   debited by weighings, applied exactly once per event.
//!
//! Every mutating operation runs inside a single database transaction;
//! partial cascades or half-posted ledger effects are never observable.

pub use error::EngineError;
pub use lifecycle::{
    CascadeLink, CascadeRule, EntityKind, LifecycleState, SoftDeletable, cascade_policy,
};
pub use ops::{Engine, EngineBuilder, MergeReport, RecalculationReport};
pub use tracked_relationships::TrackedLink;

mod balances;
mod companies;
mod company_vehicles;
mod error;
mod lifecycle;
mod minerals;
mod ops;
mod purchases;
mod scales;
mod tracked_relationships;
mod units;
mod vehicle_types;
mod vehicles;
mod weighings;

type ResultEngine<T> = Result<T, EngineError>;
