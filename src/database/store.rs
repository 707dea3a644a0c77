use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use super::changes::Changes;
use super::manager::DatabaseError;
use crate::entities::EntityKind;
use crate::filter::Filter;

/// Who a record belongs to, found by walking its owner links
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ownership {
    /// No record with that id
    Missing,
    /// The record exists but a null link leaves it without a tenant
    Orphaned,
    Tenant(String),
}

/// Persistence boundary used by the handlers.
/// Rows travel as JSON objects shaped like the table.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn ownership(&self, kind: EntityKind, id: Uuid) -> Result<Ownership, DatabaseError>;

    async fn find_first(&self, filter: &Filter) -> Result<Option<Value>, DatabaseError>;

    async fn find_many(&self, filter: &Filter) -> Result<Vec<Value>, DatabaseError>;

    async fn insert(&self, kind: EntityKind, changes: &Changes) -> Result<Value, DatabaseError>;

    /// Fails with `NotFound` when no row has that id
    async fn update(&self, kind: EntityKind, id: Uuid, changes: &Changes) -> Result<Value, DatabaseError>;

    /// Returns the deleted row. `NotFound` when absent, `Conflict` when dependents block it.
    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<Value, DatabaseError>;
}
