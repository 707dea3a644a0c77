//! Access decisions: role-level permission first, then tenant ownership of the
//! specific record.

pub mod policy;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::auth::SessionContext;
use crate::database::{DatabaseError, Ownership, Store};
use crate::entities::{EntityKind, Reference};
use crate::types::Operation;

pub use policy::{PolicyError, RolePolicy};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("{0}")]
    Denied(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{field}: {message}")]
    MissingReference { field: String, message: String },

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Gate an operation on one existing record
    async fn check_record(
        &self,
        session: &SessionContext,
        kind: EntityKind,
        id: Uuid,
        op: Operation,
    ) -> Result<(), AccessError>;

    /// Gate an operation on the collection (list, create)
    async fn check_collection(&self, session: &SessionContext, kind: EntityKind, op: Operation)
        -> Result<(), AccessError>;

    /// Foreign keys in a write must point at records the caller's tenant owns
    async fn check_references(&self, session: &SessionContext, references: &[Reference]) -> Result<(), AccessError>;
}

/// Role policy plus tenant ownership looked up through the store
pub struct TenantAccessControl {
    policy: RolePolicy,
    store: Arc<dyn Store>,
}

impl TenantAccessControl {
    pub fn new(policy: RolePolicy, store: Arc<dyn Store>) -> Self {
        Self { policy, store }
    }

    fn check_role(&self, session: &SessionContext, kind: EntityKind, op: Operation) -> Result<(), AccessError> {
        if self.policy.allows(&session.roles, kind, op) {
            return Ok(());
        }
        warn!(user = %session.user_id, roles = ?session.roles, "role may not {} {}", op, kind);
        Err(AccessError::Denied(format!("Not allowed to {} {}", op, kind)))
    }
}

#[async_trait]
impl AccessControl for TenantAccessControl {
    async fn check_record(
        &self,
        session: &SessionContext,
        kind: EntityKind,
        id: Uuid,
        op: Operation,
    ) -> Result<(), AccessError> {
        self.check_role(session, kind, op)?;

        match self.store.ownership(kind, id).await? {
            Ownership::Tenant(tenant_id) if tenant_id == session.tenant_id => Ok(()),
            Ownership::Missing => Err(AccessError::NotFound(format!("{} {} not found", kind, id))),
            Ownership::Tenant(_) | Ownership::Orphaned => {
                warn!(user = %session.user_id, tenant = %session.tenant_id, "{} {} is outside the caller's tenant", kind, id);
                Err(AccessError::Denied(format!("Not allowed to {} this {}", op, kind)))
            }
        }
    }

    async fn check_collection(
        &self,
        session: &SessionContext,
        kind: EntityKind,
        op: Operation,
    ) -> Result<(), AccessError> {
        self.check_role(session, kind, op)
    }

    async fn check_references(&self, session: &SessionContext, references: &[Reference]) -> Result<(), AccessError> {
        for reference in references {
            match self.store.ownership(reference.kind, reference.id).await? {
                Ownership::Tenant(tenant_id) if tenant_id == session.tenant_id => {}
                Ownership::Missing => {
                    return Err(AccessError::MissingReference {
                        field: reference.field.to_string(),
                        message: format!("{} does not reference an existing {}", reference.field, reference.kind),
                    })
                }
                Ownership::Tenant(_) | Ownership::Orphaned => {
                    warn!(user = %session.user_id, "{} points outside the caller's tenant", reference.field);
                    return Err(AccessError::Denied(format!("Not allowed to reference this {}", reference.kind)));
                }
            }
        }
        Ok(())
    }
}
