use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Reference, WritePayload};
use crate::database::{Changes, ColumnValue};
use crate::validation::{double_option, validate_not_blank};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// `tenant_id` is not writable here; it is taken from the caller's session on create
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct OrganizationPayload {
    #[validate(required, custom = "validate_not_blank")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
}

impl WritePayload for OrganizationPayload {
    fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        if let Some(name) = &self.name {
            changes.set("name", ColumnValue::Text(Some(name.clone())));
        }
        if let Some(description) = &self.description {
            changes.set("description", ColumnValue::Text(description.clone()));
        }
        changes
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }
}
