use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Reference, WritePayload};
use crate::database::{Changes, ColumnValue};
use crate::validation::double_option;

/// Directory entry for a person who can hold reservations.
/// Not the same thing as the authenticated caller (`SessionContext`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub tenant_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UserPayload {
    #[validate(required, email)]
    pub email: Option<String>,

    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<Option<String>>,
}

impl WritePayload for UserPayload {
    fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        if let Some(email) = &self.email {
            changes.set("email", ColumnValue::Text(Some(email.trim().to_string())));
        }
        if let Some(first_name) = &self.first_name {
            changes.set("first_name", ColumnValue::Text(first_name.clone()));
        }
        if let Some(last_name) = &self.last_name {
            changes.set("last_name", ColumnValue::Text(last_name.clone()));
        }
        changes
    }

    fn references(&self) -> Vec<Reference> {
        Vec::new()
    }
}
