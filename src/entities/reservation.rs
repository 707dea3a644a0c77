use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{push_reference, EntityKind, Reference, WritePayload};
use crate::database::{Changes, ColumnValue};
use crate::validation::{double_option, parse_date, schema_error, validate_date};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_window"))]
pub struct ReservationPayload {
    #[validate(required, custom = "validate_date")]
    pub start_time: Option<String>,

    #[validate(required, custom = "validate_date")]
    pub end_time: Option<String>,

    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Option<Uuid>>,

    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Option<Uuid>>,
}

fn validate_window(payload: &ReservationPayload) -> Result<(), ValidationError> {
    let start = payload.start_time.as_deref().and_then(parse_date);
    let end = payload.end_time.as_deref().and_then(parse_date);

    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(schema_error(
            "end_time",
            "window",
            "end_time must not be before start_time",
        )),
        _ => Ok(()),
    }
}

impl WritePayload for ReservationPayload {
    fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        if let Some(start) = self.start_time.as_deref().and_then(parse_date) {
            changes.set("start_time", ColumnValue::Timestamp(start));
        }
        if let Some(end) = self.end_time.as_deref().and_then(parse_date) {
            changes.set("end_time", ColumnValue::Timestamp(end));
        }
        if let Some(vehicle_id) = self.vehicle_id {
            changes.set("vehicle_id", ColumnValue::Uuid(vehicle_id));
        }
        if let Some(user_id) = self.user_id {
            changes.set("user_id", ColumnValue::Uuid(user_id));
        }
        changes
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        push_reference(&mut refs, "vehicle_id", EntityKind::Vehicle, &self.vehicle_id);
        push_reference(&mut refs, "user_id", EntityKind::User, &self.user_id);
        refs
    }
}
