use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{push_reference, EntityKind, Reference, WritePayload};
use crate::database::{Changes, ColumnValue};
use crate::validation::{double_option, lenient_int, parse_date, validate_date};

/// A usage log entry: how long a vehicle was in use on a given date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub date: DateTime<Utc>,
    pub usage_time: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UsagePayload {
    #[validate(required, custom = "validate_date")]
    pub date: Option<String>,

    #[serde(default, deserialize_with = "lenient_int")]
    #[validate(required)]
    pub usage_time: Option<i64>,

    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Option<Uuid>>,
}

impl WritePayload for UsagePayload {
    fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        if let Some(date) = self.date.as_deref().and_then(parse_date) {
            changes.set("date", ColumnValue::Timestamp(date));
        }
        if let Some(usage_time) = self.usage_time {
            changes.set("usage_time", ColumnValue::Integer(usage_time));
        }
        if let Some(vehicle_id) = self.vehicle_id {
            changes.set("vehicle_id", ColumnValue::Uuid(vehicle_id));
        }
        changes
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        push_reference(&mut refs, "vehicle_id", EntityKind::Vehicle, &self.vehicle_id);
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::field_messages;

    #[test]
    fn requires_date_and_usage_time() {
        let payload: UsagePayload = serde_json::from_str("{}").unwrap();
        let errors = field_messages(&payload.validate().unwrap_err());
        assert!(errors.contains_key("date"));
        assert!(errors.contains_key("usage_time"));
    }

    #[test]
    fn converts_date_for_storage() {
        let payload: UsagePayload = serde_json::from_str(r#"{"date":"2024-05-02","usage_time":"45"}"#).unwrap();
        payload.validate().unwrap();

        let changes = payload.changes();
        assert_eq!(changes.columns(), vec!["date", "usage_time"]);
        assert_eq!(changes.get("usage_time"), Some(&ColumnValue::Integer(45)));
    }

    #[test]
    fn rejects_unparseable_date() {
        let payload: UsagePayload = serde_json::from_str(r#"{"date":"next tuesday","usage_time":1}"#).unwrap();
        let errors = field_messages(&payload.validate().unwrap_err());
        assert_eq!(errors["date"], "date must be a valid date");
    }
}
