use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{push_reference, EntityKind, Reference, WritePayload};
use crate::database::{Changes, ColumnValue};
use crate::validation::{double_option, validate_not_blank};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub information: String,
    pub organization_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct VehiclePayload {
    #[validate(required, custom = "validate_not_blank")]
    pub information: Option<String>,

    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<Option<Uuid>>,
}

impl WritePayload for VehiclePayload {
    fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        if let Some(information) = &self.information {
            changes.set("information", ColumnValue::Text(Some(information.clone())));
        }
        if let Some(organization_id) = self.organization_id {
            changes.set("organization_id", ColumnValue::Uuid(organization_id));
        }
        changes
    }

    fn references(&self) -> Vec<Reference> {
        let mut refs = Vec::new();
        push_reference(&mut refs, "organization_id", EntityKind::Organization, &self.organization_id);
        refs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::field_messages;

    #[test]
    fn information_is_required() {
        let payload: VehiclePayload = serde_json::from_str(r#"{"organization_id":null}"#).unwrap();
        let errors = field_messages(&payload.validate().unwrap_err());
        assert_eq!(errors["information"], "information is a required field");

        let blank: VehiclePayload = serde_json::from_str(r#"{"information":"   "}"#).unwrap();
        assert!(blank.validate().is_err());
    }

    #[test]
    fn system_fields_never_reach_the_store() {
        let payload: VehiclePayload = serde_json::from_str(
            r#"{"id":"00000000-0000-0000-0000-000000000000","information":"Van","created_at":"2020-01-01","tenant_id":"x"}"#,
        )
        .unwrap();
        payload.validate().unwrap();

        let changes = payload.changes();
        assert_eq!(changes.columns(), vec!["information"]);
    }

    #[test]
    fn null_organization_clears_the_link() {
        let payload: VehiclePayload = serde_json::from_str(r#"{"information":"Van","organization_id":null}"#).unwrap();
        assert_eq!(payload.changes().columns(), vec!["information", "organization_id"]);
        assert!(payload.references().is_empty());

        let id = Uuid::new_v4();
        let payload: VehiclePayload =
            serde_json::from_value(serde_json::json!({"information": "Van", "organization_id": id})).unwrap();
        assert_eq!(
            payload.references(),
            vec![Reference { field: "organization_id", kind: EntityKind::Organization, id }]
        );
    }
}
