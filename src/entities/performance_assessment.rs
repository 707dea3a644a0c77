use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{push_reference, EntityKind, Reference, WritePayload};
use crate::database::{Changes, ColumnValue};
use crate::validation::{double_option, validate_not_blank};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceAssessment {
    pub id: Uuid,
    pub vehicle_id: Option<Uuid>,
    pub assessment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PerformanceAssessmentPayload {
    #[validate(required, custom = "validate_not_blank")]
    pub assessment: Option<String>,

    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub vehicle_id: Option<Option<Uuid>>,
}

impl WritePayload for PerformanceAssessmentPayload {
    fn changes(&self) -> Changes {
        let mut changes = Changes::new();
        if let Some(assessment) = &self.assessment {
            changes.set("assessment", ColumnValue::Text(Some(assessment.clone())));
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
