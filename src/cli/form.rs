//! `fleetctl edit`: fetch, override, validate locally, submit.
//!
//! The draft is checked against the same payload types and `validator` rules
//! the server applies, so an invalid edit never leaves the machine.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;
use validator::Validate;

use super::client::{ApiClient, ClientError};
use crate::entities::{
    EntityKind, OrganizationPayload, PerformanceAssessmentPayload, ReservationPayload, UsagePayload, UserPayload,
    VehiclePayload,
};
use crate::validation::{decode_fields, field_messages};

#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid override '{0}' (expected field=value)")]
    InvalidOverride(String),

    #[error("{0} is not a JSON object")]
    NotAnObject(String),

    #[error("invalid payload: {0}")]
    Malformed(String),

    #[error("validation failed: {}", format_fields(.0))]
    Invalid(HashMap<String, String>),

    #[error(transparent)]
    Client(#[from] ClientError),
}

fn format_fields(fields: &HashMap<String, String>) -> String {
    let mut messages: Vec<&str> = fields.values().map(String::as_str).collect();
    messages.sort_unstable();
    messages.join("; ")
}

/// Result of a successful submit
#[derive(Debug, Clone)]
pub struct FormOutcome {
    pub entity: Value,
    /// Collection view the form returns to after saving
    pub return_path: String,
}

/// Editable copy of one record. `id == None` means create mode.
#[derive(Debug, Clone)]
pub struct EntityForm {
    kind: EntityKind,
    id: Option<String>,
    draft: Map<String, Value>,
}

impl EntityForm {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            id: None,
            draft: Map::new(),
        }
    }

    pub fn with_record(kind: EntityKind, id: impl Into<String>, record: Value) -> Result<Self, FormError> {
        match record {
            Value::Object(draft) => Ok(Self {
                kind,
                id: Some(id.into()),
                draft,
            }),
            other => Err(FormError::NotAnObject(other.to_string())),
        }
    }

    /// Loads the current record when an id is given; otherwise starts empty
    pub async fn open(client: &ApiClient, kind: EntityKind, id: Option<&str>) -> Result<Self, FormError> {
        match id {
            Some(id) => {
                let record = client.get(kind, id, &[]).await?;
                Self::with_record(kind, id, record)
            }
            None => Ok(Self::new(kind)),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn is_create(&self) -> bool {
        self.id.is_none()
    }

    pub fn draft(&self) -> &Map<String, Value> {
        &self.draft
    }

    pub fn apply(&mut self, overrides: &[(String, Value)]) {
        for (field, value) in overrides {
            self.draft.insert(field.clone(), value.clone());
        }
    }

    /// Validated request body restricted to the entity's writable fields
    pub fn body(&self) -> Result<Value, FormError> {
        let draft = self.draft.clone();
        match self.kind {
            EntityKind::Organization => checked::<OrganizationPayload>(draft),
            EntityKind::Vehicle => checked::<VehiclePayload>(draft),
            EntityKind::Usage => checked::<UsagePayload>(draft),
            EntityKind::PerformanceAssessment => checked::<PerformanceAssessmentPayload>(draft),
            EntityKind::Reservation => checked::<ReservationPayload>(draft),
            EntityKind::User => checked::<UserPayload>(draft),
        }
    }

    pub async fn submit(mut self, client: &ApiClient, overrides: &[(String, Value)]) -> Result<FormOutcome, FormError> {
        self.apply(overrides);
        let body = self.body()?;

        let entity = match &self.id {
            Some(id) => client.update(self.kind, id, &body).await?,
            None => client.create(self.kind, &body).await?,
        };

        Ok(FormOutcome {
            entity,
            return_path: format!("/{}", self.kind.route()),
        })
    }
}

fn checked<P>(draft: Map<String, Value>) -> Result<Value, FormError>
where
    P: serde::de::DeserializeOwned + serde::Serialize + Validate,
{
    let payload: P = decode_fields(draft).map_err(FormError::Invalid)?;
    payload.validate().map_err(|e| FormError::Invalid(field_messages(&e)))?;
    serde_json::to_value(&payload).map_err(|e| FormError::Malformed(e.to_string()))
}

/// `field=value` pairs; values that parse as JSON keep their type, anything else is a string
pub fn parse_overrides(pairs: &[String]) -> Result<Vec<(String, Value)>, FormError> {
    pairs
        .iter()
        .map(|pair| {
            let (field, raw) = pair
                .split_once('=')
                .filter(|(field, _)| !field.trim().is_empty())
                .ok_or_else(|| FormError::InvalidOverride(pair.clone()))?;
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((field.trim().to_string(), value))
        })
        .collect()
}
