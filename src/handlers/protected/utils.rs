use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::database::{DatabaseError, Store};
use crate::entities::{EntityKind, Relation, RelationKind};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::validation::decode_fields;

/// Decode a request body into an allow-listed payload.
/// Unknown and system fields are dropped by the payload type; an empty body reads as `{}`.
pub fn parse_payload<P: DeserializeOwned>(body: &Bytes) -> Result<P, ApiError> {
    let value: Value = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Default::default())
    } else {
        serde_json::from_slice(body).map_err(|e| ApiError::invalid_json(format!("Malformed JSON body: {}", e)))?
    };

    let Value::Object(fields) = value else {
        return Err(ApiError::bad_request("Request body must be a JSON object"));
    };

    decode_fields(fields).map_err(|field_errors| ApiError::validation_error("Invalid payload", Some(field_errors)))
}

/// `id` of a row returned by the store
pub fn row_id(row: &Value) -> Option<Uuid> {
    row.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok())
}

/// Store row in the shape of the entity's row type
pub fn shape_row(kind: EntityKind, row: Value) -> Result<Value, DatabaseError> {
    kind.shape(row)
        .map_err(|e| DatabaseError::QueryError(format!("{} row does not match its columns: {}", kind, e)))
}

pub fn shape_rows(kind: EntityKind, rows: Vec<Value>) -> Result<Vec<Value>, DatabaseError> {
    rows.into_iter().map(|row| shape_row(kind, row)).collect()
}

/// Load requested relations onto `row`, keyed by relation name
pub async fn attach_includes(store: &dyn Store, row: &mut Value, include: &[&'static Relation]) -> Result<(), DatabaseError> {
    let Some(obj) = row.as_object_mut() else {
        return Ok(());
    };

    for relation in include {
        let value = match relation.kind {
            RelationKind::BelongsTo => {
                let target_id = obj
                    .get(relation.column)
                    .and_then(Value::as_str)
                    .and_then(|s| Uuid::parse_str(s).ok());
                match target_id {
                    Some(id) => match store.find_first(&Filter::by_id(relation.target, id)).await? {
                        Some(target) => shape_row(relation.target, target)?,
                        None => Value::Null,
                    },
                    None => Value::Null,
                }
            }
            RelationKind::HasMany => {
                let own_id = obj.get("id").and_then(Value::as_str).and_then(|s| Uuid::parse_str(s).ok());
                match own_id {
                    Some(id) => {
                        let rows = store
                            .find_many(&Filter::by_column(relation.target, relation.column, id))
                            .await?;
                        Value::Array(shape_rows(relation.target, rows)?)
                    }
                    None => Value::Array(vec![]),
                }
            }
        };
        obj.insert(relation.name.to_string(), value);
    }

    Ok(())
}
