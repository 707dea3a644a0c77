//! `/api/<entity>/:id` - read, update and delete one record.
//!
//! Each request runs identity (middleware) -> method mapping -> access check ->
//! validation -> persistence -> notification -> response, in that order.
//! Update persists before notifying; delete notifies before deleting.

use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::Method,
    Extension, Json,
};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;
use validator::Validate;

use super::utils::{attach_includes, parse_payload, row_id, shape_row};
use crate::auth::SessionContext;
use crate::entities::{Entity, EntityKind, WritePayload};
use crate::error::ApiError;
use crate::filter::{Filter, RecordQuery};
use crate::notify::Notification;
use crate::state::AppState;
use crate::types::Operation;

/// Handler for every method on a record route
pub async fn record<E: Entity>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    method: Method,
    Path(id): Path<String>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let kind = E::KIND;
    let op = Operation::for_record(&method).ok_or_else(|| ApiError::method_not_allowed(method.as_str()))?;

    // A malformed id cannot name an existing record
    let id = Uuid::parse_str(&id).map_err(|_| ApiError::not_found(format!("{} {} not found", kind, id)))?;

    state.access.check_record(&session, kind, id, op).await?;
    debug!(user = %session.user_id, "{} {} {}", op, kind, id);

    match op {
        Operation::Read => read_record(&state, kind, id, query.as_deref()).await,
        Operation::Update => update_record::<E>(&state, &session, id, &body).await,
        Operation::Delete => delete_record(&state, &session, kind, id).await,
        Operation::Create => Err(ApiError::method_not_allowed(method.as_str())),
    }
}

/// Returns `null` when caller-supplied filters exclude the record
async fn read_record(state: &AppState, kind: EntityKind, id: Uuid, query: Option<&str>) -> Result<Json<Value>, ApiError> {
    let query = RecordQuery::parse(kind, query)?;

    let mut filter = Filter::by_id(kind, id);
    let mut data = query.filter;
    data.limit = None;
    data.offset = None;
    filter.assign(data)?;

    let mut row = match state.store.find_first(&filter).await? {
        Some(row) => shape_row(kind, row)?,
        None => Value::Null,
    };
    attach_includes(state.store.as_ref(), &mut row, &query.include).await?;
    Ok(Json(row))
}

async fn update_record<E: Entity>(
    state: &AppState,
    session: &SessionContext,
    id: Uuid,
    body: &Bytes,
) -> Result<Json<Value>, ApiError> {
    let kind = E::KIND;
    let payload: E::Payload = parse_payload(body)?;
    payload.validate()?;
    state.access.check_references(session, &payload.references()).await?;

    let row = shape_row(kind, state.store.update(kind, id, &payload.changes()).await?)?;

    let resource_id = row_id(&row).unwrap_or(id);
    state
        .notifier
        .notify(&Notification::new(session, kind, resource_id, Operation::Update))
        .await?;

    Ok(Json(row))
}

async fn delete_record(state: &AppState, session: &SessionContext, kind: EntityKind, id: Uuid) -> Result<Json<Value>, ApiError> {
    state
        .notifier
        .notify(&Notification::new(session, kind, id, Operation::Delete))
        .await?;

    let row = state.store.delete(kind, id).await?;
    Ok(Json(shape_row(kind, row)?))
}
