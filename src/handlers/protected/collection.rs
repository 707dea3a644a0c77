//! `/api/<entity>` - list (tenant-scoped) and create.

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::Method,
    Extension, Json,
};
use serde_json::Value;
use tracing::debug;
use validator::Validate;

use super::utils::{attach_includes, parse_payload, row_id, shape_row, shape_rows};
use crate::auth::SessionContext;
use crate::database::ColumnValue;
use crate::entities::{Entity, EntityKind, WritePayload, TENANT_COLUMN};
use crate::error::ApiError;
use crate::filter::{Filter, RecordQuery};
use crate::notify::Notification;
use crate::state::AppState;
use crate::types::Operation;

/// Handler for every method on a collection route
pub async fn collection<E: Entity>(
    State(state): State<AppState>,
    Extension(session): Extension<SessionContext>,
    method: Method,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let kind = E::KIND;
    let op = Operation::for_collection(&method).ok_or_else(|| ApiError::method_not_allowed(method.as_str()))?;

    state.access.check_collection(&session, kind, op).await?;
    debug!(user = %session.user_id, "{} {} collection", op, kind);

    match op {
        Operation::Read => list_records(&state, &session, kind, query.as_deref()).await,
        Operation::Create => create_record::<E>(&state, &session, &body).await,
        Operation::Update | Operation::Delete => Err(ApiError::method_not_allowed(method.as_str())),
    }
}

async fn list_records(
    state: &AppState,
    session: &SessionContext,
    kind: EntityKind,
    query: Option<&str>,
) -> Result<Json<Value>, ApiError> {
    let query = RecordQuery::parse(kind, query)?;

    let mut data = query.filter;
    let (limit, offset) = (data.limit.take(), data.offset.take());

    let mut filter = Filter::new(kind);
    filter.assign(data)?;
    filter.limit(limit, offset)?;
    filter.scope_to_tenant(&session.tenant_id);

    let mut rows = shape_rows(kind, state.store.find_many(&filter).await?)?;
    for row in rows.iter_mut() {
        attach_includes(state.store.as_ref(), row, &query.include).await?;
    }
    Ok(Json(Value::Array(rows)))
}

async fn create_record<E: Entity>(state: &AppState, session: &SessionContext, body: &Bytes) -> Result<Json<Value>, ApiError> {
    let kind = E::KIND;
    let payload: E::Payload = parse_payload(body)?;
    payload.validate()?;
    state.access.check_references(session, &payload.references()).await?;

    let mut changes = payload.changes();
    if kind.column(TENANT_COLUMN).is_some() {
        changes.set(TENANT_COLUMN, ColumnValue::Text(Some(session.tenant_id.clone())));
    }

    let row = shape_row(kind, state.store.insert(kind, &changes).await?)?;
    let id = row_id(&row).ok_or_else(|| {
        tracing::error!("Inserted {} row has no id: {}", kind, row);
        ApiError::internal_server_error("An error occurred while processing your request")
    })?;

    state
        .notifier
        .notify(&Notification::new(session, kind, id, Operation::Create))
        .await?;

    Ok(Json(row))
}
