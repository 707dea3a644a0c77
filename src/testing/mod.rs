//! In-process doubles for handler and access tests: a `Store` that keeps rows
//! in memory and a `Notifier` that records what it was asked to send. Both
//! write to a shared [`Journal`] so tests can assert on call order.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request};
use axum::Router;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::access::{RolePolicy, TenantAccessControl};
use crate::auth::{generate_jwt, Claims};
use crate::database::{Changes, DatabaseError, Ownership, Store};
use crate::entities::{ColumnType, EntityKind, RelationKind, TENANT_COLUMN};
use crate::filter::{Condition, Filter, FilterOp, SortDirection};
use crate::notify::{Notification, Notifier, NotifyError};
use crate::state::AppState;
use crate::validation::parse_date;

/// Ordered log of store mutations and notifications
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

type Row = Map<String, Value>;

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<EntityKind, Vec<Row>>>,
    journal: Journal,
    offline: bool,
}

impl MemoryStore {
    pub fn new(journal: Journal) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            journal,
            offline: false,
        }
    }

    /// Every call fails as if the database were unreachable
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    /// Insert a row directly, bypassing handlers and the journal. Missing
    /// columns default to null; `id` and timestamps are filled in.
    pub fn seed(&self, kind: EntityKind, fields: Value) -> Value {
        let mut row = blank_row(kind);
        if let Value::Object(fields) = fields {
            row.extend(fields);
        }
        if row.get("id").map_or(true, Value::is_null) {
            row.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        let now = stamp(Utc::now());
        for column in ["created_at", "updated_at"] {
            if row.get(column).map_or(true, Value::is_null) {
                row.insert(column.into(), Value::String(now.clone()));
            }
        }
        self.tables.lock().unwrap().entry(kind).or_default().push(row.clone());
        Value::Object(row)
    }

    pub fn get(&self, kind: EntityKind, id: Uuid) -> Option<Value> {
        let tables = self.tables.lock().unwrap();
        find_row(&tables, kind, &id.to_string()).cloned().map(Value::Object)
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.tables.lock().unwrap().get(&kind).map_or(0, Vec::len)
    }

    fn check_online(&self) -> Result<(), DatabaseError> {
        if self.offline {
            return Err(DatabaseError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }
}

fn blank_row(kind: EntityKind) -> Row {
    kind.columns().iter().map(|c| (c.name.to_string(), Value::Null)).collect()
}

fn stamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn find_row<'a>(tables: &'a HashMap<EntityKind, Vec<Row>>, kind: EntityKind, id: &str) -> Option<&'a Row> {
    tables.get(&kind)?.iter().find(|row| row.get("id").and_then(Value::as_str) == Some(id))
}

fn ownership_of(tables: &HashMap<EntityKind, Vec<Row>>, kind: EntityKind, row: &Row) -> Ownership {
    let mut current = row;
    for (column, parent) in kind.owner_chain() {
        let Some(parent_id) = current.get(column).and_then(Value::as_str) else {
            return Ownership::Orphaned;
        };
        match find_row(tables, parent, parent_id) {
            Some(parent_row) => current = parent_row,
            None => return Ownership::Orphaned,
        }
    }
    match current.get(TENANT_COLUMN).and_then(Value::as_str) {
        Some(tenant) => Ownership::Tenant(tenant.to_string()),
        None => Ownership::Orphaned,
    }
}

fn row_matches(tables: &HashMap<EntityKind, Vec<Row>>, kind: EntityKind, row: &Row, condition: &Condition) -> bool {
    match condition {
        Condition::Compare { column, op, value } => {
            let field = row.get(column.name).unwrap_or(&Value::Null);
            if field.is_null() {
                return false;
            }
            match (op, value) {
                (FilterOp::In, Value::Array(values)) => values.iter().any(|v| compare(column.ty, field, v) == Some(Ordering::Equal)),
                (FilterOp::NIn, Value::Array(values)) => values.iter().all(|v| compare(column.ty, field, v) != Some(Ordering::Equal)),
                (FilterOp::Between, Value::Array(bounds)) if bounds.len() == 2 => {
                    matches!(compare(column.ty, field, &bounds[0]), Some(Ordering::Greater | Ordering::Equal))
                        && matches!(compare(column.ty, field, &bounds[1]), Some(Ordering::Less | Ordering::Equal))
                }
                (FilterOp::Like, Value::String(pattern)) => field.as_str().is_some_and(|s| like(pattern, s)),
                (FilterOp::ILike, Value::String(pattern)) => {
                    field.as_str().is_some_and(|s| like(&pattern.to_lowercase(), &s.to_lowercase()))
                }
                _ => match compare(column.ty, field, value) {
                    Some(ordering) => match op {
                        FilterOp::Eq => ordering == Ordering::Equal,
                        FilterOp::Ne => ordering != Ordering::Equal,
                        FilterOp::Gt => ordering == Ordering::Greater,
                        FilterOp::Gte => ordering != Ordering::Less,
                        FilterOp::Lt => ordering == Ordering::Less,
                        FilterOp::Lte => ordering != Ordering::Greater,
                        _ => false,
                    },
                    None => false,
                },
            }
        }
        Condition::IsNull { column, negated } => row.get(column.name).map_or(true, Value::is_null) != *negated,
        Condition::And(parts) => parts.iter().all(|c| row_matches(tables, kind, row, c)),
        Condition::Or(parts) => parts.iter().any(|c| row_matches(tables, kind, row, c)),
        Condition::Not(inner) => !row_matches(tables, kind, row, inner),
        Condition::Tenant(tenant) => ownership_of(tables, kind, row) == Ownership::Tenant(tenant.clone()),
    }
}

fn compare(ty: ColumnType, left: &Value, right: &Value) -> Option<Ordering> {
    match ty {
        ColumnType::Integer => Some(left.as_i64()?.cmp(&right.as_i64()?)),
        ColumnType::Timestamp => Some(parse_date(left.as_str()?)?.cmp(&parse_date(right.as_str()?)?)),
        ColumnType::Uuid | ColumnType::Text => Some(left.as_str()?.cmp(right.as_str()?)),
    }
}

/// SQL `LIKE` with `%` and `_` wildcards
fn like(pattern: &str, text: &str) -> bool {
    fn go(p: &[char], t: &[char]) -> bool {
        match p.split_first() {
            None => t.is_empty(),
            Some(('%', rest)) => (0..=t.len()).any(|i| go(rest, &t[i..])),
            Some(('_', rest)) => !t.is_empty() && go(rest, &t[1..]),
            Some((c, rest)) => t.first() == Some(c) && go(rest, &t[1..]),
        }
    }
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    go(&p, &t)
}

fn apply_changes(kind: EntityKind, row: &mut Row, changes: &Changes) -> Result<(), DatabaseError> {
    for (column, value) in changes.iter() {
        if kind.column(column).is_none() {
            return Err(DatabaseError::QueryError(format!("column \"{}\" does not exist", column)));
        }
        row.insert(column.to_string(), value.to_json());
    }
    Ok(())
}

fn check_foreign_keys(tables: &HashMap<EntityKind, Vec<Row>>, kind: EntityKind, row: &Row) -> Result<(), DatabaseError> {
    for relation in kind.relations().iter().filter(|r| r.kind == RelationKind::BelongsTo) {
        if let Some(target_id) = row.get(relation.column).and_then(Value::as_str) {
            if find_row(tables, relation.target, target_id).is_none() {
                return Err(DatabaseError::Conflict(format!(
                    "{}.{} references a missing {}",
                    kind, relation.column, relation.target
                )));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        self.check_online()
    }

    async fn ownership(&self, kind: EntityKind, id: Uuid) -> Result<Ownership, DatabaseError> {
        self.check_online()?;
        let tables = self.tables.lock().unwrap();
        Ok(match find_row(&tables, kind, &id.to_string()) {
            Some(row) => ownership_of(&tables, kind, row),
            None => Ownership::Missing,
        })
    }

    async fn find_first(&self, filter: &Filter) -> Result<Option<Value>, DatabaseError> {
        Ok(self.find_many(filter).await?.into_iter().next())
    }

    async fn find_many(&self, filter: &Filter) -> Result<Vec<Value>, DatabaseError> {
        self.check_online()?;
        let kind = filter.kind();
        let tables = self.tables.lock().unwrap();

        let mut rows: Vec<&Row> = tables
            .get(&kind)
            .map(|rows| rows.iter().collect::<Vec<&Row>>())
            .unwrap_or_default()
            .into_iter()
            .filter(|row| filter.conditions().iter().all(|c| row_matches(&tables, kind, row, c)))
            .collect();

        rows.sort_by(|a, b| {
            for info in filter.order_info() {
                let left = a.get(info.column.name).unwrap_or(&Value::Null);
                let right = b.get(info.column.name).unwrap_or(&Value::Null);
                let ordering = compare(info.column.ty, left, right).unwrap_or(Ordering::Equal);
                let ordering = match info.sort {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });

        let offset = filter.offset_value().unwrap_or(0).max(0) as usize;
        let limit = filter.limit_value().map_or(usize::MAX, |l| l.max(0) as usize);
        Ok(rows
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| Value::Object(row.clone()))
            .collect())
    }

    async fn insert(&self, kind: EntityKind, changes: &Changes) -> Result<Value, DatabaseError> {
        self.check_online()?;
        let mut tables = self.tables.lock().unwrap();

        let mut row = blank_row(kind);
        apply_changes(kind, &mut row, changes)?;
        let id = Uuid::new_v4();
        let now = stamp(Utc::now());
        row.insert("id".into(), Value::String(id.to_string()));
        row.insert("created_at".into(), Value::String(now.clone()));
        row.insert("updated_at".into(), Value::String(now));
        check_foreign_keys(&tables, kind, &row)?;

        tables.entry(kind).or_default().push(row.clone());
        self.journal.push(format!("insert {} {}", kind, id));
        Ok(Value::Object(row))
    }

    async fn update(&self, kind: EntityKind, id: Uuid, changes: &Changes) -> Result<Value, DatabaseError> {
        self.check_online()?;
        let mut tables = self.tables.lock().unwrap();
        let key = id.to_string();

        let mut row = find_row(&tables, kind, &key)
            .cloned()
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", kind, id)))?;
        apply_changes(kind, &mut row, changes)?;
        check_foreign_keys(&tables, kind, &row)?;

        let previous = row.get("updated_at").and_then(Value::as_str).and_then(parse_date);
        let now = Utc::now();
        let next = match previous {
            Some(previous) => now.max(previous + Duration::microseconds(1)),
            None => now,
        };
        row.insert("updated_at".into(), Value::String(stamp(next)));

        if let Some(slot) = tables
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| r.get("id").and_then(Value::as_str) == Some(key.as_str())))
        {
            *slot = row.clone();
        }
        self.journal.push(format!("update {} {}", kind, id));
        Ok(Value::Object(row))
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<Value, DatabaseError> {
        self.check_online()?;
        let mut tables = self.tables.lock().unwrap();
        let key = id.to_string();

        if find_row(&tables, kind, &key).is_none() {
            return Err(DatabaseError::NotFound(format!("{} {} not found", kind, id)));
        }
        for relation in kind.relations().iter().filter(|r| r.kind == RelationKind::HasMany) {
            let referenced = tables.get(&relation.target).is_some_and(|rows| {
                rows.iter().any(|r| r.get(relation.column).and_then(Value::as_str) == Some(key.as_str()))
            });
            if referenced {
                return Err(DatabaseError::Conflict(format!("{} {} is still referenced by {}", kind, id, relation.target)));
            }
        }

        let rows = tables.entry(kind).or_default();
        let position = rows
            .iter()
            .position(|r| r.get("id").and_then(Value::as_str) == Some(key.as_str()))
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", kind, id)))?;
        let row = rows.remove(position);
        self.journal.push(format!("delete {} {}", kind, id));
        Ok(Value::Object(row))
    }
}

/// Records every notification; optionally rejects them all
#[derive(Default)]
pub struct RecordingNotifier {
    journal: Journal,
    sent: Mutex<Vec<Notification>>,
    reject: bool,
}

impl RecordingNotifier {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub fn rejecting(journal: Journal) -> Self {
        Self {
            journal,
            reject: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if self.reject {
            return Err(NotifyError::Rejected(reqwest::StatusCode::SERVICE_UNAVAILABLE));
        }
        self.journal.push(format!(
            "notify {} {} {}",
            notification.operation, notification.entity, notification.resource_id
        ));
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Router over a fresh in-memory store with the embedded role policy
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub journal: Journal,
}

impl TestApp {
    pub fn new() -> Self {
        let journal = Journal::default();
        Self::with_notifier(RecordingNotifier::new(journal.clone()), journal)
    }

    /// Same app, but the notification sink rejects every event
    pub fn with_failing_notifier() -> Self {
        let journal = Journal::default();
        Self::with_notifier(RecordingNotifier::rejecting(journal.clone()), journal)
    }

    fn with_notifier(notifier: RecordingNotifier, journal: Journal) -> Self {
        let store = Arc::new(MemoryStore::new(journal.clone()));
        let notifier = Arc::new(notifier);
        let policy = RolePolicy::embedded().expect("embedded policy parses");
        let state = AppState {
            store: store.clone(),
            access: Arc::new(TenantAccessControl::new(policy, store.clone())),
            notifier: notifier.clone(),
        };
        Self {
            router: crate::app::router(state),
            store,
            notifier,
            journal,
        }
    }

    /// Organization + vehicle owned by `tenant`; returns the vehicle row
    pub fn seed_vehicle(&self, tenant: &str) -> Value {
        let organization = self.store.seed(
            EntityKind::Organization,
            serde_json::json!({ "name": format!("{} fleet", tenant), "tenant_id": tenant }),
        );
        self.store.seed(
            EntityKind::Vehicle,
            serde_json::json!({ "information": "Van", "organization_id": organization["id"] }),
        )
    }
}

pub fn token(tenant: &str, roles: &[&str]) -> String {
    let claims = Claims::new(
        format!("user-{}", tenant),
        tenant.to_string(),
        roles.iter().map(|r| r.to_string()).collect(),
    );
    generate_jwt(&claims).expect("token signs")
}

/// JSON request with a bearer token for `tenant`
pub fn request(method: Method, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RecordQuery;

    #[test]
    fn like_wildcards() {
        assert!(like("V%", "Van"));
        assert!(like("_an", "Van"));
        assert!(!like("V_", "Van"));
        assert!(like("%", ""));
    }

    #[tokio::test]
    async fn ownership_follows_owner_links() {
        let app = TestApp::new();
        let vehicle = app.seed_vehicle("acme");
        let usage = app.store.seed(
            EntityKind::Usage,
            serde_json::json!({ "vehicle_id": vehicle["id"], "date": "2024-01-01T00:00:00+00:00", "usage_time": 5 }),
        );
        let orphan = app.store.seed(EntityKind::Usage, serde_json::json!({ "usage_time": 1 }));

        let id = |v: &Value| Uuid::parse_str(v["id"].as_str().unwrap()).unwrap();
        assert_eq!(app.store.ownership(EntityKind::Usage, id(&usage)).await.unwrap(), Ownership::Tenant("acme".into()));
        assert_eq!(app.store.ownership(EntityKind::Usage, id(&orphan)).await.unwrap(), Ownership::Orphaned);
        assert_eq!(app.store.ownership(EntityKind::Usage, Uuid::new_v4()).await.unwrap(), Ownership::Missing);
    }

    #[tokio::test]
    async fn find_many_applies_filters_order_and_paging() {
        let store = MemoryStore::new(Journal::default());
        for minutes in [30, 10, 20] {
            store.seed(EntityKind::Usage, serde_json::json!({ "usage_time": minutes, "date": "2024-01-01T00:00:00+00:00" }));
        }

        let query = RecordQuery::parse(EntityKind::Usage, Some("where=%7B%22usage_time%22%3A%7B%22%24gte%22%3A20%7D%7D&order=usage_time%20desc")).unwrap();
        let mut filter = Filter::new(EntityKind::Usage);
        filter.assign(query.filter).unwrap();

        let rows = store.find_many(&filter).await.unwrap();
        let times: Vec<i64> = rows.iter().map(|r| r["usage_time"].as_i64().unwrap()).collect();
        assert_eq!(times, vec![30, 20]);
    }
}
