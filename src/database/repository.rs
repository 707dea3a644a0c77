use async_trait::async_trait;
use serde_json::Value;
use sqlx::{postgres::PgArguments, PgPool, Postgres, Row};
use uuid::Uuid;

use super::changes::{ColumnValue, Changes};
use super::manager::{DatabaseError, DatabaseManager};
use super::query_builder::{delete_sql, insert_sql, ownership_sql, update_sql};
use super::store::{Ownership, Store};
use crate::entities::EntityKind;
use crate::filter::Filter;

type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_rows(&self, filter: &Filter) -> Result<Vec<Value>, DatabaseError> {
        let sql_result = filter.to_sql();
        if crate::config::CONFIG.filter.debug_logging {
            tracing::debug!(sql = %sql_result.query, params = ?sql_result.params, "filter query");
        }

        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param(q, p);
        }
        let rows = q.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| row.try_get::<Value, _>("row").map_err(DatabaseError::from))
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        DatabaseManager::health_check(&self.pool).await
    }

    async fn ownership(&self, kind: EntityKind, id: Uuid) -> Result<Ownership, DatabaseError> {
        let row = sqlx::query(&ownership_sql(kind))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            None => Ownership::Missing,
            Some(row) => match row.try_get::<Option<String>, _>("tenant_id")? {
                Some(tenant_id) => Ownership::Tenant(tenant_id),
                None => Ownership::Orphaned,
            },
        })
    }

    async fn find_first(&self, filter: &Filter) -> Result<Option<Value>, DatabaseError> {
        let mut first = filter.clone();
        first.limit(Some(1), filter.offset_value())?;
        Ok(self.fetch_rows(&first).await?.into_iter().next())
    }

    async fn find_many(&self, filter: &Filter) -> Result<Vec<Value>, DatabaseError> {
        self.fetch_rows(filter).await
    }

    async fn insert(&self, kind: EntityKind, changes: &Changes) -> Result<Value, DatabaseError> {
        let sql = insert_sql(kind, changes);
        let mut q = sqlx::query(&sql);
        for (_, value) in changes.iter() {
            q = bind_column(q, value);
        }
        let row = q.fetch_one(&self.pool).await?;
        Ok(row.try_get::<Value, _>("row")?)
    }

    async fn update(&self, kind: EntityKind, id: Uuid, changes: &Changes) -> Result<Value, DatabaseError> {
        let sql = update_sql(kind, changes);
        let mut q = sqlx::query(&sql);
        for (_, value) in changes.iter() {
            q = bind_column(q, value);
        }
        match q.bind(id).fetch_optional(&self.pool).await? {
            Some(row) => Ok(row.try_get::<Value, _>("row")?),
            None => Err(DatabaseError::NotFound(format!("{} {} not found", kind, id))),
        }
    }

    async fn delete(&self, kind: EntityKind, id: Uuid) -> Result<Value, DatabaseError> {
        let sql = delete_sql(kind);
        match sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await? {
            Some(row) => Ok(row.try_get::<Value, _>("row")?),
            None => Err(DatabaseError::NotFound(format!("{} {} not found", kind, id))),
        }
    }
}

fn bind_column<'q>(q: PgQuery<'q>, value: &'q ColumnValue) -> PgQuery<'q> {
    match value {
        ColumnValue::Text(s) => q.bind(s.as_deref()),
        ColumnValue::Uuid(id) => q.bind(*id),
        ColumnValue::Integer(n) => q.bind(*n),
        ColumnValue::Timestamp(ts) => q.bind(*ts),
    }
}

/// Filter values are normalized to strings and integers; the SQL casts them
fn bind_param<'q>(q: PgQuery<'q>, v: &'q Value) -> PgQuery<'q> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => q.bind(v.to_string()),
    }
}
