use serde_json::Value;
use uuid::Uuid;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{Condition, FilterData, FilterOrderInfo, SqlResult};
use crate::entities::EntityKind;

/// A validated read against one entity: conditions, ordering and paging
#[derive(Debug, Clone)]
pub struct Filter {
    kind: EntityKind,
    conditions: Vec<Condition>,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            conditions: vec![],
            order_data: vec![],
            limit: None,
            offset: None,
        }
    }

    pub fn by_id(kind: EntityKind, id: Uuid) -> Self {
        Self::by_column(kind, "id", id)
    }

    /// Rows whose uuid `column` equals `id`; an unknown column matches nothing
    pub fn by_column(kind: EntityKind, column: &str, id: Uuid) -> Self {
        let mut filter = Self::new(kind);
        match kind.column(column) {
            Some(column) => filter.conditions.push(Condition::Compare {
                column,
                op: super::FilterOp::Eq,
                value: Value::String(id.to_string()),
            }),
            None => filter.conditions.push(Condition::Or(vec![])),
        }
        filter
    }

    pub fn assign(&mut self, data: FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = data.where_clause {
            self.where_clause(&where_clause)?;
        }
        if let Some(order) = data.order {
            self.order(&order)?;
        }
        if data.limit.is_some() || data.offset.is_some() {
            self.limit(data.limit, data.offset)?;
        }
        Ok(self)
    }

    /// Add conditions; they are AND-ed with any already present
    pub fn where_clause(&mut self, conditions: &Value) -> Result<&mut Self, FilterError> {
        let parsed = FilterWhere::parse(self.kind, conditions)?;
        self.conditions.extend(parsed);
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(self.kind, order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<i64>, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if let Some(l) = limit {
            if l < 0 {
                return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
            }
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }

        // Apply max limit from config
        let filter_config = &crate::config::CONFIG.filter;
        let requested = limit.unwrap_or(filter_config.default_limit);
        let applied_limit = match filter_config.max_limit {
            Some(max_limit) if requested > max_limit => {
                if filter_config.debug_logging {
                    tracing::warn!("Limit {} exceeds max {}, capping to max", requested, max_limit);
                }
                max_limit
            }
            _ => requested,
        };

        self.limit = Some(applied_limit);
        self.offset = offset;
        Ok(self)
    }

    /// Keep only records owned by `tenant_id`
    pub fn scope_to_tenant(&mut self, tenant_id: &str) -> &mut Self {
        self.conditions.push(Condition::Tenant(tenant_id.to_string()));
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order_info(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn limit_value(&self) -> Option<i64> {
        self.limit
    }

    pub fn offset_value(&self) -> Option<i64> {
        self.offset
    }

    /// `SELECT` returning one JSON object per row in a column named `row`
    pub fn to_sql(&self) -> SqlResult {
        let (where_clause, params) = FilterWhere::generate(self.kind, &self.conditions, 0);
        let order_clause = FilterOrder::generate(&self.order_data);
        let limit_clause = self.build_limit_clause();

        let inner = [
            format!("SELECT * FROM \"{}\"", self.kind.name()),
            if where_clause.is_empty() { String::new() } else { format!("WHERE {}", where_clause) },
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult {
            query: format!("SELECT row_to_json(t) AS row FROM ({}) t", inner),
            params,
        }
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}
