use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::FilterError;
use super::types::{Condition, FilterOp};
use crate::entities::{Column, ColumnType, EntityKind, TENANT_COLUMN};
use crate::validation::parse_date;

pub struct FilterWhere {
    param_values: Vec<Value>,
    param_offset: usize,
}

impl FilterWhere {
    pub fn new(param_offset: usize) -> Self {
        Self {
            param_values: vec![],
            param_offset,
        }
    }

    /// Parse a `where` object into conditions that are implicitly AND-ed
    pub fn parse(kind: EntityKind, where_data: &Value) -> Result<Vec<Condition>, FilterError> {
        match where_data {
            Value::Null => Ok(vec![]),
            Value::Object(obj) => Self::parse_object(kind, obj),
            _ => Err(FilterError::InvalidWhereClause("WHERE must be an object".to_string())),
        }
    }

    /// Render conditions as a single SQL predicate. Placeholders start after `param_offset`.
    pub fn generate(kind: EntityKind, conditions: &[Condition], param_offset: usize) -> (String, Vec<Value>) {
        let mut filter_where = Self::new(param_offset);
        let parts: Vec<String> = conditions.iter().map(|c| filter_where.build(kind, c)).collect();
        (parts.join(" AND "), filter_where.param_values)
    }

    fn parse_object(kind: EntityKind, obj: &Map<String, Value>) -> Result<Vec<Condition>, FilterError> {
        let mut conditions = Vec::new();
        for (key, value) in obj {
            if key.starts_with('$') {
                conditions.push(Self::parse_logical_operator(kind, key, value)?);
            } else {
                conditions.extend(Self::parse_field_condition(kind, key, value)?);
            }
        }
        Ok(conditions)
    }

    fn parse_logical_operator(kind: EntityKind, op: &str, value: &Value) -> Result<Condition, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let mut branches = Vec::with_capacity(arr.len());
                for v in arr {
                    if !v.is_object() {
                        return Err(FilterError::InvalidOperatorData(format!("{} entries must be objects", op)));
                    }
                    branches.push(Condition::And(Self::parse(kind, v)?));
                }
                Ok(if op == "$and" { Condition::And(branches) } else { Condition::Or(branches) })
            }
            "$not" => {
                if !value.is_object() {
                    return Err(FilterError::InvalidOperatorData("$not requires an object".to_string()));
                }
                Ok(Condition::Not(Box::new(Condition::And(Self::parse(kind, value)?))))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(kind: EntityKind, field: &str, value: &Value) -> Result<Vec<Condition>, FilterError> {
        let column = kind.column(field).ok_or_else(|| FilterError::InvalidColumn {
            entity: kind.name(),
            column: field.to_string(),
        })?;

        if let Value::Object(obj) = value {
            let mut out = Vec::with_capacity(obj.len());
            for (op_key, op_val) in obj {
                if op_key == "$null" {
                    let is_null = op_val
                        .as_bool()
                        .ok_or_else(|| FilterError::InvalidOperatorData("$null requires true or false".to_string()))?;
                    out.push(Condition::IsNull { column, negated: !is_null });
                    continue;
                }
                let op = FilterOp::from_key(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                out.push(Self::compare(column, op, op_val)?);
            }
            Ok(out)
        } else {
            // Implicit equality: { field: value }
            Ok(vec![Self::compare(column, FilterOp::Eq, value)?])
        }
    }

    fn compare(column: &'static Column, op: FilterOp, value: &Value) -> Result<Condition, FilterError> {
        match op {
            FilterOp::Eq | FilterOp::Ne if value.is_null() => Ok(Condition::IsNull {
                column,
                negated: op == FilterOp::Ne,
            }),
            FilterOp::In | FilterOp::NIn => {
                let values = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{:?} requires array", op)))?
                    .iter()
                    .map(|v| normalize(column, v))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Condition::Compare { column, op, value: Value::Array(values) })
            }
            FilterOp::Between => match value.as_array() {
                Some(values) if values.len() == 2 => {
                    let bounds = vec![normalize(column, &values[0])?, normalize(column, &values[1])?];
                    Ok(Condition::Compare { column, op, value: Value::Array(bounds) })
                }
                _ => Err(FilterError::InvalidOperatorData("$between requires array with 2 values".to_string())),
            },
            FilterOp::Like | FilterOp::ILike => {
                if column.ty != ColumnType::Text {
                    return Err(FilterError::InvalidOperatorData(format!("pattern match on non-text column {}", column.name)));
                }
                let pattern = value
                    .as_str()
                    .ok_or_else(|| FilterError::InvalidOperatorData("pattern must be a string".to_string()))?;
                Ok(Condition::Compare { column, op, value: Value::String(pattern.to_string()) })
            }
            _ => Ok(Condition::Compare { column, op, value: normalize(column, value)? }),
        }
    }

    fn build(&mut self, kind: EntityKind, condition: &Condition) -> String {
        match condition {
            Condition::Compare { column, op, value } => {
                let quoted_column = format!("\"{}\"", column.name);
                let cast = column.ty.sql_cast();
                match (op, value) {
                    (FilterOp::In | FilterOp::NIn, Value::Array(values)) => {
                        if values.is_empty() {
                            return if *op == FilterOp::In { "FALSE".to_string() } else { "TRUE".to_string() };
                        }
                        let params: Vec<String> =
                            values.iter().map(|v| format!("{}{}", self.param(v.clone()), cast)).collect();
                        format!("{} {} ({})", quoted_column, op.sql_operator(), params.join(", "))
                    }
                    (FilterOp::Between, Value::Array(values)) if values.len() == 2 => format!(
                        "{} BETWEEN {}{} AND {}{}",
                        quoted_column,
                        self.param(values[0].clone()),
                        cast,
                        self.param(values[1].clone()),
                        cast
                    ),
                    _ => format!("{} {} {}{}", quoted_column, op.sql_operator(), self.param(value.clone()), cast),
                }
            }
            Condition::IsNull { column, negated } => {
                format!("\"{}\" IS {}NULL", column.name, if *negated { "NOT " } else { "" })
            }
            Condition::And(parts) => self.join(kind, parts, " AND ", "TRUE"),
            Condition::Or(parts) => self.join(kind, parts, " OR ", "FALSE"),
            Condition::Not(inner) => format!("NOT ({})", self.build(kind, inner)),
            Condition::Tenant(tenant_id) => {
                let param = self.param(Value::String(tenant_id.clone()));
                tenant_scope_sql(kind, &param)
            }
        }
    }

    fn join(&mut self, kind: EntityKind, parts: &[Condition], joiner: &str, empty: &str) -> String {
        if parts.is_empty() {
            return empty.to_string();
        }
        let sql: Vec<String> = parts.iter().map(|p| self.build(kind, p)).collect();
        format!("({})", sql.join(joiner))
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        format!("${}", self.param_offset + self.param_values.len())
    }
}

/// Coerce a filter value to the column's type
pub fn normalize(column: &Column, value: &Value) -> Result<Value, FilterError> {
    let invalid = |message: &str| FilterError::InvalidValue {
        column: column.name.to_string(),
        message: message.to_string(),
    };

    match column.ty {
        ColumnType::Uuid => value
            .as_str()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(|id| Value::String(id.to_string()))
            .ok_or_else(|| invalid("expected a uuid")),
        ColumnType::Integer => match value {
            Value::Number(n) => n.as_i64().map(Value::from).ok_or_else(|| invalid("expected an integer")),
            Value::String(s) => s.trim().parse::<i64>().map(Value::from).map_err(|_| invalid("expected an integer")),
            _ => Err(invalid("expected an integer")),
        },
        ColumnType::Timestamp => value
            .as_str()
            .and_then(parse_date)
            .map(|dt| Value::String(dt.to_rfc3339()))
            .ok_or_else(|| invalid("expected a date")),
        ColumnType::Text => match value {
            Value::String(_) => Ok(value.clone()),
            Value::Number(_) | Value::Bool(_) => Ok(Value::String(value.to_string())),
            _ => Err(invalid("expected a string")),
        },
    }
}

/// Predicate keeping only `kind` rows whose owner chain ends at the tenant bound to `param`
pub fn tenant_scope_sql(kind: EntityKind, param: &str) -> String {
    let chain = kind.owner_chain();
    let Some((first_column, first_kind)) = chain.first() else {
        return format!("\"{}\" = {}", TENANT_COLUMN, param);
    };

    let mut sql = format!("\"{}\" IN (SELECT t1.\"id\" FROM \"{}\" t1", first_column, first_kind.name());
    for (i, (column, parent)) in chain.iter().enumerate().skip(1) {
        sql.push_str(&format!(
            " JOIN \"{}\" t{} ON t{}.\"id\" = t{}.\"{}\"",
            parent.name(),
            i + 1,
            i + 1,
            i,
            column
        ));
    }
    sql.push_str(&format!(" WHERE t{}.\"{}\" = {})", chain.len(), TENANT_COLUMN, param));
    sql
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn implicit_equality_casts_to_column_type() {
        let conditions = FilterWhere::parse(EntityKind::Usage, &json!({ "usage_time": "30" })).unwrap();
        let (sql, params) = FilterWhere::generate(EntityKind::Usage, &conditions, 0);
        assert_eq!(sql, "\"usage_time\" = $1::bigint");
        assert_eq!(params, vec![json!(30)]);
    }

    #[test]
    fn null_equality_becomes_is_null() {
        let conditions =
            FilterWhere::parse(EntityKind::Vehicle, &json!({ "organization_id": null, "information": { "$ne": null } }))
                .unwrap();
        let (sql, params) = FilterWhere::generate(EntityKind::Vehicle, &conditions, 0);
        assert!(sql.contains("\"organization_id\" IS NULL"));
        assert!(sql.contains("\"information\" IS NOT NULL"));
        assert!(params.is_empty());
    }

    #[test]
    fn logical_operators_nest_with_sequential_params() {
        let where_data = json!({
            "$or": [
                { "information": { "$ilike": "%van%" } },
                { "$not": { "organization_id": { "$null": true } } }
            ],
            "created_at": { "$between": ["2024-01-01", "2024-12-31"] }
        });
        let conditions = FilterWhere::parse(EntityKind::Vehicle, &where_data).unwrap();
        let (sql, params) = FilterWhere::generate(EntityKind::Vehicle, &conditions, 2);

        assert!(sql.contains("\"information\" ILIKE $3"));
        assert!(sql.contains("NOT ((\"organization_id\" IS NULL))"));
        assert!(sql.contains("\"created_at\" BETWEEN $4::timestamptz AND $5::timestamptz"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let conditions = FilterWhere::parse(EntityKind::Vehicle, &json!({ "id": { "$in": [] } })).unwrap();
        let (sql, _) = FilterWhere::generate(EntityKind::Vehicle, &conditions, 0);
        assert_eq!(sql, "FALSE");
    }

    #[test]
    fn rejects_unknown_columns_and_operators() {
        assert!(matches!(
            FilterWhere::parse(EntityKind::Vehicle, &json!({ "tenant_id": "x" })),
            Err(FilterError::InvalidColumn { .. })
        ));
        assert!(matches!(
            FilterWhere::parse(EntityKind::Vehicle, &json!({ "information": { "$regex": "x" } })),
            Err(FilterError::UnsupportedOperator(_))
        ));
        assert!(matches!(
            FilterWhere::parse(EntityKind::Vehicle, &json!({ "organization_id": "not-a-uuid" })),
            Err(FilterError::InvalidValue { .. })
        ));
        assert!(FilterWhere::parse(EntityKind::Vehicle, &json!("1=1")).is_err());
    }

    #[test]
    fn tenant_scope_walks_the_owner_chain() {
        assert_eq!(tenant_scope_sql(EntityKind::User, "$1"), "\"tenant_id\" = $1");
        assert_eq!(
            tenant_scope_sql(EntityKind::Vehicle, "$1"),
            "\"organization_id\" IN (SELECT t1.\"id\" FROM \"organization\" t1 WHERE t1.\"tenant_id\" = $1)"
        );
        assert_eq!(
            tenant_scope_sql(EntityKind::Reservation, "$4"),
            "\"vehicle_id\" IN (SELECT t1.\"id\" FROM \"vehicle\" t1 \
             JOIN \"organization\" t2 ON t2.\"id\" = t1.\"organization_id\" WHERE t2.\"tenant_id\" = $4)"
        );
    }
}
