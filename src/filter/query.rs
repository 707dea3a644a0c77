//! Query string to filter input.
//!
//! `?where={..}&order=..&include=a,b&limit=..&offset=..`; any other key is an
//! equality filter on the column of the same name.

use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::FilterData;
use crate::entities::{EntityKind, Relation};

#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub filter: FilterData,
    pub include: Vec<&'static Relation>,
}

impl RecordQuery {
    pub fn parse(kind: EntityKind, raw: Option<&str>) -> Result<Self, FilterError> {
        let mut query = RecordQuery::default();
        let Some(raw) = raw else {
            return Ok(query);
        };

        let mut where_clause: Option<Value> = None;
        let mut equalities = Map::new();

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "where" => where_clause = Some(serde_json::from_str(&value)?),
                "order" => query.filter.order = Some(Value::String(value.into_owned())),
                "include" | "relations" => {
                    for name in value.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                        let relation = kind.relation(name).ok_or_else(|| FilterError::UnknownRelation {
                            entity: kind.name(),
                            relation: name.to_string(),
                        })?;
                        if !query.include.iter().any(|r| r.name == relation.name) {
                            query.include.push(relation);
                        }
                    }
                }
                "limit" => {
                    let limit = value
                        .parse::<i64>()
                        .map_err(|_| FilterError::InvalidLimit(format!("'{}' is not a number", value)))?;
                    query.filter.limit = Some(limit);
                }
                "offset" => {
                    let offset = value
                        .parse::<i64>()
                        .map_err(|_| FilterError::InvalidOffset(format!("'{}' is not a number", value)))?;
                    query.filter.offset = Some(offset);
                }
                column => {
                    if kind.column(column).is_none() {
                        return Err(FilterError::InvalidColumn {
                            entity: kind.name(),
                            column: column.to_string(),
                        });
                    }
                    equalities.insert(column.to_string(), Value::String(value.into_owned()));
                }
            }
        }

        query.filter.where_clause = match (where_clause, equalities.is_empty()) {
            (None, true) => None,
            (None, false) => Some(Value::Object(equalities)),
            (Some(w), true) => Some(w),
            (Some(w), false) => Some(serde_json::json!({ "$and": [w, Value::Object(equalities)] })),
        };

        Ok(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn splits_reserved_keys_from_column_equalities() {
        let q = RecordQuery::parse(
            EntityKind::Vehicle,
            Some("information=Van&include=organization,usage&order=created_at%20desc&limit=5"),
        )
        .unwrap();

        assert_eq!(q.filter.where_clause, Some(json!({ "information": "Van" })));
        assert_eq!(q.filter.order, Some(json!("created_at desc")));
        assert_eq!(q.filter.limit, Some(5));
        let names: Vec<_> = q.include.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["organization", "usage"]);
    }

    #[test]
    fn combines_where_json_with_equalities() {
        let q = RecordQuery::parse(
            EntityKind::Usage,
            Some("where=%7B%22usage_time%22%3A%7B%22%24gt%22%3A10%7D%7D&vehicle_id=7d9f0c3e-6b1a-4c52-9a55-1f1f7c6d0e11"),
        )
        .unwrap();

        assert_eq!(
            q.filter.where_clause,
            Some(json!({ "$and": [
                { "usage_time": { "$gt": 10 } },
                { "vehicle_id": "7d9f0c3e-6b1a-4c52-9a55-1f1f7c6d0e11" }
            ] }))
        );
    }

    #[test]
    fn relations_alias_and_unknown_names() {
        let q = RecordQuery::parse(EntityKind::Reservation, Some("relations=vehicle,user")).unwrap();
        assert_eq!(q.include.len(), 2);

        assert!(matches!(
            RecordQuery::parse(EntityKind::Usage, Some("include=organization")),
            Err(FilterError::UnknownRelation { .. })
        ));
        assert!(matches!(
            RecordQuery::parse(EntityKind::Usage, Some("mileage=3")),
            Err(FilterError::InvalidColumn { .. })
        ));
        assert!(matches!(RecordQuery::parse(EntityKind::Usage, Some("where={bad")), Err(FilterError::JsonError(_))));
    }
}
