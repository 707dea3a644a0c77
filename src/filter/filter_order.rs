use serde_json::Value;

use super::error::FilterError;
use super::types::{FilterOrderInfo, SortDirection};
use crate::entities::EntityKind;

pub struct FilterOrder;

impl FilterOrder {
    pub fn validate_and_parse(kind: EntityKind, order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        match order {
            Value::Null => {}
            Value::String(s) => Self::parse_order_string(kind, s, &mut out)?,
            Value::Array(arr) => {
                // ["created_at desc", "name asc"]
                for v in arr {
                    let s = v
                        .as_str()
                        .ok_or_else(|| FilterError::InvalidOperatorData("order entries must be strings".to_string()))?;
                    Self::parse_order_string(kind, s, &mut out)?;
                }
            }
            Value::Object(obj) => {
                // { "created_at": "desc", "name": "asc" }
                for (column, direction) in obj {
                    let sort = Self::direction(direction.as_str().unwrap_or("asc"))?;
                    out.push(FilterOrderInfo { column: Self::column(kind, column)?, sort });
                }
            }
            _ => return Err(FilterError::InvalidOperatorData("order must be a string, array or object".to_string())),
        }
        Ok(out)
    }

    fn parse_order_string(kind: EntityKind, s: &str, out: &mut Vec<FilterOrderInfo>) -> Result<(), FilterError> {
        for part in s.split(',') {
            let mut it = part.split_whitespace();
            let Some(column) = it.next() else {
                continue;
            };
            let sort = Self::direction(it.next().unwrap_or("asc"))?;
            out.push(FilterOrderInfo { column: Self::column(kind, column)?, sort });
        }
        Ok(())
    }

    fn column(kind: EntityKind, name: &str) -> Result<&'static crate::entities::Column, FilterError> {
        kind.column(name).ok_or_else(|| FilterError::InvalidColumn {
            entity: kind.name(),
            column: name.to_string(),
        })
    }

    fn direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::InvalidOperatorData(format!("unknown sort direction '{}'", dir)))
        }
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        if infos.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = infos
            .iter()
            .map(|i| format!("\"{}\" {}", i.column.name, i.sort.to_sql()))
            .collect();
        format!("ORDER BY {}", parts.join(", "))
    }
}
