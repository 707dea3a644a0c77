//! SQL for writes and ownership lookups. Reads are rendered by `Filter::to_sql`.

use crate::entities::{EntityKind, TENANT_COLUMN};

use super::changes::Changes;

/// Wraps a data-modifying statement so the affected row comes back as one JSON value
fn returning_json(statement: String) -> String {
    format!("WITH t AS ({} RETURNING *) SELECT row_to_json(t) AS row FROM t", statement)
}

/// Placeholders `$1..$n` follow the order of `changes`
pub fn insert_sql(kind: EntityKind, changes: &Changes) -> String {
    if changes.is_empty() {
        return returning_json(format!("INSERT INTO \"{}\" DEFAULT VALUES", kind.name()));
    }

    let columns: Vec<String> = changes.iter().map(|(c, _)| format!("\"{}\"", c)).collect();
    let params: Vec<String> = (1..=changes.len()).map(|i| format!("${}", i)).collect();
    returning_json(format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        kind.name(),
        columns.join(", "),
        params.join(", ")
    ))
}

/// Placeholders `$1..$n` follow `changes`; the id is `$n+1`.
/// `updated_at` always moves forward, even within the same clock tick.
pub fn update_sql(kind: EntityKind, changes: &Changes) -> String {
    let mut assignments: Vec<String> = changes
        .iter()
        .enumerate()
        .map(|(i, (c, _))| format!("\"{}\" = ${}", c, i + 1))
        .collect();
    assignments.push("\"updated_at\" = GREATEST(now(), \"updated_at\" + interval '1 microsecond')".to_string());

    returning_json(format!(
        "UPDATE \"{}\" SET {} WHERE \"id\" = ${}",
        kind.name(),
        assignments.join(", "),
        changes.len() + 1
    ))
}

pub fn delete_sql(kind: EntityKind) -> String {
    returning_json(format!("DELETE FROM \"{}\" WHERE \"id\" = $1", kind.name()))
}

/// One row per existing record, holding the owning tenant (NULL when a link is broken)
pub fn ownership_sql(kind: EntityKind) -> String {
    let chain = kind.owner_chain();
    let mut sql = String::from("SELECT ");

    if chain.is_empty() {
        sql.push_str(&format!("t0.\"{}\"", TENANT_COLUMN));
    } else {
        sql.push_str(&format!("t{}.\"{}\"", chain.len(), TENANT_COLUMN));
    }
    sql.push_str(&format!(" AS tenant_id FROM \"{}\" t0", kind.name()));

    for (i, (column, parent)) in chain.iter().enumerate() {
        sql.push_str(&format!(
            " LEFT JOIN \"{}\" t{} ON t{}.\"id\" = t{}.\"{}\"",
            parent.name(),
            i + 1,
            i + 1,
            i,
            column
        ));
    }
    sql.push_str(" WHERE t0.\"id\" = $1");
    sql
}
