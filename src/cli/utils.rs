use serde_json::Value;

use super::form::FormOutcome;
use super::OutputFormat;

pub fn output_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints a single record; `null` reads as "no record"
pub fn output_record(output_format: OutputFormat, record: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_json(record),
        OutputFormat::Text => {
            match record.as_object() {
                Some(fields) => {
                    let width = fields.keys().map(String::len).max().unwrap_or(0);
                    for (field, value) in fields {
                        println!("{:width$}  {}", field, display_value(value), width = width);
                    }
                }
                None => println!("(no record)"),
            }
            Ok(())
        }
    }
}

pub fn output_records(output_format: OutputFormat, records: &Value) -> anyhow::Result<()> {
    match (output_format, records.as_array()) {
        (OutputFormat::Text, Some(rows)) => {
            if rows.is_empty() {
                println!("No records found");
            }
            for (i, row) in rows.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                output_record(output_format, row)?;
            }
            Ok(())
        }
        _ => output_json(records),
    }
}

pub fn output_form_outcome(output_format: OutputFormat, outcome: &FormOutcome) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_json(&serde_json::json!({
            "entity": outcome.entity,
            "return_path": outcome.return_path,
        })),
        OutputFormat::Text => {
            output_record(output_format, &outcome.entity)?;
            println!("✓ Saved; back to {}", outcome.return_path);
            Ok(())
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
