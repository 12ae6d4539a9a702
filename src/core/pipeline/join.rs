//! In-memory relational helpers
//!
//! Joins, projection, sorting and key-set extraction over [`Dataset`]s.
//! Key equality treats numerically equal values as equal (`1` matches `1.0`)
//! and null matches null.

use super::definition::JoinKind;
use crate::domain::{Dataset, Record};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Hashable form of a key value
fn key_part(value: &Value) -> String {
    match value {
        Value::Number(n) => {
            // Integers first so large ids keep full precision
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    // `12755.0` from one view must meet `12755` from another
                    Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i64).to_string(),
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        // Strings keep their quotes, so `"1"` never equals `1`
        other => other.to_string(),
    }
}

fn record_key(record: &Record, fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .map(|f| key_part(record.get(f).unwrap_or(&Value::Null)))
        .collect()
}

/// Joins `left` and `right` on the given key fields
///
/// Output rows follow the left order; each left row is repeated once per
/// matching right row in right order. Merged rows hold the left fields
/// followed by right fields the left row does not already have. Right key
/// fields are dropped.
pub fn join(
    left: &Dataset,
    right: &Dataset,
    left_on: &[String],
    right_on: &[String],
    kind: JoinKind,
) -> Dataset {
    // Right rows grouped by key, each group in right order
    let mut index: HashMap<Vec<String>, Vec<&Record>> = HashMap::new();
    for record in right {
        index
            .entry(record_key(record, right_on))
            .or_default()
            .push(record);
    }

    // Columns an unmatched outer row is padded with
    let right_only: Vec<String> = right
        .columns()
        .into_iter()
        .filter(|c| !right_on.contains(c))
        .collect();

    let mut joined = Dataset::new();
    for left_record in left {
        match index.get(&record_key(left_record, left_on)) {
            Some(matches) => {
                for right_record in matches {
                    let mut merged = left_record.clone();
                    for (field, value) in right_record.iter() {
                        // Left wins on name clashes
                        if right_on.contains(field) || merged.contains_key(field) {
                            continue;
                        }
                        merged.insert(field.clone(), value.clone());
                    }
                    joined.push(merged);
                }
            }
            None if kind == JoinKind::Outer => {
                let mut merged = left_record.clone();
                for field in &right_only {
                    if !merged.contains_key(field) {
                        merged.insert(field.clone(), Value::Null);
                    }
                }
                joined.push(merged);
            }
            // Inner join drops unmatched left rows
            None => {}
        }
    }
    joined
}

/// Keeps the first record for each distinct combination of `fields`
///
/// Records are compared with the same key normalization as [`join`], and the
/// survivors keep their original order.
pub fn distinct_by(dataset: Dataset, fields: &[String]) -> Dataset {
    if fields.is_empty() {
        return dataset;
    }
    let mut seen = HashSet::new();
    dataset
        .into_iter()
        .filter(|record| seen.insert(record_key(record, fields)))
        .collect()
}

/// Keeps `columns` in the given order; missing fields become null
pub fn project(dataset: &Dataset, columns: &[String]) -> Dataset {
    dataset
        .iter()
        .map(|record| {
            columns
                .iter()
                .map(|c| (c.clone(), record.get(c).cloned().unwrap_or(Value::Null)))
                .collect::<Record>()
        })
        .collect()
}

/// Stable sort by one or more fields, ascending
pub fn sort_by(dataset: Dataset, fields: &[String]) -> Dataset {
    if fields.is_empty() {
        return dataset;
    }
    let mut records = dataset.into_records();
    records.sort_by(|a, b| {
        fields
            .iter()
            .map(|f| {
                compare_values(
                    a.get(f).unwrap_or(&Value::Null),
                    b.get(f).unwrap_or(&Value::Null),
                )
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
    Dataset::from(records)
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order: null < bool < number < string < array < object
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            // JSON numbers are never NaN
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(_), Value::Array(_)) | (Value::Object(_), Value::Object(_)) => {
            a.to_string().cmp(&b.to_string())
        }
        // Mixed types order by kind
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Distinct non-null values of `field` in first-seen order
pub fn distinct_values(dataset: &Dataset, field: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    let mut values = Vec::new();
    for record in dataset {
        match record.get(field) {
            // Null keys never become filter literals
            None | Some(Value::Null) => {}
            Some(value) => {
                if seen.insert(key_part(value)) {
                    values.push(value.clone());
                }
            }
        }
    }
    values
}

/// OData literal for a key value
///
/// Strings are single-quoted with embedded quotes doubled; numbers and
/// booleans are written bare. Nulls and composite values have no literal.
pub fn format_literal(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// `(<field> eq v1 or <field> eq v2 ...)`, or `None` when no value has a literal
pub fn build_disjunction(field: &str, values: &[Value]) -> Option<String> {
    let clauses: Vec<String> = values
        .iter()
        .filter_map(format_literal)
        .map(|literal| format!("{field} eq {literal}"))
        .collect();
    if clauses.is_empty() {
        None
    } else {
        Some(format!("({})", clauses.join(" or ")))
    }
}
