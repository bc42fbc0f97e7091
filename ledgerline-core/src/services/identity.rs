//! Content identifiers for batches without a `Transaction ID` field
//!
//! A record's identifier is a hash of its canonical text (the JSON object of
//! its non-empty comparable fields, upper-cased) plus how many identical
//! records came before it in the batch. Identical records therefore get
//! distinct identifiers, and re-importing the same data reproduces them.
//! Identifiers follow RFC 6920 (`ni:///sha-256;...`).

use std::collections::HashMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde_json::{Map, Number};
use sha2::{Digest, Sha256};

use crate::domain::value::format_timestamp;
use crate::domain::{fields, Batch, FieldSchema, StoreSchema, Value};

/// RFC 6920 name prefix for SHA-256 digests
pub const ID_PREFIX: &str = "ni:///sha-256;";

/// Derived or redundant fields left out of the canonical text
const NON_CANONICAL: &[&str] = &[
    fields::MONTH,
    fields::WEEK,
    fields::FULL_DESCRIPTION,
    fields::TRANSACTION_ID,
];

/// Largest integer an f64 holds exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Fields that feed the canonical text, as (name, batch position), sorted by
/// name. Only fields the sheet also has are included.
pub fn canonical_fields(batch_schema: &FieldSchema, store: &StoreSchema) -> Vec<(String, usize)> {
    let mut canonical: Vec<(String, usize)> = batch_schema
        .names()
        .iter()
        .enumerate()
        .filter(|(_, name)| !NON_CANONICAL.contains(&name.as_str()) && store.contains(name))
        .map(|(position, name)| (name.clone(), position))
        .collect();
    canonical.sort();
    canonical
}

fn to_json(value: &Value) -> Option<serde_json::Value> {
    match value {
        Value::Empty => None,
        Value::Text(s) if s.is_empty() => None,
        Value::Text(s) => Some(serde_json::Value::String(s.clone())),
        Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => {
            Some(serde_json::Value::Number((*n as i64).into()))
        }
        Value::Number(n) => Some(
            Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        ),
        Value::Timestamp(ts) => Some(serde_json::Value::String(format_timestamp(ts))),
    }
}

/// Upper-cased JSON object of a row's non-empty canonical fields
pub fn canonical_text(row: &[Value], canonical: &[(String, usize)]) -> String {
    let mut object = Map::new();
    for (name, position) in canonical {
        if let Some(value) = row.get(*position).and_then(to_json) {
            object.insert(name.clone(), value);
        }
    }
    serde_json::Value::Object(object).to_string().to_uppercase()
}

/// Text hashed for the `occurrence`-th record with this canonical text
pub fn identity_preimage(canonical: &str, occurrence: usize) -> String {
    format!("{}{}", canonical, occurrence)
}

pub fn content_id(canonical: &str, occurrence: usize) -> String {
    let digest = Sha256::digest(identity_preimage(canonical, occurrence).as_bytes());
    format!("{}{}", ID_PREFIX, URL_SAFE_NO_PAD.encode(digest))
}

/// Append a `Transaction ID` field holding content identifiers.
///
/// Returns `false` and leaves the batch alone when it already carries its
/// own identifiers.
pub fn assign_identities(batch: &mut Batch, store: &StoreSchema) -> bool {
    if batch.has_field(fields::TRANSACTION_ID) {
        return false;
    }

    let canonical = canonical_fields(batch.schema(), store);
    tracing::info!(
        rows = batch.len(),
        fields = ?canonical.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>(),
        "assigning content identifiers"
    );

    let id_column = batch.ensure_field(fields::TRANSACTION_ID);
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    for row in batch.rows_mut() {
        let text = canonical_text(row, &canonical);
        let seen = occurrences.entry(text.clone()).or_insert(0);
        row[id_column] = Value::Text(content_id(&text, *seen));
        *seen += 1;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn store(names: &[&str]) -> StoreSchema {
        let mut header = vec![Value::Empty];
        header.extend(names.iter().map(|n| Value::text(*n)));
        StoreSchema::from_header(&header)
    }

    fn batch() -> Batch {
        Batch::new(
            vec![
                "Date".into(),
                "Amount".into(),
                "Description".into(),
                "Full Description".into(),
                "Account".into(),
            ],
            vec![
                vec![
                    Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 15, 5, 0, 0).unwrap()),
                    Value::Number(-12.0),
                    Value::text("Coffee"),
                    Value::text("COFFEE 123"),
                    Value::text("Checking"),
                ],
                vec![
                    Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 15, 5, 0, 0).unwrap()),
                    Value::Number(-12.0),
                    Value::text("Coffee"),
                    Value::text("COFFEE 123"),
                    Value::Empty,
                ],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_canonical_text_is_sorted_uppercase_and_skips_blanks() {
        let b = batch();
        let s = store(&["Date", "Amount", "Description", "Full Description", "Transaction ID"]);
        let canonical = canonical_fields(b.schema(), &s);
        let names: Vec<&str> = canonical.iter().map(|(n, _)| n.as_str()).collect();
        // Account is not in the sheet, Full Description is never canonical
        assert_eq!(names, vec!["Amount", "Date", "Description"]);

        assert_eq!(
            canonical_text(&b.rows()[0], &canonical),
            r#"{"AMOUNT":-12,"DATE":"2024-01-15T05:00:00.000Z","DESCRIPTION":"COFFEE"}"#
        );
    }

    #[test]
    fn test_identical_records_get_distinct_ids() {
        let mut b = batch();
        let s = store(&["Date", "Amount", "Description", "Transaction ID"]);
        assert!(assign_identities(&mut b, &s));

        let ids: Vec<String> = b
            .column_values("Transaction ID")
            .unwrap()
            .into_iter()
            .map(|v| v.key_text())
            .collect();
        assert!(ids[0].starts_with(ID_PREFIX));
        assert_ne!(ids[0], ids[1]);

        let canonical = canonical_text(&b.rows()[0], &canonical_fields(b.schema(), &s));
        assert_eq!(ids[0], content_id(&canonical, 0));
        assert_eq!(ids[1], content_id(&canonical, 1));
        assert_eq!(identity_preimage(&canonical, 1), format!("{}1", canonical));
    }

    #[test]
    fn test_ids_are_deterministic_and_base64url() {
        let id = content_id("{}", 0);
        assert_eq!(id, content_id("{}", 0));
        let encoded = id.strip_prefix(ID_PREFIX).unwrap();
        assert_eq!(encoded.len(), 43);
        assert!(!encoded.contains('=') && !encoded.contains('+') && !encoded.contains('/'));
    }

    #[test]
    fn test_existing_ids_are_kept() {
        let mut b = Batch::new(vec!["Transaction ID".into()], vec![vec![Value::text("abc")]]).unwrap();
        assert!(!assign_identities(&mut b, &store(&["Transaction ID"])));
        assert_eq!(b.get(0, "Transaction ID"), Some(&Value::text("abc")));
    }
}
