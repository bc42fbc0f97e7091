//! Matching incoming records and fields to sheet rows and columns

use std::collections::HashMap;

use crate::domain::{FieldSchema, StoreSchema, Value};

/// Identifier -> data rows holding it, in sheet order.
///
/// Built once per import from a single read of the identity column and
/// never updated while matching.
#[derive(Debug, Clone, Default)]
pub struct StoreIndex {
    rows: HashMap<String, Vec<usize>>,
}

impl StoreIndex {
    /// Index identity cells of the data rows (position 0 is the first data
    /// row). Blank cells are skipped.
    pub fn build(ids: &[Value]) -> Self {
        let mut rows: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, id) in ids.iter().enumerate() {
            if id.is_empty() {
                continue;
            }
            rows.entry(id.key_text()).or_default().push(position);
        }
        Self { rows }
    }

    /// Data row of the `occurrence`-th sheet record with this identifier
    pub fn lookup(&self, id: &str, occurrence: usize) -> Option<usize> {
        self.rows.get(id).and_then(|rows| rows.get(occurrence)).copied()
    }

    /// Number of distinct identifiers
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Map each incoming record to a sheet data row, or `None` when it is new.
///
/// The n-th incoming record with a given identifier takes the n-th sheet
/// row with it. Incoming duplicates beyond the sheet's count stay unmapped.
pub fn map_rows<'a, I>(batch_ids: I, index: &StoreIndex) -> Vec<Option<usize>>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    batch_ids
        .into_iter()
        .map(|id| {
            if id.is_empty() {
                return None;
            }
            let key = id.key_text();
            let seen = occurrences.entry(key.clone()).or_insert(0);
            let row = index.lookup(&key, *seen);
            *seen += 1;
            row
        })
        .collect()
}

/// Map each batch field to its sheet column. Fields the sheet lacks map to
/// `None` and are never written.
pub fn map_columns(batch_schema: &FieldSchema, store: &StoreSchema) -> Vec<Option<usize>> {
    batch_schema
        .names()
        .iter()
        .map(|name| store.column(name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<Value> {
        values.iter().map(|v| Value::text(*v)).collect()
    }

    #[test]
    fn test_index_skips_blank_ids() {
        let index = StoreIndex::build(&ids(&["a", "", "b", "a"]));
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("a", 0), Some(0));
        assert_eq!(index.lookup("a", 1), Some(3));
        assert_eq!(index.lookup("a", 2), None);
        assert_eq!(index.lookup("", 0), None);
    }

    #[test]
    fn test_duplicates_match_in_order_and_overflow_to_adds() {
        let index = StoreIndex::build(&ids(&["x", "y", "x"]));
        let batch = ids(&["x", "z", "x", "x", "y"]);
        assert_eq!(
            map_rows(&batch, &index),
            vec![Some(0), None, Some(2), None, Some(1)]
        );
    }

    #[test]
    fn test_numeric_ids_match_by_text() {
        let index = StoreIndex::build(&[Value::Number(42.0)]);
        let batch = ids(&["42"]);
        assert_eq!(map_rows(&batch, &index), vec![Some(0)]);
    }

    #[test]
    fn test_map_columns_drops_unknown_fields() {
        let batch = FieldSchema::from_header(["Amount", "Memo", "Date"]).unwrap();
        let store = StoreSchema::from_header(&[
            Value::Empty,
            Value::text("Date"),
            Value::text("Amount"),
        ]);
        assert_eq!(map_columns(&batch, &store), vec![Some(2), None, Some(1)]);
    }

    #[test]
    fn test_map_columns_includes_date_added() {
        let batch = FieldSchema::from_header(["Date", "Memo", "Date Added"]).unwrap();
        let store = StoreSchema::from_header(&[
            Value::Empty,
            Value::text("Date"),
            Value::text("Date Added"),
        ]);
        assert_eq!(map_columns(&batch, &store), vec![Some(1), None, Some(2)]);
    }
}
