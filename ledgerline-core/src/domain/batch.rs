//! Incoming batch of transaction records

use std::collections::BTreeMap;

use crate::domain::result::{Error, Result};
use crate::domain::{FieldSchema, Value};

/// One incoming set of records, addressable by field name.
///
/// Every row is kept exactly as wide as the schema: short CSV rows are
/// padded with `Value::Empty` and derived fields widen all rows at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    schema: FieldSchema,
    /// Header as submitted, before any derived field was added
    original_header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Batch {
    /// Build from a header and text rows (CSV tokenizer output)
    pub fn from_text_rows(header: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Value::text).collect())
            .collect();
        Self::new(header, rows)
    }

    /// Build from a header and typed rows
    pub fn new(header: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let schema = FieldSchema::from_header(header.iter().cloned())?;
        let width = schema.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Value::Empty);
                row
            })
            .collect();
        Ok(Self {
            schema,
            original_header: header,
            rows,
        })
    }

    /// Build from the raw records of a CSV file, the first being the header
    pub fn from_records(mut records: Vec<Vec<String>>) -> Result<Self> {
        if records.is_empty() {
            return Err(Error::validation("Empty CSV"));
        }
        let header = records.remove(0);
        Self::from_text_rows(header, records)
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn original_header(&self) -> &[String] {
        &self.original_header
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.schema.contains(name)
    }

    /// Position of `name`, appending an empty column when absent
    pub fn ensure_field(&mut self, name: &str) -> usize {
        let position = self.schema.ensure(name);
        let width = self.schema.len();
        for row in &mut self.rows {
            row.resize(width, Value::Empty);
        }
        position
    }

    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let column = self.schema.position(name)?;
        self.rows.get(row).and_then(|r| r.get(column))
    }

    /// All values of one field, in batch order
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let column = self.schema.position(name)?;
        Some(self.rows.iter().map(|row| &row[column]).collect())
    }

    /// Mutable access to every row, each exactly as wide as the schema
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut [Value]> {
        self.rows.iter_mut().map(|row| row.as_mut_slice())
    }

    /// Mutable access to one field of every row
    pub fn column_mut(&mut self, column: usize) -> impl Iterator<Item = &mut Value> {
        self.rows.iter_mut().map(move |row| &mut row[column])
    }
}

/// A row destined for the sheet: column index -> value.
///
/// A column missing from the map is absent and leaves the sheet cell alone.
/// `Value::Empty` in the map is a supplied blank and clears the cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseRow {
    cells: BTreeMap<usize, Value>,
}

impl SparseRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: usize, value: Value) {
        self.cells.insert(column, value);
    }

    pub fn get(&self, column: usize) -> Option<&Value> {
        self.cells.get(&column)
    }

    /// Supplied cells in column order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value)> {
        self.cells.iter().map(|(c, v)| (*c, v))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Dense row over `col..col + width`, absent cells filled from `base`
    pub fn overlay(&self, col: usize, base: &[Value]) -> Vec<Value> {
        base.iter()
            .enumerate()
            .map(|(offset, existing)| {
                self.get(col + offset)
                    .cloned()
                    .unwrap_or_else(|| existing.clone())
            })
            .collect()
    }

    /// Dense row over `col..col + width`, absent cells left blank
    pub fn to_dense(&self, col: usize, width: usize) -> Vec<Value> {
        (col..col + width)
            .map(|c| self.get(c).cloned().unwrap_or_default())
            .collect()
    }
}

impl FromIterator<(usize, Value)> for SparseRow {
    fn from_iter<T: IntoIterator<Item = (usize, Value)>>(iter: T) -> Self {
        Self {
            cells: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_csv_rejected() {
        let err = Batch::from_records(Vec::new()).unwrap_err();
        assert!(err.to_string().contains("Empty CSV"));
    }

    #[test]
    fn test_header_only_batch_is_valid() {
        let batch = Batch::from_records(vec![strings(&["Date", "Amount"])]).unwrap();
        assert!(batch.is_empty());
        assert_eq!(batch.schema().len(), 2);
    }

    #[test]
    fn test_short_rows_padded() {
        let batch = Batch::from_records(vec![
            strings(&["Date", "Amount", "Description"]),
            strings(&["2024-01-15"]),
        ])
        .unwrap();
        assert_eq!(batch.rows()[0].len(), 3);
        assert_eq!(batch.get(0, "Amount"), Some(&Value::Empty));
    }

    #[test]
    fn test_ensure_field_widens_rows() {
        let mut batch = Batch::from_records(vec![
            strings(&["Date"]),
            strings(&["2024-01-15"]),
            strings(&["2024-01-16"]),
        ])
        .unwrap();
        let month = batch.ensure_field("Month");
        assert_eq!(month, 1);
        assert!(batch.rows().iter().all(|row| row.len() == 2));
        assert_eq!(batch.original_header(), &["Date"]);
    }

    #[test]
    fn test_sparse_overlay_keeps_absent_cells() {
        let row: SparseRow = [(3, Value::Number(9.0)), (5, Value::Empty)].into_iter().collect();
        let base = vec![Value::text("a"), Value::text("b"), Value::text("c")];
        assert_eq!(
            row.overlay(3, &base),
            vec![Value::Number(9.0), Value::text("b"), Value::Empty]
        );
        assert_eq!(row.to_dense(2, 3), vec![Value::Empty, Value::Number(9.0), Value::Empty]);
    }
}
