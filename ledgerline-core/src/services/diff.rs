//! Diffing incoming records against the sheet
//!
//! Records are split into rows to append and rows to update. Updates are
//! compared against one read of the modify rectangle and shrunk to the
//! smallest rectangle covering every differing cell.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::{fields, Batch, Rect, SparseRow, StoreSchema, Value, HEADER_ROWS};

/// Incoming records split by destination
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// New records, in batch order
    pub adds: Vec<SparseRow>,
    /// Sheet data row -> supplied cells of the matching record
    pub modifies: BTreeMap<usize, SparseRow>,
}

/// Split a batch into appends and updates.
///
/// Only mapped fields are carried. Appended rows also get `Date Added` when
/// the sheet has that column.
pub fn partition(
    batch: &Batch,
    row_map: &[Option<usize>],
    column_map: &[Option<usize>],
    store: &StoreSchema,
    imported_at: DateTime<Utc>,
) -> Partition {
    let date_added = store.column(fields::DATE_ADDED);
    let mut result = Partition::default();

    for (row, target) in batch.rows().iter().zip(row_map) {
        let mut sparse: SparseRow = row
            .iter()
            .zip(column_map)
            .filter_map(|(value, column)| column.map(|c| (c, value.clone())))
            .collect();

        match target {
            Some(data_row) => {
                result.modifies.insert(*data_row, sparse);
            }
            None => {
                if let Some(column) = date_added {
                    sparse.insert(column, Value::Timestamp(imported_at));
                }
                result.adds.push(sparse);
            }
        }
    }
    result
}

/// Columns of a record whose supplied value differs from the sheet row.
/// `existing` covers `rect`'s columns.
fn differing_columns<'a>(
    sparse: &'a SparseRow,
    rect: Rect,
    existing: &'a [Value],
) -> impl Iterator<Item = usize> + 'a {
    sparse.iter().filter_map(move |(column, value)| {
        let current = existing.get(column.checked_sub(rect.col)?)?;
        (!value.loose_eq(current)).then_some(column)
    })
}

fn existing_row(rect: Rect, existing: &[Vec<Value>], data_row: usize) -> &[Value] {
    existing
        .get(data_row + HEADER_ROWS - rect.row)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Number of matched records with at least one differing supplied cell
pub fn count_modified(
    modifies: &BTreeMap<usize, SparseRow>,
    rect: Rect,
    existing: &[Vec<Value>],
) -> usize {
    modifies
        .iter()
        .filter(|(data_row, sparse)| {
            differing_columns(sparse, rect, existing_row(rect, existing, **data_row))
                .next()
                .is_some()
        })
        .count()
}

/// The single update write of a commit
#[derive(Debug, Clone, PartialEq)]
pub struct ModifyPlan {
    /// Smallest rectangle covering every differing cell
    pub rect: Rect,
    /// Merged values: supplied cells over the sheet's current values
    pub values: Vec<Vec<Value>>,
    /// Records with at least one differing cell
    pub changed_rows: usize,
    /// Differing cells
    pub changed_cells: usize,
}

/// Shrink the modify rectangle to the differing cells and merge.
///
/// `existing` is the sheet's content of `rect`. Returns `None` when every
/// matched record already equals the sheet.
pub fn shrink(
    modifies: &BTreeMap<usize, SparseRow>,
    rect: Rect,
    existing: &[Vec<Value>],
) -> Option<ModifyPlan> {
    let mut rows = (usize::MAX, 0);
    let mut cols = (usize::MAX, 0);
    let mut changed_rows = 0;
    let mut changed_cells = 0;

    for (data_row, sparse) in modifies {
        let current = existing_row(rect, existing, *data_row);
        let mut differs = false;
        for column in differing_columns(sparse, rect, current) {
            differs = true;
            changed_cells += 1;
            cols = (cols.0.min(column), cols.1.max(column));
        }
        if differs {
            let sheet_row = data_row + HEADER_ROWS;
            rows = (rows.0.min(sheet_row), rows.1.max(sheet_row));
            changed_rows += 1;
        }
    }

    if changed_rows == 0 {
        return None;
    }

    let shrunk = Rect::spanning(rows.0, rows.1, cols.0, cols.1);
    let values = (shrunk.row..=shrunk.row_max())
        .map(|sheet_row| {
            let current = existing
                .get(sheet_row - rect.row)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            let base: Vec<Value> = (shrunk.col..=shrunk.col_max())
                .map(|c| current.get(c - rect.col).cloned().unwrap_or_default())
                .collect();
            match modifies.get(&(sheet_row - HEADER_ROWS)) {
                Some(sparse) => sparse.overlay(shrunk.col, &base),
                None => base,
            }
        })
        .collect();

    Some(ModifyPlan {
        rect: shrunk,
        values,
        changed_rows,
        changed_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sparse(cells: &[(usize, Value)]) -> SparseRow {
        cells.iter().cloned().collect()
    }

    #[test]
    fn test_partition_adds_date_added_only_to_new_rows() {
        let store = StoreSchema::from_header(&[
            Value::Empty,
            Value::text("Amount"),
            Value::text("Transaction ID"),
            Value::text("Date Added"),
        ]);
        let batch = Batch::new(
            vec!["Amount".into(), "Memo".into(), "Transaction ID".into()],
            vec![
                vec![Value::Number(1.0), Value::text("m"), Value::text("a")],
                vec![Value::Number(2.0), Value::text("m"), Value::text("b")],
            ],
        )
        .unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let p = partition(&batch, &[None, Some(4)], &[Some(1), None, Some(2)], &store, now);
        assert_eq!(
            p.adds,
            vec![sparse(&[
                (1, Value::Number(1.0)),
                (2, Value::text("a")),
                (3, Value::Timestamp(now))
            ])]
        );
        assert_eq!(
            p.modifies.get(&4),
            Some(&sparse(&[(1, Value::Number(2.0)), (2, Value::text("b"))]))
        );
    }

    #[test]
    fn test_shrink_to_single_cell() {
        // modify rectangle: data rows 0..=2 (sheet rows 1..=3), columns 1..=3
        let rect = Rect::new(1, 1, 3, 3);
        let existing = vec![
            vec![Value::text("a"), Value::Number(1.0), Value::text("x")],
            vec![Value::text("b"), Value::Number(2.0), Value::text("y")],
            vec![Value::text("c"), Value::Number(3.0), Value::text("z")],
        ];
        let mut modifies = BTreeMap::new();
        modifies.insert(0, sparse(&[(1, Value::text("a")), (2, Value::text("1"))]));
        modifies.insert(1, sparse(&[(1, Value::text("b")), (2, Value::Number(5.0))]));
        modifies.insert(2, sparse(&[(1, Value::text("c")), (2, Value::Number(3.0))]));

        assert_eq!(count_modified(&modifies, rect, &existing), 1);
        let plan = shrink(&modifies, rect, &existing).unwrap();
        assert_eq!(plan.rect, Rect::new(2, 2, 1, 1));
        assert_eq!(plan.values, vec![vec![Value::Number(5.0)]]);
        assert_eq!(plan.changed_cells, 1);
    }

    #[test]
    fn test_shrink_keeps_unsupplied_cells() {
        let rect = Rect::new(1, 1, 3, 2);
        let existing = vec![
            vec![Value::text("keep-0"), Value::Number(1.0)],
            vec![Value::text("keep-1"), Value::Number(2.0)],
            vec![Value::text("keep-2"), Value::Number(3.0)],
        ];
        let mut modifies = BTreeMap::new();
        modifies.insert(0, sparse(&[(1, Value::text("new-0"))]));
        modifies.insert(2, sparse(&[(2, Value::Number(30.0))]));

        let plan = shrink(&modifies, rect, &existing).unwrap();
        assert_eq!(plan.rect, Rect::new(1, 1, 3, 2));
        assert_eq!(
            plan.values,
            vec![
                vec![Value::text("new-0"), Value::Number(1.0)],
                vec![Value::text("keep-1"), Value::Number(2.0)],
                vec![Value::text("keep-2"), Value::Number(30.0)],
            ]
        );
        assert_eq!(plan.changed_rows, 2);
    }

    #[test]
    fn test_nothing_to_shrink_when_equal() {
        let rect = Rect::new(1, 1, 1, 1);
        let existing = vec![vec![Value::Empty]];
        let mut modifies = BTreeMap::new();
        modifies.insert(0, sparse(&[(1, Value::text(""))]));
        assert_eq!(shrink(&modifies, rect, &existing), None);
        assert_eq!(count_modified(&modifies, rect, &existing), 0);
    }
}
