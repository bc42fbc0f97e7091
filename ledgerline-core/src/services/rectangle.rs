//! Bounding rectangles of the add and modify writes

use crate::domain::{fields, Rect, StoreSchema, HEADER_ROWS};

/// Smallest and largest mapped sheet column, `None` when no field maps
pub fn column_span(column_map: &[Option<usize>]) -> Option<(usize, usize)> {
    let mapped = column_map.iter().flatten().copied();
    let min = mapped.clone().min()?;
    let max = mapped.max()?;
    Some((min, max))
}

/// Rows appended below the sheet's last used row.
///
/// Columns cover every mapped field plus `Date Added` when the sheet has it.
/// `None` when there is nothing to add or no field maps to the sheet.
pub fn add_rect(
    column_map: &[Option<usize>],
    store: &StoreSchema,
    last_row: usize,
    adds: usize,
) -> Option<Rect> {
    if adds == 0 {
        return None;
    }
    let (mut col_min, mut col_max) = column_span(column_map)?;
    if let Some(date_added) = store.column(fields::DATE_ADDED) {
        col_min = col_min.min(date_added);
        col_max = col_max.max(date_added);
    }
    let first_row = last_row.max(HEADER_ROWS);
    Some(Rect::spanning(first_row, first_row + adds - 1, col_min, col_max))
}

/// Sheet rows from the first to the last matched record, over the mapped
/// columns. `None` when nothing matched or no field maps.
pub fn modify_rect(row_map: &[Option<usize>], column_map: &[Option<usize>]) -> Option<Rect> {
    let matched = row_map.iter().flatten().copied();
    let row_min = matched.clone().min()?;
    let row_max = matched.max()?;
    let (col_min, col_max) = column_span(column_map)?;
    Some(Rect::spanning(
        row_min + HEADER_ROWS,
        row_max + HEADER_ROWS,
        col_min,
        col_max,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Value;

    fn store(names: &[&str]) -> StoreSchema {
        let mut header = vec![Value::Empty];
        header.extend(names.iter().map(|n| Value::text(*n)));
        StoreSchema::from_header(&header)
    }

    #[test]
    fn test_column_span() {
        assert_eq!(column_span(&[None, Some(4), Some(2), None]), Some((2, 4)));
        assert_eq!(column_span(&[None, None]), None);
    }

    #[test]
    fn test_add_rect_includes_date_added() {
        // columns: 1 Date, 2 Amount, 3 Transaction ID, 4 Date Added
        let s = store(&["Date", "Amount", "Transaction ID", "Date Added"]);
        let rect = add_rect(&[Some(1), Some(2), Some(3)], &s, 10, 3).unwrap();
        assert_eq!(rect, Rect::new(10, 1, 3, 4));
        assert_eq!(rect.a1(), "B11:E13");

        assert_eq!(add_rect(&[Some(1)], &s, 10, 0), None);
        assert_eq!(add_rect(&[None], &s, 10, 2), None);
    }

    #[test]
    fn test_add_rect_on_empty_sheet_starts_below_header() {
        let s = store(&["Date"]);
        assert_eq!(add_rect(&[Some(1)], &s, 0, 1), Some(Rect::new(1, 1, 1, 1)));
    }

    #[test]
    fn test_modify_rect_spans_matched_rows() {
        let rect = modify_rect(&[Some(7), None, Some(2)], &[Some(3), None, Some(1)]).unwrap();
        assert_eq!(rect, Rect::new(3, 1, 6, 3));
        assert_eq!(modify_rect(&[None, None], &[Some(1)]), None);
    }
}
