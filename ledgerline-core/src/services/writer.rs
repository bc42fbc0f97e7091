//! Sheet writes of an import

use crate::domain::result::Result;
use crate::domain::{fields, Rect, SparseRow, StoreSchema};
use crate::ports::SheetStore;
use crate::services::diff::ModifyPlan;

/// Run `write` with the validation rules of `rect` lifted.
///
/// Rules are restored on every path. A write error takes precedence over a
/// restore error.
pub fn with_validation_suspended<S, T, F>(store: &mut S, rect: Rect, write: F) -> Result<T>
where
    S: SheetStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T>,
{
    let rules = store.get_validations(rect)?;
    store.clear_validations(rect)?;

    let written = write(store);
    let restored = store.set_validations(rect, &rules);

    match (written, restored) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            tracing::error!(range = %rect, "failed to restore validation rules: {}", restore_err);
            Err(e)
        }
    }
}

/// Append new rows into `rect`, growing the sheet first when needed
pub fn append<S>(store: &mut S, rect: Rect, rows: &[SparseRow]) -> Result<()>
where
    S: SheetStore + ?Sized,
{
    let max_rows = store.max_rows()?;
    let needed = rect.row + rect.height;
    if needed > max_rows {
        let grow = needed - max_rows;
        tracing::info!(rows = grow, "growing sheet");
        store.insert_rows(max_rows, grow)?;
    }

    let values: Vec<_> = rows
        .iter()
        .map(|row| row.to_dense(rect.col, rect.width))
        .collect();
    tracing::info!(range = %rect, "adding transactions");
    with_validation_suspended(store, rect, |s| s.set_values(rect, &values))
}

/// Write the merged update rectangle
pub fn update<S>(store: &mut S, plan: &ModifyPlan) -> Result<()>
where
    S: SheetStore + ?Sized,
{
    tracing::info!(range = %plan.rect, "modifying transactions");
    with_validation_suspended(store, plan.rect, |s| s.set_values(plan.rect, &plan.values))
}

/// Sort every data row by `Date`, newest first. No-op without a `Date` column.
pub fn sort_by_date<S>(store: &mut S, schema: &StoreSchema) -> Result<()>
where
    S: SheetStore + ?Sized,
{
    match schema.column(fields::DATE) {
        Some(column) => store.sort(column, false),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemorySheet;
    use crate::domain::result::Error;
    use crate::domain::{ValidationRule, Value};
    use chrono_tz::Tz;

    fn sheet() -> MemorySheet {
        let mut sheet = MemorySheet::from_rows(
            "Transactions",
            Tz::UTC,
            vec![Value::Empty, Value::text("Category")],
            vec![vec![Value::Empty, Value::text("Food")]],
        );
        sheet.set_column_rule(1, Some("one-of:Food|Rent".parse().unwrap()));
        sheet
    }

    #[test]
    fn test_write_bypasses_and_restores_rules() {
        let mut sheet = sheet();
        let rect = Rect::new(1, 1, 1, 1);
        with_validation_suspended(&mut sheet, rect, |s| {
            s.set_values(rect, &[vec![Value::text("Travel")]])
        })
        .unwrap();

        assert_eq!(sheet.get_values(rect).unwrap(), vec![vec![Value::text("Travel")]]);
        assert!(matches!(
            sheet.get_validations(rect).unwrap()[0][0],
            Some(ValidationRule::OneOf { .. })
        ));
    }

    #[test]
    fn test_rules_restored_when_write_fails() {
        let mut sheet = sheet();
        let rect = Rect::new(1, 1, 1, 1);
        let err = with_validation_suspended(&mut sheet, rect, |_| -> Result<()> {
            Err(Error::validation("boom"))
        })
        .unwrap_err();

        assert!(err.to_string().contains("boom"));
        assert!(sheet.get_validations(rect).unwrap()[0][0].is_some());
    }

    #[test]
    fn test_append_grows_sheet() {
        let mut sheet = sheet();
        let rect = Rect::new(2, 1, 2, 1);
        let rows: Vec<SparseRow> = vec![
            [(1, Value::text("Rent"))].into_iter().collect(),
            [(1, Value::text("Food"))].into_iter().collect(),
        ];
        append(&mut sheet, rect, &rows).unwrap();
        assert_eq!(sheet.max_rows().unwrap(), 4);
        assert_eq!(sheet.last_row().unwrap(), 4);
    }
}
