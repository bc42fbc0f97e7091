//! In-memory sheet implementation

use chrono_tz::Tz;

use crate::domain::result::{Error, Result};
use crate::domain::{Rect, ValidationRule, Value, HEADER_ROWS};
use crate::ports::{RuleGrid, SheetStore};

#[derive(Debug, Clone, Default, PartialEq)]
struct Cell {
    value: Value,
    rule: Option<ValidationRule>,
}

/// A sheet held entirely in memory.
///
/// Used by tests and as the working grid the DuckDB adapter sorts in.
#[derive(Debug, Clone)]
pub struct MemorySheet {
    name: String,
    time_zone: Tz,
    cells: Vec<Vec<Cell>>,
    width: usize,
}

impl MemorySheet {
    /// Create a sheet with a header row and `max_rows` rows of capacity
    /// (header included)
    pub fn new(name: impl Into<String>, time_zone: Tz, header: Vec<Value>, max_rows: usize) -> Self {
        let width = header.len();
        let mut cells = vec![vec![Cell::default(); width]; max_rows.max(HEADER_ROWS)];
        for (cell, value) in cells[0].iter_mut().zip(header) {
            cell.value = value;
        }
        Self {
            name: name.into(),
            time_zone,
            cells,
            width,
        }
    }

    /// Create a sheet from a header and data rows, sized to fit them exactly
    pub fn from_rows(name: impl Into<String>, time_zone: Tz, header: Vec<Value>, rows: Vec<Vec<Value>>) -> Self {
        let mut sheet = Self::new(name, time_zone, header, HEADER_ROWS + rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            for (cell, value) in sheet.cells[HEADER_ROWS + i].iter_mut().zip(row) {
                cell.value = value;
            }
        }
        sheet
    }

    /// Every data row up to the last used row
    pub fn data_rows(&self) -> Vec<Vec<Value>> {
        let last = self.used_rows();
        self.cells[HEADER_ROWS.min(last)..last]
            .iter()
            .map(|row| row.iter().map(|c| c.value.clone()).collect())
            .collect()
    }

    /// Apply a rule to every data row of a column
    pub fn set_column_rule(&mut self, column: usize, rule: Option<ValidationRule>) {
        for row in self.cells.iter_mut().skip(HEADER_ROWS) {
            if let Some(cell) = row.get_mut(column) {
                cell.rule = rule.clone();
            }
        }
    }

    fn used_rows(&self) -> usize {
        self.cells
            .iter()
            .rposition(|row| row.iter().any(|c| !c.value.is_empty()))
            .map_or(0, |i| i + 1)
    }

    fn check_bounds(&self, rect: Rect) -> Result<()> {
        if rect.row + rect.height > self.cells.len() || rect.col + rect.width > self.width {
            return Err(Error::validation(format!(
                "Range {} is out of bounds for sheet '{}' ({} rows x {} columns)",
                rect,
                self.name,
                self.cells.len(),
                self.width
            )));
        }
        Ok(())
    }

    fn check_shape<T>(rect: Rect, grid: &[Vec<T>]) -> Result<()> {
        if grid.len() != rect.height || grid.iter().any(|row| row.len() != rect.width) {
            return Err(Error::validation(format!(
                "Data does not match range {} ({} rows x {} columns)",
                rect, rect.height, rect.width
            )));
        }
        Ok(())
    }
}

impl SheetStore for MemorySheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn time_zone(&self) -> Tz {
        self.time_zone
    }

    fn last_row(&self) -> Result<usize> {
        Ok(self.used_rows())
    }

    fn last_column(&self) -> Result<usize> {
        let last = self
            .cells
            .iter()
            .filter_map(|row| row.iter().rposition(|c| !c.value.is_empty()))
            .max()
            .map_or(0, |i| i + 1);
        Ok(last)
    }

    fn max_rows(&self) -> Result<usize> {
        Ok(self.cells.len())
    }

    fn max_columns(&self) -> Result<usize> {
        Ok(self.width)
    }

    fn get_values(&self, rect: Rect) -> Result<Vec<Vec<Value>>> {
        self.check_bounds(rect)?;
        Ok(self.cells[rect.row..rect.row + rect.height]
            .iter()
            .map(|row| {
                row[rect.col..rect.col + rect.width]
                    .iter()
                    .map(|c| c.value.clone())
                    .collect()
            })
            .collect())
    }

    fn set_values(&mut self, rect: Rect, values: &[Vec<Value>]) -> Result<()> {
        self.check_bounds(rect)?;
        Self::check_shape(rect, values)?;

        for (i, row) in values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let cell = &self.cells[rect.row + i][rect.col + j];
                if let Some(rule) = &cell.rule {
                    if !rule.accepts(value) {
                        let at = Rect::new(rect.row + i, rect.col + j, 1, 1);
                        return Err(Error::validation(format!(
                            "Input '{}' at {} violates the data validation rule {}",
                            value, at, rule
                        )));
                    }
                }
            }
        }

        for (i, row) in values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                self.cells[rect.row + i][rect.col + j].value = value.clone();
            }
        }
        Ok(())
    }

    fn get_validations(&self, rect: Rect) -> Result<RuleGrid> {
        self.check_bounds(rect)?;
        Ok(self.cells[rect.row..rect.row + rect.height]
            .iter()
            .map(|row| {
                row[rect.col..rect.col + rect.width]
                    .iter()
                    .map(|c| c.rule.clone())
                    .collect()
            })
            .collect())
    }

    fn set_validations(&mut self, rect: Rect, rules: &[Vec<Option<ValidationRule>>]) -> Result<()> {
        self.check_bounds(rect)?;
        Self::check_shape(rect, rules)?;
        for (i, row) in rules.iter().enumerate() {
            for (j, rule) in row.iter().enumerate() {
                self.cells[rect.row + i][rect.col + j].rule = rule.clone();
            }
        }
        Ok(())
    }

    fn clear_validations(&mut self, rect: Rect) -> Result<()> {
        self.check_bounds(rect)?;
        for row in &mut self.cells[rect.row..rect.row + rect.height] {
            for cell in &mut row[rect.col..rect.col + rect.width] {
                cell.rule = None;
            }
        }
        Ok(())
    }

    fn insert_rows(&mut self, at: usize, count: usize) -> Result<()> {
        if at > self.cells.len() {
            return Err(Error::validation(format!(
                "Cannot insert rows at {} in a sheet of {} rows",
                at,
                self.cells.len()
            )));
        }
        let blank = vec![Cell::default(); self.width];
        self.cells
            .splice(at..at, std::iter::repeat(blank).take(count));
        Ok(())
    }

    fn sort(&mut self, column: usize, ascending: bool) -> Result<()> {
        if column >= self.width {
            return Err(Error::validation(format!("Sort column {} is out of bounds", column)));
        }
        if self.cells.len() > HEADER_ROWS {
            self.cells[HEADER_ROWS..].sort_by(|a, b| {
                a[column].value.sort_cmp_directed(&b[column].value, ascending)
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> MemorySheet {
        MemorySheet::from_rows(
            "Transactions",
            Tz::UTC,
            vec![Value::Empty, Value::text("Date"), Value::text("Category")],
            vec![
                vec![Value::Empty, Value::Number(1.0), Value::text("Food")],
                vec![Value::Empty, Value::Number(3.0), Value::text("Rent")],
                vec![Value::Empty, Value::Number(2.0), Value::Empty],
            ],
        )
    }

    #[test]
    fn test_bounds_and_last_row() {
        let sheet = sheet();
        assert_eq!(sheet.last_row().unwrap(), 4);
        assert_eq!(sheet.last_column().unwrap(), 3);
        assert!(sheet.get_values(Rect::new(4, 0, 1, 1)).is_err());
    }

    #[test]
    fn test_validation_rejects_write() {
        let mut sheet = sheet();
        sheet.set_column_rule(2, Some("one-of:Food|Rent".parse().unwrap()));

        let rect = Rect::new(1, 1, 1, 2);
        let err = sheet
            .set_values(rect, &[vec![Value::Number(5.0), Value::text("Travel")]])
            .unwrap_err();
        assert!(err.to_string().contains("violates"));
        // nothing written
        assert_eq!(sheet.get_values(rect).unwrap()[0][0], Value::Number(1.0));
    }

    #[test]
    fn test_insert_rows_grows_capacity() {
        let mut sheet = sheet();
        sheet.insert_rows(4, 2).unwrap();
        assert_eq!(sheet.max_rows().unwrap(), 6);
        assert_eq!(sheet.last_row().unwrap(), 4);
    }

    #[test]
    fn test_sort_descending_moves_rules() {
        let mut sheet = sheet();
        sheet
            .set_validations(Rect::new(2, 2, 1, 1), &[vec![Some(ValidationRule::ValidDate)]])
            .unwrap();
        sheet.sort(1, false).unwrap();

        let dates: Vec<Value> = sheet.data_rows().into_iter().map(|r| r[1].clone()).collect();
        assert_eq!(dates, vec![Value::Number(3.0), Value::Number(2.0), Value::Number(1.0)]);
        let rules = sheet.get_validations(Rect::new(1, 2, 3, 1)).unwrap();
        assert_eq!(rules[0][0], Some(ValidationRule::ValidDate));
        assert_eq!(rules[1][0], None);
    }
}
