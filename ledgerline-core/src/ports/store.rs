//! Sheet store port - range-based tabular storage

use chrono_tz::Tz;

use crate::domain::result::Result;
use crate::domain::{Rect, ValidationRule, Value, HEADER_ROWS};

/// Grid of validation rules, one slot per cell
pub type RuleGrid = Vec<Vec<Option<ValidationRule>>>;

/// A persistent sheet of transactions addressed by rectangles.
///
/// Every call is blocking and individually atomic; nothing spans calls.
/// Coordinates are zero-based with the header in row 0.
pub trait SheetStore {
    /// Sheet name, e.g. `Transactions`
    fn name(&self) -> &str;

    /// Zone the sheet reads and writes wall-clock times in
    fn time_zone(&self) -> Tz;

    /// Number of rows up to and including the last row holding any value
    fn last_row(&self) -> Result<usize>;

    /// Number of columns up to and including the last column holding any value
    fn last_column(&self) -> Result<usize>;

    /// Row capacity
    fn max_rows(&self) -> Result<usize>;

    /// Column capacity
    fn max_columns(&self) -> Result<usize>;

    /// Read a rectangle of values, `rect.height` rows of `rect.width` cells
    fn get_values(&self, rect: Rect) -> Result<Vec<Vec<Value>>>;

    /// Overwrite a rectangle of values.
    ///
    /// Fails without writing anything when a value violates an active
    /// validation rule or the rectangle exceeds the sheet's capacity.
    fn set_values(&mut self, rect: Rect, values: &[Vec<Value>]) -> Result<()>;

    /// Read the validation rules of a rectangle
    fn get_validations(&self, rect: Rect) -> Result<RuleGrid>;

    /// Replace the validation rules of a rectangle
    fn set_validations(&mut self, rect: Rect, rules: &[Vec<Option<ValidationRule>>]) -> Result<()>;

    /// Remove every validation rule in a rectangle
    fn clear_validations(&mut self, rect: Rect) -> Result<()>;

    /// Insert `count` blank rows before row `at`, growing capacity
    fn insert_rows(&mut self, at: usize, count: usize) -> Result<()>;

    /// Stable-sort all rows below the header by one column. Blank cells sort
    /// last in both directions. Validation rules move with their rows.
    fn sort(&mut self, column: usize, ascending: bool) -> Result<()>;

    /// The header row
    fn header(&self) -> Result<Vec<Value>> {
        let width = self.last_column()?;
        if width == 0 {
            return Ok(Vec::new());
        }
        Ok(self
            .get_values(Rect::new(0, 0, 1, width))?
            .into_iter()
            .next()
            .unwrap_or_default())
    }

    /// Values of one column for every data row, in row order
    fn column_values(&self, column: usize) -> Result<Vec<Value>> {
        let last_row = self.last_row()?;
        if last_row <= HEADER_ROWS {
            return Ok(Vec::new());
        }
        let rect = Rect::new(HEADER_ROWS, column, last_row - HEADER_ROWS, 1);
        Ok(self
            .get_values(rect)?
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or_default())
            .collect())
    }
}
