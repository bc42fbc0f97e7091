//! Rectangular sheet ranges

use std::fmt;

use serde::Serialize;

/// Rows above the first data row (the header)
pub const HEADER_ROWS: usize = 1;

/// A contiguous block of cells in zero-based sheet coordinates.
///
/// Row 0 is the header row, so data row `i` lives at sheet row
/// `i + HEADER_ROWS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub row: usize,
    pub col: usize,
    pub height: usize,
    pub width: usize,
}

impl Rect {
    pub fn new(row: usize, col: usize, height: usize, width: usize) -> Self {
        Self { row, col, height, width }
    }

    /// Rectangle spanning two inclusive corners
    pub fn spanning(row_min: usize, row_max: usize, col_min: usize, col_max: usize) -> Self {
        debug_assert!(row_min <= row_max && col_min <= col_max);
        Self::new(row_min, col_min, row_max - row_min + 1, col_max - col_min + 1)
    }

    /// Last row, inclusive
    pub fn row_max(&self) -> usize {
        self.row + self.height - 1
    }

    /// Last column, inclusive
    pub fn col_max(&self) -> usize {
        self.col + self.width - 1
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.row && row < self.row + self.height && col >= self.col && col < self.col + self.width
    }

    pub fn cell_count(&self) -> usize {
        self.height * self.width
    }

    /// Render in A1 notation, e.g. `B2:D5`
    pub fn a1(&self) -> String {
        let start = format!("{}{}", column_letters(self.col), self.row + 1);
        if self.height == 1 && self.width == 1 {
            start
        } else {
            format!("{}:{}{}", start, column_letters(self.col_max()), self.row_max() + 1)
        }
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.a1())
    }
}

/// Zero-based column index to spreadsheet letters (0 -> A, 26 -> AA)
pub fn column_letters(col: usize) -> String {
    let mut n = col + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letters(0), "A");
        assert_eq!(column_letters(25), "Z");
        assert_eq!(column_letters(26), "AA");
        assert_eq!(column_letters(701), "ZZ");
        assert_eq!(column_letters(702), "AAA");
    }

    #[test]
    fn test_a1_notation() {
        assert_eq!(Rect::new(1, 1, 4, 3).a1(), "B2:D5");
        assert_eq!(Rect::new(5, 2, 1, 1).a1(), "C6");
    }

    #[test]
    fn test_spanning_bounds() {
        let rect = Rect::spanning(3, 7, 2, 2);
        assert_eq!(rect.height, 5);
        assert_eq!(rect.width, 1);
        assert_eq!(rect.row_max(), 7);
        assert_eq!(rect.col_max(), 2);
        assert!(rect.contains(7, 2));
        assert!(!rect.contains(8, 2));
    }
}
