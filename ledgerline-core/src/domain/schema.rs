//! Field schemas for incoming batches and the sheet

use std::collections::HashMap;

use crate::domain::result::{Error, Result};
use crate::domain::Value;

/// Field names the engine reads or derives
pub mod fields {
    pub const TRANSACTION_ID: &str = "Transaction ID";
    pub const DATE: &str = "Date";
    pub const AMOUNT: &str = "Amount";
    pub const DESCRIPTION: &str = "Description";
    pub const FULL_DESCRIPTION: &str = "Full Description";
    pub const MONTH: &str = "Month";
    pub const WEEK: &str = "Week";
    pub const DATE_ADDED: &str = "Date Added";
}

/// Ordered, name-unique field list of an incoming batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSchema {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl FieldSchema {
    /// Build from a header row. Duplicate names are rejected.
    pub fn from_header<I, S>(header: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = Self::default();
        for name in header {
            let name = name.into();
            if schema.positions.contains_key(&name) {
                return Err(Error::validation("Duplicate CSV headers"));
            }
            schema.push(name);
        }
        Ok(schema)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Position of `name`, appending it when absent
    pub fn ensure(&mut self, name: &str) -> usize {
        match self.position(name) {
            Some(i) => i,
            None => self.push(name.to_string()),
        }
    }

    fn push(&mut self, name: String) -> usize {
        let i = self.names.len();
        self.positions.insert(name.clone(), i);
        self.names.push(name);
        i
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Column layout of the sheet, read from its header row.
///
/// The first header cell is usually a logo image rather than a name, so any
/// non-text header cell is skipped. A repeated name maps to its last column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSchema {
    columns: HashMap<String, usize>,
    width: usize,
}

impl StoreSchema {
    pub fn from_header(header: &[Value]) -> Self {
        let columns = header
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| match cell {
                Value::Text(name) if !name.is_empty() => Some((name.clone(), i)),
                _ => None,
            })
            .collect();
        Self {
            columns,
            width: header.len(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Number of header cells, named or not
    pub fn width(&self) -> usize {
        self.width
    }

    /// Column of the identity field, which every sheet must have
    pub fn id_column(&self) -> Result<usize> {
        self.column(fields::TRANSACTION_ID).ok_or_else(|| {
            Error::validation(format!("Sheet has no '{}' column", fields::TRANSACTION_ID))
        })
    }
}
