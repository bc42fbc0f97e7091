//! CSV in and out of the engine
//!
//! Reading uses the `csv` crate's default dialect and hands every cell over
//! as text. Writing renders a sheet with timestamps in the sheet's zone so
//! an export can be re-imported unchanged.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use chrono::SecondsFormat;

use crate::domain::result::Result;
use crate::domain::value::format_number;
use crate::domain::{Batch, Rect, Value};
use crate::ports::SheetStore;

/// Every record of a CSV document, header included. Rows may differ in length.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        records.push(record.iter().map(str::to_string).collect());
    }
    Ok(records)
}

/// Parse a CSV document into a batch. The first record is the header.
pub fn read_batch<R: Read>(reader: R) -> Result<Batch> {
    let records = read_records(reader)?;
    tracing::debug!(records = records.len(), "read CSV");
    Batch::from_records(records)
}

pub fn read_batch_from_path(path: &Path) -> Result<Batch> {
    read_batch(File::open(path)?)
}

/// Text of a cell as the sheet displays it, timestamps in `store_zone`
pub fn render_value(value: &Value, store_zone: chrono_tz::Tz) -> String {
    match value {
        Value::Empty => String::new(),
        Value::Text(s) => s.clone(),
        Value::Number(n) => format_number(*n),
        Value::Timestamp(ts) => ts
            .with_timezone(&store_zone)
            .to_rfc3339_opts(SecondsFormat::Millis, false),
    }
}

/// Write the header and every data row of a sheet. Returns the number of
/// data rows written.
pub fn write_sheet<S, W>(store: &S, writer: W) -> Result<usize>
where
    S: SheetStore + ?Sized,
    W: Write,
{
    let width = store.last_column()?;
    let last_row = store.last_row()?;
    let zone = store.time_zone();
    let mut out = csv::Writer::from_writer(writer);

    if width == 0 || last_row == 0 {
        out.flush()?;
        return Ok(0);
    }

    let rows = store.get_values(Rect::new(0, 0, last_row, width))?;
    for row in &rows {
        out.write_record(row.iter().map(|v| render_value(v, zone)))?;
    }
    out.flush()?;
    Ok(rows.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemorySheet;
    use crate::domain::result::Error;
    use chrono::{TimeZone, Utc};
    use chrono_tz::Tz;

    #[test]
    fn test_read_batch_pads_short_rows() {
        let batch = read_batch("Date,Amount,Memo\n2024-01-15,12\n".as_bytes()).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.get(0, "Amount"), Some(&Value::text("12")));
        assert_eq!(batch.get(0, "Memo"), Some(&Value::Empty));
    }

    #[test]
    fn test_empty_and_duplicate_headers() {
        let err = read_batch("".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Empty CSV"));

        let err = read_batch("Date,Date\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_write_sheet_renders_store_zone() {
        let sheet = MemorySheet::from_rows(
            "Transactions",
            Tz::America__New_York,
            vec![Value::Empty, Value::text("Date"), Value::text("Amount")],
            vec![vec![
                Value::Empty,
                Value::Timestamp(Utc.with_ymd_and_hms(2024, 1, 15, 5, 0, 0).unwrap()),
                Value::Number(-12.5),
            ]],
        );

        let mut buf = Vec::new();
        assert_eq!(write_sheet(&sheet, &mut buf).unwrap(), 1);
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            ",Date,Amount\n,2024-01-15T00:00:00.000-05:00,-12.5\n"
        );
    }
}
