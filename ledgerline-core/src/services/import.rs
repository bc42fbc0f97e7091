//! Import service - reconcile a batch with the sheet
//!
//! The pipeline reads the sheet's header and identity column once, normalizes
//! the batch, matches records and fields, then either reports what would
//! change (preview) or appends new rows, updates the shrunk modify rectangle
//! and re-sorts the sheet by date (commit).

use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;

use crate::domain::result::Result;
use crate::domain::{fields, Batch, ImportContext, Rect, StoreSchema, Value, HEADER_ROWS};
use crate::ports::SheetStore;
use crate::services::diff::{self, Partition};
use crate::services::logging::{events, LogEvent, LoggingService};
use crate::services::matching::{map_columns, map_rows, StoreIndex};
use crate::services::normalize::{normalize_batch, NormalizeReport};
use crate::services::rectangle::{add_rect, modify_rect};
use crate::services::timezone::ZoneOrigin;
use crate::services::writer;

/// What a commit would do, without writing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportPreview {
    /// Records that would be appended
    pub to_add: usize,
    /// Matched records with at least one differing cell
    pub to_modify: usize,
    /// Records in the batch
    pub total: usize,
    /// Submitted header names and whether the sheet has each
    pub fields: Vec<(String, bool)>,
}

/// What a commit did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub total: usize,
    pub rows_added: usize,
    pub rows_modified: usize,
    pub cells_modified: usize,
    /// Rectangle written by the append, if any
    pub added: Option<Rect>,
    /// Rectangle written by the update, if any
    pub modified: Option<Rect>,
    pub zone_origin: Option<ZoneOrigin>,
    pub ids_assigned: bool,
}

/// Everything derived from one read of the sheet
struct Reconciliation {
    schema: StoreSchema,
    fields: Vec<(String, bool)>,
    total: usize,
    report: NormalizeReport,
    partition: Partition,
    add_rect: Option<Rect>,
    modify_rect: Option<Rect>,
    /// Sheet content of `modify_rect`
    existing: Vec<Vec<Value>>,
}

fn reconcile<S>(store: &S, mut batch: Batch, ctx: &ImportContext) -> Result<Reconciliation>
where
    S: SheetStore + ?Sized,
{
    let header = store.header()?;
    tracing::debug!(
        range = %Rect::new(0, 0, 1, header.len().max(1)),
        "read headers"
    );
    let schema = StoreSchema::from_header(&header);
    let id_column = schema.id_column()?;

    let fields = batch
        .original_header()
        .iter()
        .map(|name| (name.clone(), schema.contains(name)))
        .collect();
    let total = batch.len();

    let report = normalize_batch(&mut batch, &schema, ctx)?;

    let ids = store.column_values(id_column)?;
    tracing::debug!(
        range = %Rect::new(HEADER_ROWS, id_column, ids.len().max(1), 1),
        "read transaction IDs"
    );
    let index = StoreIndex::build(&ids);

    let batch_ids = batch.column_values(fields::TRANSACTION_ID).unwrap_or_default();
    let row_map = map_rows(batch_ids, &index);
    let column_map = map_columns(batch.schema(), &schema);

    let partition = diff::partition(&batch, &row_map, &column_map, &schema, ctx.imported_at);
    let add_rect = add_rect(&column_map, &schema, store.last_row()?, partition.adds.len());
    let modify_rect = modify_rect(&row_map, &column_map);

    let existing = match modify_rect {
        Some(rect) => {
            tracing::debug!(range = %rect, "read rows for comparison");
            store.get_values(rect)?
        }
        None => Vec::new(),
    };

    Ok(Reconciliation {
        schema,
        fields,
        total,
        report,
        partition,
        add_rect,
        modify_rect,
        existing,
    })
}

/// Report what importing `batch` would change
pub fn preview<S>(store: &S, batch: Batch, ctx: &ImportContext) -> Result<ImportPreview>
where
    S: SheetStore + ?Sized,
{
    let r = reconcile(store, batch, ctx)?;
    let to_modify = match r.modify_rect {
        Some(rect) => diff::count_modified(&r.partition.modifies, rect, &r.existing),
        None => 0,
    };
    Ok(ImportPreview {
        to_add: r.partition.adds.len(),
        to_modify,
        total: r.total,
        fields: r.fields,
    })
}

/// Import `batch`: append new records, update changed ones, sort by date.
///
/// The append and the update are separate writes. A failure in the update
/// leaves the append in place.
pub fn commit<S>(store: &mut S, batch: Batch, ctx: &ImportContext) -> Result<ImportSummary>
where
    S: SheetStore + ?Sized,
{
    let r = reconcile(&*store, batch, ctx)?;
    let plan = r
        .modify_rect
        .and_then(|rect| diff::shrink(&r.partition.modifies, rect, &r.existing));

    let mut rows_added = 0;
    if let Some(rect) = r.add_rect {
        writer::append(store, rect, &r.partition.adds)?;
        rows_added = r.partition.adds.len();
    }
    if let Some(plan) = &plan {
        writer::update(store, plan)?;
    }
    writer::sort_by_date(store, &r.schema)?;

    Ok(ImportSummary {
        total: r.total,
        rows_added,
        rows_modified: plan.as_ref().map_or(0, |p| p.changed_rows),
        cells_modified: plan.as_ref().map_or(0, |p| p.changed_cells),
        added: r.add_rect,
        modified: plan.as_ref().map(|p| p.rect),
        zone_origin: r.report.zone_origin,
        ids_assigned: r.report.ids_assigned,
    })
}

/// Import service - runs previews and commits and records them in the event log
pub struct ImportService {
    runtime_zone: Tz,
    logging: Option<Arc<LoggingService>>,
}

impl ImportService {
    pub fn new(runtime_zone: Tz) -> Self {
        Self {
            runtime_zone,
            logging: None,
        }
    }

    /// Record previews, commits and failures in the event log
    pub fn with_logging(mut self, logging: Arc<LoggingService>) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Context for an import into `store`, stamped now
    pub fn context_for<S>(&self, store: &S) -> ImportContext
    where
        S: SheetStore + ?Sized,
    {
        ImportContext::new(store.time_zone(), self.runtime_zone, Utc::now())
    }

    pub fn preview<S>(&self, store: &S, batch: Batch) -> Result<ImportPreview>
    where
        S: SheetStore + ?Sized,
    {
        let ctx = self.context_for(store);
        let result = preview(store, batch, &ctx);
        match &result {
            Ok(p) => self.record(
                LogEvent::new(events::IMPORT_PREVIEWED)
                    .with_sheet(store.name())
                    .with_counts(p.total, p.to_add, p.to_modify),
            ),
            Err(e) => self.record_failure(store.name(), e),
        }
        result
    }

    pub fn commit<S>(&self, store: &mut S, batch: Batch) -> Result<ImportSummary>
    where
        S: SheetStore + ?Sized,
    {
        let ctx = self.context_for(&*store);
        let result = commit(store, batch, &ctx);
        match &result {
            Ok(s) => {
                tracing::info!(
                    added = s.rows_added,
                    modified = s.rows_modified,
                    total = s.total,
                    "import committed"
                );
                self.record(
                    LogEvent::new(events::IMPORT_COMMITTED)
                        .with_sheet(store.name())
                        .with_counts(s.total, s.rows_added, s.rows_modified),
                )
            }
            Err(e) => self.record_failure(store.name(), e),
        }
        result
    }

    fn record_failure(&self, sheet: &str, error: &crate::domain::result::Error) {
        self.record(
            LogEvent::new(events::IMPORT_FAILED)
                .with_sheet(sheet)
                .with_error(error.to_string()),
        );
    }

    fn record(&self, event: LogEvent) {
        if let Some(logging) = &self.logging {
            if let Err(e) = logging.log(event.with_command("import")) {
                tracing::warn!("Failed to write event log: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemorySheet;
    use chrono::TimeZone;

    fn header() -> Vec<Value> {
        ["", "Date", "Amount", "Description", "Transaction ID", "Date Added"]
            .iter()
            .map(|s| Value::text(*s))
            .collect()
    }

    fn ctx() -> ImportContext {
        ImportContext::new(
            Tz::UTC,
            Tz::UTC,
            Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    fn csv_batch(rows: &[&[&str]]) -> Batch {
        let mut records = vec![vec!["Date".to_string(), "Amount".into(), "Description".into()]];
        records.extend(rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()));
        Batch::from_records(records).unwrap()
    }

    #[test]
    fn test_preview_into_empty_sheet() {
        let sheet = MemorySheet::new("Transactions", Tz::UTC, header(), 1);
        let batch = Batch::from_records(vec![
            vec!["Date".into(), "Amount".into(), "Memo".into()],
            vec!["2024-01-15".into(), "12.00".into(), "x".into()],
        ])
        .unwrap();

        let p = preview(&sheet, batch, &ctx()).unwrap();
        assert_eq!(p.to_add, 1);
        assert_eq!(p.to_modify, 0);
        assert_eq!(p.total, 1);
        assert_eq!(
            p.fields,
            vec![
                ("Date".to_string(), true),
                ("Amount".to_string(), true),
                ("Memo".to_string(), false)
            ]
        );
    }

    #[test]
    fn test_commit_appends_and_stamps_date_added() {
        let mut sheet = MemorySheet::new("Transactions", Tz::UTC, header(), 1);
        let summary = commit(
            &mut sheet,
            csv_batch(&[&["2024-01-15", "-4.50", "COFFEE"], &["2024-01-16", "-9", "LUNCH"]]),
            &ctx(),
        )
        .unwrap();

        assert_eq!(summary.rows_added, 2);
        assert_eq!(summary.added, Some(Rect::new(1, 1, 2, 5)));
        assert!(summary.ids_assigned);

        let rows = sheet.data_rows();
        // newest first
        assert_eq!(rows[0][3], Value::text("Lunch"));
        assert_eq!(rows[1][2], Value::Number(-4.5));
        assert_eq!(rows[1][5], Value::Timestamp(ctx().imported_at));
    }

    #[test]
    fn test_reimport_is_a_no_op() {
        let mut sheet = MemorySheet::new("Transactions", Tz::UTC, header(), 1);
        let rows: &[&[&str]] = &[&["2024-01-15", "-4.50", "COFFEE"], &["2024-01-15", "-4.50", "COFFEE"]];
        commit(&mut sheet, csv_batch(rows), &ctx()).unwrap();
        let before = sheet.data_rows();

        let p = preview(&sheet, csv_batch(rows), &ctx()).unwrap();
        assert_eq!((p.to_add, p.to_modify), (0, 0));

        let summary = commit(&mut sheet, csv_batch(rows), &ctx()).unwrap();
        assert_eq!(summary.rows_added, 0);
        assert_eq!(summary.modified, None);
        assert_eq!(sheet.data_rows(), before);
    }

    #[test]
    fn test_sheet_without_id_column_is_rejected() {
        let sheet = MemorySheet::new(
            "Transactions",
            Tz::UTC,
            vec![Value::Empty, Value::text("Date")],
            1,
        );
        let err = preview(&sheet, csv_batch(&[]), &ctx()).unwrap_err();
        assert!(err.to_string().contains("Transaction ID"));
    }
}
