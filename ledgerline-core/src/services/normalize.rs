//! Batch normalization: dates, amounts, descriptions, then identities

use chrono::{DateTime, Utc};

use crate::domain::result::{Error, Result};
use crate::domain::value::coerce_number;
use crate::domain::{fields, Batch, ImportContext, StoreSchema, Value};
use crate::services::description::describe;
use crate::services::identity::assign_identities;
use crate::services::timezone::{
    classify_midnights, month_start, parse_value, transplant, week_start, ZoneOrigin,
};

/// What normalization did to a batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeReport {
    /// Zone classification of the dates, `None` without a `Date` field
    pub zone_origin: Option<ZoneOrigin>,
    /// Whether content identifiers were synthesized
    pub ids_assigned: bool,
}

/// Run every normalization step in order
pub fn normalize_batch(
    batch: &mut Batch,
    store: &StoreSchema,
    ctx: &ImportContext,
) -> Result<NormalizeReport> {
    let zone_origin = normalize_dates(batch, ctx)?;
    normalize_date_added(batch, ctx)?;
    normalize_amounts(batch)?;
    normalize_descriptions(batch);
    let ids_assigned = assign_identities(batch, store);
    Ok(NormalizeReport {
        zone_origin,
        ids_assigned,
    })
}

/// Parse dates, move date-only values into the store zone and derive
/// `Month` and `Week`.
///
/// When every date is midnight in the runtime zone, or every date is
/// midnight in UTC, the dates are taken to be calendar days and their
/// wall-clock reading is re-anchored in the store zone. Otherwise they are
/// left as parsed.
pub fn normalize_dates(batch: &mut Batch, ctx: &ImportContext) -> Result<Option<ZoneOrigin>> {
    let Some(column) = batch.schema().position(fields::DATE) else {
        return Ok(None);
    };

    let parsed = batch
        .rows()
        .iter()
        .map(|row| parse_value(&row[column], ctx.runtime_zone))
        .collect::<Result<Vec<DateTime<Utc>>>>()?;

    let origin = classify_midnights(&parsed, ctx.runtime_zone);
    let dates = match origin.source_zone(ctx.runtime_zone) {
        Some(from) => {
            tracing::info!(
                from = from.name(),
                to = ctx.store_zone.name(),
                "interpreting date-only values in the store time zone"
            );
            parsed
                .iter()
                .map(|d| transplant(d, from, ctx.store_zone))
                .collect()
        }
        None => parsed,
    };

    let month = batch.ensure_field(fields::MONTH);
    let week = batch.ensure_field(fields::WEEK);
    for (row, date) in batch.rows_mut().zip(&dates) {
        row[column] = Value::Timestamp(*date);
        row[month] = Value::Timestamp(month_start(date, ctx.store_zone));
        row[week] = Value::Timestamp(week_start(date, ctx.store_zone));
    }
    Ok(Some(origin))
}

/// Parse a supplied `Date Added` as instants, as the sheet does with typed-in
/// dates. Blank cells stay blank and nothing is moved between zones.
pub fn normalize_date_added(batch: &mut Batch, ctx: &ImportContext) -> Result<()> {
    let Some(column) = batch.schema().position(fields::DATE_ADDED) else {
        return Ok(());
    };

    for value in batch.column_mut(column) {
        if value.is_empty() {
            continue;
        }
        *value = Value::Timestamp(parse_value(value, ctx.runtime_zone)?);
    }
    Ok(())
}

/// Coerce amounts the way the sheet coerces typed-in numbers, after
/// dropping currency symbols and thousands separators. Blank amounts are zero.
pub fn normalize_amounts(batch: &mut Batch) -> Result<()> {
    let Some(column) = batch.schema().position(fields::AMOUNT) else {
        return Ok(());
    };

    for value in batch.column_mut(column) {
        let coerced = match &*value {
            Value::Number(_) => continue,
            Value::Empty => Value::Number(0.0),
            Value::Text(raw) => {
                let stripped: String = raw.chars().filter(|c| *c != '$' && *c != ',').collect();
                coerce_number(&stripped)
                    .map(Value::Number)
                    .ok_or_else(|| Error::parse(format!("Invalid amount '{}'", raw)))?
            }
            Value::Timestamp(_) => {
                return Err(Error::parse(format!("Invalid amount '{}'", value)));
            }
        };
        *value = coerced;
    }
    Ok(())
}

/// Keep the raw description as `Full Description` and derive `Description`.
///
/// `Full Description` is the source when present, so re-importing a sheet's
/// own export yields the same descriptions.
pub fn normalize_descriptions(batch: &mut Batch) {
    let schema = batch.schema();
    let Some(source) = schema
        .position(fields::FULL_DESCRIPTION)
        .or_else(|| schema.position(fields::DESCRIPTION))
    else {
        return;
    };

    let description = batch.ensure_field(fields::DESCRIPTION);
    let full_description = batch.ensure_field(fields::FULL_DESCRIPTION);
    for row in batch.rows_mut() {
        let raw = row[source].clone();
        row[description] = Value::text(describe(&raw.key_text()));
        row[full_description] = raw;
    }
}
