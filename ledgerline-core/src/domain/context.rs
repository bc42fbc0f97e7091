//! Per-import context

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Everything an import needs to know about time, fixed for one call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImportContext {
    /// Zone the sheet reads and writes wall-clock times in
    pub store_zone: Tz,
    /// Zone zone-less batch dates were parsed in
    pub runtime_zone: Tz,
    /// Stamped into `Date Added` of appended rows
    pub imported_at: DateTime<Utc>,
}

impl ImportContext {
    pub fn new(store_zone: Tz, runtime_zone: Tz, imported_at: DateTime<Utc>) -> Self {
        Self {
            store_zone,
            runtime_zone,
            imported_at,
        }
    }
}
