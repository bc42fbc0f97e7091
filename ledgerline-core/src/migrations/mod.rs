//! Sheet database migrations
//!
//! SQL files embedded with `include_str!` and applied by `MigrationService`
//! in list order. A new migration gets the next `NNN_` prefix and an entry
//! at the end of the list.

/// (file name, SQL) of every sheet migration
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_sheet_schema.sql", include_str!("001_sheet_schema.sql")),
];
