//! Event log migrations, applied to logs.duckdb the same way as the sheet's

/// (file name, SQL) of every log migration
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
