//! Migration service - manages database schema migrations
//!
//! Migrations are SQL files embedded at compile time. Each migration is
//! tracked in the sys_migrations table to ensure idempotent execution.
//! The sheet database and the log database each have their own list.

use duckdb::Connection;

use crate::domain::result::Result;

const BOOTSTRAP: &str = "000_migrations.sql";

/// Result of running migrations
#[derive(Debug)]
pub struct MigrationResult {
    /// Names of newly applied migrations
    pub applied: Vec<String>,
    /// Count of migrations that were already applied
    pub already_applied: usize,
}

/// Service for managing database migrations
pub struct MigrationService<'a> {
    conn: &'a Connection,
    migrations: &'static [(&'static str, &'static str)],
}

impl<'a> MigrationService<'a> {
    /// Create a migration service over one connection and migration list
    pub fn new(conn: &'a Connection, migrations: &'static [(&'static str, &'static str)]) -> Self {
        Self { conn, migrations }
    }

    /// Run all pending migrations
    ///
    /// Bootstraps sys_migrations when missing, then applies every migration
    /// not yet recorded, in list order.
    pub fn run_pending(&self) -> Result<MigrationResult> {
        let mut newly_applied = Vec::new();

        if !self.migrations_table_exists()? {
            if let Some((name, sql)) = self.migrations.iter().find(|(n, _)| *n == BOOTSTRAP) {
                self.conn.execute_batch(sql)?;
                self.record_migration(name)?;
                newly_applied.push(name.to_string());
            }
        }

        let applied_set = self.get_applied()?;
        let already_applied = applied_set.len() - newly_applied.len();

        for (name, sql) in self.migrations.iter() {
            if *name == BOOTSTRAP || applied_set.iter().any(|a| a == name) {
                continue;
            }
            self.conn.execute_batch(sql)?;
            self.record_migration(name)?;
            tracing::debug!(migration = name, "applied migration");
            newly_applied.push(name.to_string());
        }

        Ok(MigrationResult {
            applied: newly_applied,
            already_applied,
        })
    }

    /// Check if sys_migrations table exists
    fn migrations_table_exists(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = 'sys_migrations'",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);
        Ok(count > 0)
    }

    /// Get list of already applied migration names
    pub fn get_applied(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT migration_name FROM sys_migrations ORDER BY migration_name")?;
        let names = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut result = Vec::new();
        for name in names {
            result.push(name?);
        }
        Ok(result)
    }

    /// Get list of pending migration names
    pub fn get_pending(&self) -> Result<Vec<String>> {
        let applied = self.get_applied()?;
        Ok(self
            .migrations
            .iter()
            .filter(|(name, _)| !applied.iter().any(|a| a == name))
            .map(|(name, _)| name.to_string())
            .collect())
    }

    /// Record a migration as applied
    fn record_migration(&self, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [name],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_migrations::LOG_MIGRATIONS;
    use crate::migrations::MIGRATIONS;

    #[test]
    fn test_migrations_run_on_fresh_db() {
        let conn = Connection::open_in_memory().unwrap();
        let service = MigrationService::new(&conn, MIGRATIONS);

        let result = service.run_pending().unwrap();
        assert_eq!(result.applied.len(), MIGRATIONS.len());
        assert_eq!(result.already_applied, 0);

        // Running again should apply nothing
        let result2 = service.run_pending().unwrap();
        assert_eq!(result2.applied.len(), 0);
        assert_eq!(result2.already_applied, MIGRATIONS.len());
    }

    #[test]
    fn test_get_pending_after_bootstrap() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(LOG_MIGRATIONS[0].1).unwrap();
        conn.execute(
            "INSERT INTO sys_migrations (migration_name) VALUES (?)",
            [LOG_MIGRATIONS[0].0],
        )
        .unwrap();

        let service = MigrationService::new(&conn, LOG_MIGRATIONS);
        let pending = service.get_pending().unwrap();
        assert_eq!(pending.len(), LOG_MIGRATIONS.len() - 1);
    }
}
