//! Catalog probing for optional tables and columns.
//!
//! Deployments may lag behind the optional migration; instead of failing,
//! the engine asks the catalog once which pieces exist and turns the
//! dependent features into no-ops.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};
use log::{debug, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::RwLock;

#[derive(QueryableByName, Debug)]
struct ColumnCount {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

/// Memoizes `(table, column)` existence for the lifetime of the probe.
#[derive(Debug, Default)]
pub struct SchemaProbe {
    cache: RwLock<HashMap<(String, String), bool>>,
}

impl SchemaProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_column(&self, conn: &mut PgConnection, table: &str, column: &str) -> bool {
        self.has_column_with(table, column, || {
            diesel::sql_query(
                "SELECT COUNT(*) AS count FROM information_schema.columns \
                 WHERE table_schema = current_schema() AND table_name = $1 AND column_name = $2",
            )
            .bind::<Text, _>(table)
            .bind::<Text, _>(column)
            .get_result::<ColumnCount>(conn)
            .map(|row| row.count > 0)
        })
    }

    /// Same as [`has_column`](Self::has_column) with the catalog lookup supplied by the caller.
    /// A failing lookup counts as "absent" and is cached like any other answer.
    pub fn has_column_with<E: Display>(
        &self,
        table: &str,
        column: &str,
        lookup: impl FnOnce() -> Result<bool, E>,
    ) -> bool {
        let key = (table.to_string(), column.to_string());
        if let Ok(cache) = self.cache.read() {
            if let Some(found) = cache.get(&key) {
                return *found;
            }
        }

        let found = match lookup() {
            Ok(found) => found,
            Err(e) => {
                warn!("Schema probe for {}.{} failed, treating as absent: {}", table, column, e);
                false
            }
        };
        debug!("Schema probe {}.{} -> {}", table, column, found);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, found);
        }
        found
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}

/// Optional schema pieces, resolved once when the engine starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SchemaCapabilities {
    pub point_preferences: bool,
    pub point_language: bool,
    pub user_language: bool,
    pub assignment_log: bool,
}

impl SchemaCapabilities {
    pub fn all() -> Self {
        Self {
            point_preferences: true,
            point_language: true,
            user_language: true,
            assignment_log: true,
        }
    }

    pub fn none() -> Self {
        Self {
            point_preferences: false,
            point_language: false,
            user_language: false,
            assignment_log: false,
        }
    }

    pub fn resolve(probe: &SchemaProbe, conn: &mut PgConnection) -> Self {
        Self {
            point_preferences: probe.has_column(conn, "user_point_preferences", "level"),
            point_language: probe.has_column(conn, "points", "language_id"),
            user_language: probe.has_column(conn, "users", "language_id"),
            assignment_log: probe.has_column(conn, "assignment_logs", "message"),
        }
    }

    /// Language checks only make sense when both sides carry a language.
    pub fn language(&self) -> bool {
        self.point_language && self.user_language
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_probe_memoizes_answer() {
        let probe = SchemaProbe::new();
        let calls = Cell::new(0);
        let lookup = || {
            calls.set(calls.get() + 1);
            Ok::<_, String>(true)
        };

        assert!(probe.has_column_with("points", "language_id", lookup));
        assert!(probe.has_column_with("points", "language_id", lookup));
        assert_eq!(calls.get(), 1);
        assert_eq!(probe.cached_entries(), 1);
    }

    #[test]
    fn test_probe_failure_is_absent() {
        let probe = SchemaProbe::new();
        let found = probe.has_column_with("assignment_logs", "message", || {
            Err::<bool, _>("permission denied for schema information_schema")
        });
        assert!(!found);

        // cached: a later successful lookup is never consulted
        let found = probe.has_column_with("assignment_logs", "message", || Ok::<_, String>(true));
        assert!(!found);
    }

    #[test]
    fn test_probe_keys_are_per_column() {
        let probe = SchemaProbe::new();
        assert!(probe.has_column_with("users", "language_id", || Ok::<_, String>(true)));
        assert!(!probe.has_column_with("users", "nickname", || Ok::<_, String>(false)));
        assert_eq!(probe.cached_entries(), 2);
    }

    #[test]
    fn test_language_capability_needs_both_columns() {
        let mut caps = SchemaCapabilities::all();
        assert!(caps.language());
        caps.user_language = false;
        assert!(!caps.language());
    }
}
