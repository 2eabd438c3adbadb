//! In-memory fixture backend
//!
//! The facade's second variant: serves canned rows instead of touching a
//! database. Used in mock mode and by handler tests. Fixtures are keyed by
//! exact statement SQL; an unregistered read yields an empty result set,
//! the same non-error shape a live query with no matches produces.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::catalog;
use crate::error::Result;
use crate::facade::DataAccess;
use crate::row::Row;
use crate::statement::Statement;

/// Fixture-backed implementation of [`DataAccess`].
pub struct FixtureBackend {
    reads: HashMap<String, Vec<Row>>,
    affected: HashMap<String, u64>,
    default_affected: u64,
    healthy: AtomicBool,
    /// SQL of every mutate call, in order. Test support.
    executed_writes: Mutex<Vec<String>>,
}

impl FixtureBackend {
    /// An empty, healthy fixture: reads return nothing, writes report one
    /// affected row.
    pub fn new() -> Self {
        Self {
            reads: HashMap::new(),
            affected: HashMap::new(),
            default_affected: 1,
            healthy: AtomicBool::new(true),
            executed_writes: Mutex::new(Vec::new()),
        }
    }

    /// The fixture served in mock mode: sample projects and releases plus
    /// the canned dashboard statistics the superseded stub revision of the
    /// backend returned.
    pub fn seeded() -> Self {
        use crate::value::Value;

        let demo_projects = vec![
            Row::from_pairs([
                ("PROJECT_ID", Value::from(1i64)),
                ("PROJECT_NAME", Value::from("Atlas Payments")),
            ]),
            Row::from_pairs([
                ("PROJECT_ID", Value::from(2i64)),
                ("PROJECT_NAME", Value::from("Phoenix Core Banking")),
            ]),
            Row::from_pairs([
                ("PROJECT_ID", Value::from(3i64)),
                ("PROJECT_NAME", Value::from("Orion Reporting")),
            ]),
        ];

        let demo_release = |id: i64, name: &str, start: &str, end: &str, build: &str| {
            Row::from_pairs([
                ("RELEASE_ID", Value::from(id)),
                ("PROJECT_ID", Value::from(1i64)),
                ("RELEASE_NAME", Value::from(name)),
                ("RELEASE_START_DATE", Value::from(start)),
                ("RELEASE_END_DATE", Value::from(end)),
                ("BUILD_RELEASE", Value::from(build)),
                ("CONFLUENCE_PAGEID", Value::Null),
                ("CONFLUENCE_TOKEN", Value::Null),
                ("CONF_UPDATE", Value::Null),
                ("CONFTEAM_NAME", Value::Null),
                ("CONFEND_DATE", Value::Null),
            ])
        };
        let demo_releases = vec![
            demo_release(101, "2025.Q3", "2025-07-01", "2025-09-30", "B12"),
            demo_release(102, "2025.Q4", "2025-10-01", "2025-12-31", "B1"),
        ];

        let zephyr_stats = vec![Row::from_pairs([
            ("TOTAL_TEST_CASES", Value::from(245i64)),
            ("EXECUTION_RATE", Value::from(87i64)),
            ("PASS_RATE", Value::from(92i64)),
            ("OPEN_DEFECTS", Value::from(17i64)),
            ("ACTIVE_CYCLES", Value::from(3i64)),
            ("REQUIREMENTS", Value::from(156i64)),
        ])];

        let jira_stats = vec![Row::from_pairs([
            ("OPEN_ISSUES", Value::from(42i64)),
            ("IN_PROGRESS", Value::from(28i64)),
            ("RESOLVED", Value::from(134i64)),
            ("BACKLOG_ITEMS", Value::from(89i64)),
            ("SPRINT_PROGRESS", Value::from(67i64)),
            ("TEAM_VELOCITY", Value::from(45i64)),
        ])];

        Self::new()
            .with_rows(catalog::projects::list().sql(), demo_projects)
            .with_rows(catalog::releases::for_project(1).sql(), demo_releases)
            .with_rows(catalog::dashboard::zephyr_stats(1, 101).sql(), zephyr_stats)
            .with_rows(catalog::dashboard::jira_stats(1, 101).sql(), jira_stats)
    }

    /// Register canned rows for a read statement.
    pub fn with_rows(mut self, sql: &str, rows: Vec<Row>) -> Self {
        self.reads.insert(sql.to_string(), rows);
        self
    }

    /// Register the affected count reported for a write statement.
    pub fn with_affected(mut self, sql: &str, affected: u64) -> Self {
        self.affected.insert(sql.to_string(), affected);
        self
    }

    /// Flip connectivity on or off; `health_check` reports the flag.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// SQL of every write executed so far, in call order.
    pub fn executed_writes(&self) -> Vec<String> {
        self.executed_writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl DataAccess for FixtureBackend {
    async fn query_many(&self, stmt: &Statement) -> Result<Vec<Row>> {
        Ok(self.reads.get(stmt.sql()).cloned().unwrap_or_default())
    }

    async fn query_one(&self, stmt: &Statement) -> Result<Option<Row>> {
        Ok(self
            .reads
            .get(stmt.sql())
            .and_then(|rows| rows.first())
            .cloned())
    }

    async fn mutate(&self, stmt: &Statement) -> Result<u64> {
        self.executed_writes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(stmt.sql().to_string());
        Ok(self
            .affected
            .get(stmt.sql())
            .copied()
            .unwrap_or(self.default_affected))
    }

    async fn health_check(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn close(&self) {}
}
