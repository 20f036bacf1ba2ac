//! SQLite-based history log
//!
//! Separate file from the document store so it can be rotated on its own.

use crate::error::Result;
use medicare_core::{HistoryRecord, RouteSummary};
use rusqlite::{params, Connection, Row};

use std::path::Path;

pub struct HistoryLog {
    conn: Connection,
}

#[allow(clippy::result_large_err)]
impl HistoryLog {
    /// Open the history log (create if not exists)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let log = Self { conn };
        log.initialize()?;
        Ok(log)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                route TEXT NOT NULL,
                subroute TEXT NOT NULL,
                action TEXT NOT NULL,
                date TEXT NOT NULL,
                actor TEXT NOT NULL,
                summary TEXT NOT NULL
            )
            "#,
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_history_route ON history(route, subroute)",
            [],
        )?;

        Ok(())
    }

    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO history (route, subroute, action, date, actor, summary)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                record.route,
                record.subroute,
                record.action,
                record.date,
                serde_json::to_string(&record.actor)?,
                record.summary,
            ],
        )?;
        Ok(())
    }

    /// Every record, oldest first
    pub fn all(&self) -> Result<Vec<HistoryRecord>> {
        self.query(
            "SELECT route, subroute, action, date, actor, summary FROM history ORDER BY id",
            &[],
        )
    }

    pub fn by_route(&self, route: &str) -> Result<Vec<HistoryRecord>> {
        self.query(
            "SELECT route, subroute, action, date, actor, summary FROM history
             WHERE route = ?1 ORDER BY id",
            &[&route],
        )
    }

    pub fn by_route_and_subroute(&self, route: &str, subroute: &str) -> Result<Vec<HistoryRecord>> {
        self.query(
            "SELECT route, subroute, action, date, actor, summary FROM history
             WHERE route = ?1 AND subroute = ?2 ORDER BY id",
            &[&route, &subroute],
        )
    }

    /// Distinct routes with their subroutes, in first-seen order.
    pub fn routes(&self) -> Result<Vec<RouteSummary>> {
        let mut stmt = self
            .conn
            .prepare("SELECT route, subroute FROM history ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut routes: Vec<RouteSummary> = Vec::new();
        for row in rows {
            let (route, subroute) = row?;
            let index = match routes.iter().position(|r| r.name == route) {
                Some(index) => index,
                None => {
                    routes.push(RouteSummary {
                        name: route,
                        subroutes: Vec::new(),
                    });
                    routes.len() - 1
                }
            };
            let summary = &mut routes[index];
            if !subroute.is_empty() && !summary.subroutes.contains(&subroute) {
                summary.subroutes.push(subroute);
            }
        }

        Ok(routes)
    }

    fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<HistoryRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(args, read_row)?;

        let mut records = Vec::new();
        for row in rows {
            let (record, actor) = row?;
            records.push(HistoryRecord {
                actor: serde_json::from_str(&actor)?,
                ..record
            });
        }
        Ok(records)
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<(HistoryRecord, String)> {
    Ok((
        HistoryRecord {
            route: row.get(0)?,
            subroute: row.get(1)?,
            action: row.get(2)?,
            date: row.get(3)?,
            actor: serde_json::Value::Null,
            summary: row.get(5)?,
        },
        row.get(4)?,
    ))
}
