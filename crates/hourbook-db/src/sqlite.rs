//! SQLite-backed event and scoreboard store.

use async_trait::async_trait;
use hourbook_core::error::{HourbookError, Result};
use hourbook_core::traits::{EventStore, ScoreStore};
use hourbook_core::types::{
    Category, DateRange, EventKey, EventRecord, MessageId, RankedScore, StoredEvent, UserId,
};
use rusqlite::{Connection, ErrorCode, params};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// One connection behind a mutex; queries run on the blocking pool.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database file and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(sql_error)?;
        tracing::info!("🗄️ Opened event database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory().map_err(sql_error)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| HourbookError::Persistence(format!("connection poisoned: {e}")))?;
            op(&conn).map_err(sql_error)
        })
        .await
        .map_err(|e| HourbookError::Persistence(format!("query task failed: {e}")))?
    }

    /// Total number of stored assignments.
    pub async fn count_events(&self) -> Result<usize> {
        self.run(|conn| {
            conn.query_row("SELECT COUNT(*) FROM events", [], |r| r.get::<_, i64>(0))
                .map(|n| n as usize)
        })
        .await
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- One row per gardener assignment
        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            category TEXT NOT NULL,
            name TEXT NOT NULL,
            time INTEGER NOT NULL,          -- unix seconds
            hours INTEGER NOT NULL,
            gardener INTEGER NOT NULL,
            artifact_id INTEGER UNIQUE,     -- announcement message, NULL for manual entries
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_events_gardener_time ON events(gardener, time);
        CREATE INDEX IF NOT EXISTS idx_events_category_time ON events(category, time);

        -- Prediction scores per member and game
        CREATE TABLE IF NOT EXISTS scoreboard (
            member INTEGER NOT NULL,
            game TEXT NOT NULL,
            score INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (member, game)
        );
        ",
    )
    .map_err(sql_error)
}

const ARTIFACT_UNIQUE: &str = "UNIQUE constraint failed: events.artifact_id";

fn sql_error(e: rusqlite::Error) -> HourbookError {
    match &e {
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == ErrorCode::ConstraintViolation && msg.contains(ARTIFACT_UNIQUE) =>
        {
            HourbookError::Conflict("This message has been processed for signups".into())
        }
        _ => HourbookError::Persistence(e.to_string()),
    }
}

type EventRow = (i64, String, String, i64, i64, i64, Option<i64>);

const EVENT_COLUMNS: &str = "id, category, name, time, hours, gardener, artifact_id";

fn read_event_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
    ))
}

fn to_stored(row: EventRow) -> Result<StoredEvent> {
    let (id, category, name, time, hours, gardener, artifact) = row;
    let category: Category = category
        .parse()
        .map_err(|_| HourbookError::Persistence(format!("event {id} has unknown category '{category}'")))?;
    let hours = u32::try_from(hours)
        .map_err(|_| HourbookError::Persistence(format!("event {id} has invalid hours {hours}")))?;
    Ok(StoredEvent {
        id,
        record: EventRecord {
            category,
            name,
            scheduled_time: time,
            duration_hours: hours,
        },
        assignee: UserId(gardener as u64),
        artifact: artifact.map(|a| MessageId(a as u64)),
    })
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn create_event(
        &self,
        record: &EventRecord,
        assignee: UserId,
        artifact: Option<MessageId>,
    ) -> Result<i64> {
        let record = record.clone();
        let created_at = chrono::Utc::now().to_rfc3339();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO events (category, name, time, hours, gardener, artifact_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.category.token(),
                    record.name,
                    record.scheduled_time,
                    record.duration_hours as i64,
                    assignee.0 as i64,
                    artifact.map(|a| a.0 as i64),
                    created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn delete_event(&self, key: &EventKey) -> Result<usize> {
        let key = key.clone();
        self.run(move |conn| match key {
            EventKey::Artifact(id) => conn.execute(
                "DELETE FROM events WHERE artifact_id = ?1",
                params![id.0 as i64],
            ),
            // Rows keyed by another announcement are never matched by content.
            EventKey::Record(record) => conn.execute(
                "DELETE FROM events WHERE id = (
                     SELECT id FROM events
                     WHERE artifact_id IS NULL
                       AND category = ?1 AND name = ?2 AND time = ?3 AND hours = ?4
                     ORDER BY id LIMIT 1
                 )",
                params![
                    record.category.token(),
                    record.name,
                    record.scheduled_time,
                    record.duration_hours as i64,
                ],
            ),
        })
        .await
    }

    async fn events_for_identity(&self, id: UserId, range: DateRange) -> Result<Vec<StoredEvent>> {
        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE gardener = ?1 AND time >= ?2 AND time < ?3
                     ORDER BY time, id"
                ))?;
                let rows = stmt
                    .query_map(params![id.0 as i64, range.start, range.end], read_event_row)?
                    .collect::<rusqlite::Result<Vec<_>>>();
                rows
            })
            .await?;
        rows.into_iter().map(to_stored).collect()
    }

    async fn events_for_category(
        &self,
        category: Category,
        range: DateRange,
    ) -> Result<Vec<StoredEvent>> {
        let rows = self
            .run(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {EVENT_COLUMNS} FROM events
                     WHERE category = ?1 AND time >= ?2 AND time < ?3
                     ORDER BY time, id"
                ))?;
                let rows = stmt
                    .query_map(params![category.token(), range.start, range.end], read_event_row)?
                    .collect::<rusqlite::Result<Vec<_>>>();
                rows
            })
            .await?;
        rows.into_iter().map(to_stored).collect()
    }
}

#[async_trait]
impl ScoreStore for SqliteStore {
    async fn leaderboard(&self, game: Option<Category>) -> Result<Vec<RankedScore>> {
        let rows = self
            .run(move |conn| {
                let read = |row: &rusqlite::Row<'_>| -> rusqlite::Result<(i64, i64, i64)> {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                };
                match game {
                    Some(game) => {
                        let mut stmt = conn.prepare(
                            "SELECT member, score, RANK() OVER (ORDER BY score DESC)
                             FROM scoreboard WHERE game = ?1
                             ORDER BY score DESC, member",
                        )?;
                        let rows = stmt
                            .query_map(params![game.token()], read)?
                            .collect::<rusqlite::Result<Vec<_>>>();
                        rows
                    }
                    None => {
                        let mut stmt = conn.prepare(
                            "SELECT member, SUM(score) AS total, RANK() OVER (ORDER BY SUM(score) DESC)
                             FROM scoreboard GROUP BY member
                             ORDER BY total DESC, member",
                        )?;
                        let rows = stmt
                            .query_map([], read)?
                            .collect::<rusqlite::Result<Vec<_>>>();
                        rows
                    }
                }
            })
            .await?;
        Ok(rows
            .into_iter()
            .map(|(member, score, position)| RankedScore {
                position: position as u32,
                member: UserId(member as u64),
                score,
            })
            .collect())
    }

    async fn add_score(&self, member: UserId, game: Category, delta: i64) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO scoreboard (member, game, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(member, game) DO UPDATE SET score = score + excluded.score",
                params![member.0 as i64, game.token(), delta],
            )
            .map(|_| ())
        })
        .await
    }

    async fn award(&self, members: &[UserId], game: Category, delta: i64) -> Result<usize> {
        let members: BTreeSet<UserId> = members.iter().copied().collect();
        self.run(move |conn| {
            let tx = conn.unchecked_transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO scoreboard (member, game, score) VALUES (?1, ?2, ?3)
                     ON CONFLICT(member, game) DO UPDATE SET score = score + excluded.score",
                )?;
                for member in &members {
                    stmt.execute(params![member.0 as i64, game.token(), delta])?;
                }
            }
            tx.commit()?;
            Ok(members.len())
        })
        .await
    }

    async fn reset(&self, game: Option<Category>) -> Result<usize> {
        self.run(move |conn| match game {
            Some(game) => conn.execute(
                "DELETE FROM scoreboard WHERE game = ?1",
                params![game.token()],
            ),
            None => conn.execute("DELETE FROM scoreboard", []),
        })
        .await
    }
}
