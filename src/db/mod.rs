//! SQLite-backed run history behind a dedicated worker thread.
//!
//! rusqlite connections are not `Sync`, so a single owner thread services
//! requests from an mpsc channel and answers through oneshot replies. The
//! store keeps the 50 most recent runs; older rows are deleted on append.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use log::{error, info};
use rusqlite::{params, Connection};
use tokio::sync::oneshot;

mod migrations;

use crate::models::RunRecord;
use migrations::run_migrations;

/// Persisted history keeps only this many most-recent runs.
pub const HISTORY_CAPACITY: usize = 50;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| anyhow!("invalid datetime '{value}': {err}"))
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("runflow-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(
                            Err(anyhow::Error::new(err).context("failed to open SQLite database")),
                        );
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    error!("Failed to enable WAL mode: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => {
                            task(&mut conn);
                        }
                        DbCommand::Shutdown => break,
                    }
                }

                info!("Database thread shutting down");
            })
            .with_context(|| "failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        info!("Database initialized at {}", db_path.as_path().display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }

    /// Append a run summary and trim history to the capacity bound in one
    /// transaction, oldest rows first.
    pub async fn append_run_record(&self, record: &RunRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO runs (id, date, distance_km, elapsed_ms, pace_label)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    record.date.to_rfc3339(),
                    record.distance_km,
                    record.elapsed_ms as i64,
                    record.pace_label,
                ],
            )
            .with_context(|| "failed to insert run record")?;
            tx.execute(
                "DELETE FROM runs
                 WHERE id NOT IN (
                     SELECT id FROM runs ORDER BY date DESC LIMIT ?1
                 )",
                params![HISTORY_CAPACITY as i64],
            )
            .with_context(|| "failed to trim run history")?;
            tx.commit().with_context(|| "failed to commit run record")?;
            Ok(())
        })
        .await
    }

    /// All persisted runs, newest first.
    pub async fn list_runs(&self) -> Result<Vec<RunRecord>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, date, distance_km, elapsed_ms, pace_label
                 FROM runs
                 ORDER BY date DESC",
            )?;

            let mut rows = stmt.query([])?;
            let mut runs = Vec::new();
            while let Some(row) = rows.next()? {
                runs.push(RunRecord {
                    id: row.get(0)?,
                    date: parse_datetime(&row.get::<_, String>(1)?)?,
                    distance_km: row.get(2)?,
                    elapsed_ms: row.get::<_, i64>(3)?.max(0) as u64,
                    pace_label: row.get(4)?,
                });
            }

            Ok(runs)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(n: i64) -> RunRecord {
        RunRecord {
            id: format!("run-{n}"),
            date: Utc::now() + Duration::seconds(n),
            distance_km: n as f64 / 10.0,
            elapsed_ms: 60_000 * n as u64,
            pace_label: "5:00".to_string(),
        }
    }

    #[tokio::test]
    async fn append_and_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("runs.sqlite3")).unwrap();

        db.append_run_record(&record(1)).await.unwrap();
        db.append_run_record(&record(2)).await.unwrap();

        let runs = db.list_runs().await.unwrap();
        assert_eq!(runs.len(), 2);
        // newest first
        assert_eq!(runs[0].id, "run-2");
        assert_eq!(runs[1].id, "run-1");
        assert!((runs[0].distance_km - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn fifty_first_append_evicts_oldest() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("runs.sqlite3")).unwrap();

        for n in 1..=51 {
            db.append_run_record(&record(n)).await.unwrap();
        }

        let runs = db.list_runs().await.unwrap();
        assert_eq!(runs.len(), HISTORY_CAPACITY);
        assert_eq!(runs.first().unwrap().id, "run-51");
        assert_eq!(runs.last().unwrap().id, "run-2");
        assert!(!runs.iter().any(|r| r.id == "run-1"));
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.sqlite3");
        {
            let db = Database::new(path.clone()).unwrap();
            db.append_run_record(&record(7)).await.unwrap();
        }
        let db = Database::new(path).unwrap();
        let runs = db.list_runs().await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, "run-7");
    }
}
