//! SQLite-backed record store.
//!
//! A dedicated worker thread owns the only connection; callers submit
//! closures through [`Database::execute`] and await the result over a
//! oneshot channel. Serializing every read and write through one thread is
//! what makes the summary-store increments race-free: there is no
//! interleaving between the statements of two concurrent recordings.
//!
//! Entity operations live in `repositories/` as `impl Database` blocks.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use rusqlite::Connection;
use tokio::sync::oneshot;

pub mod helpers;
mod migrations;
pub mod models;
mod repositories;

use migrations::run_migrations;

type StoreTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum StoreCommand {
    Run(StoreTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<StoreCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(StoreCommand::Shutdown) {
                error!("Failed to send shutdown to store worker: {err}");
            }
            if let Err(join_err) = handle.join() {
                error!("Failed to join store worker: {join_err:?}");
            }
        }
    }
}

/// Cloneable handle to the store worker. Injected into the recorder, the
/// aggregation engine and the backfill job rather than reached through a
/// global.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<Option<PathBuf>>,
}

impl Database {
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let path_for_thread = db_path.clone();
        let db = Self::spawn_worker(Some(db_path), move || {
            Connection::open(&path_for_thread).context("failed to open SQLite database")
        })?;

        if let Some(path) = db.path() {
            info!("Store initialized at {}", path.display());
        }

        Ok(db)
    }

    /// In-memory store with the same schema. Data lives as long as the
    /// handle; used by tests and throwaway embedders.
    pub fn open_in_memory() -> Result<Self> {
        Self::spawn_worker(None, || {
            Connection::open_in_memory().context("failed to open in-memory database")
        })
    }

    fn spawn_worker(
        db_path: Option<PathBuf>,
        open: impl FnOnce() -> Result<Connection> + Send + 'static,
    ) -> Result<Self> {
        let (command_tx, command_rx) = mpsc::channel::<StoreCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("studylog-store".into())
            .spawn(move || {
                let mut conn = match open() {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    warn!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    warn!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run schema migrations");
                if ready_tx.send(init_result).is_err() {
                    error!("Store initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        StoreCommand::Run(task) => task(&mut conn),
                        StoreCommand::Shutdown => break,
                    }
                }

                info!("Store worker shutting down");
            })
            .context("failed to spawn store worker thread")?;

        ready_rx
            .recv()
            .context("store worker exited before signaling readiness")??;

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    pub(crate) async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = StoreCommand::Run(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                error!("Store caller dropped before receiving result");
            }
        }));

        self.inner
            .sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to store worker: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("store worker terminated unexpectedly"))?
    }
}
