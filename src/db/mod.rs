//! SQLite implementation of the backend contract.
//!
//! All statements run on one dedicated worker thread that owns the
//! connection; async callers hand it closures and await the reply.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::oneshot;

mod backend;
mod helpers;
mod migrations;
pub mod policy;
mod repositories;

pub use backend::LocalBackend;
pub use policy::PolicyError;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Pragmas applied to every connection before migrations run.
const CONNECTION_PRAGMAS: [(&str, &str); 2] = [("journal_mode", "WAL"), ("foreign_keys", "ON")];

/// Owns the worker thread. Closing `tasks` ends the worker's receive loop,
/// so dropping the last handle drains queued work before the join.
struct Worker {
    tasks: Option<mpsc::Sender<DbTask>>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn submit(&self, task: DbTask) -> Result<()> {
        let tasks = self
            .tasks
            .as_ref()
            .ok_or_else(|| anyhow!("database worker already stopped"))?;
        tasks
            .send(task)
            .map_err(|_| anyhow!("database worker is no longer running"))
    }

    /// Body of the worker thread: open, prepare, report readiness, serve.
    fn serve<F>(open: F, ready: mpsc::Sender<Result<()>>, tasks: mpsc::Receiver<DbTask>)
    where
        F: FnOnce() -> rusqlite::Result<Connection>,
    {
        let mut conn = match open().context("failed to open SQLite database") {
            Ok(conn) => conn,
            Err(err) => {
                let _ = ready.send(Err(err));
                return;
            }
        };

        for (pragma, value) in CONNECTION_PRAGMAS {
            if let Err(err) = conn.pragma_update(None, pragma, value) {
                error!("Failed to set {pragma}={value}: {err}");
            }
        }

        let prepared = migrations::run_migrations(&mut conn);
        let healthy = prepared.is_ok();
        if ready.send(prepared).is_err() || !healthy {
            return;
        }

        for task in tasks {
            task(&mut conn);
        }
        info!("Database worker stopped");
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.tasks = None;
        let Some(thread) = self.thread.take() else {
            return;
        };
        if thread.join().is_err() {
            error!("Database worker panicked");
        }
    }
}

#[derive(Clone)]
pub struct Database {
    worker: Arc<Worker>,
    db_path: Option<Arc<PathBuf>>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let path_for_thread = db_path.clone();
        let worker = Self::spawn(move || Connection::open(&path_for_thread))?;
        info!("Database initialized at {}", db_path.display());

        Ok(Self {
            worker,
            db_path: Some(Arc::new(db_path)),
        })
    }

    /// Private database that disappears with the last clone.
    pub fn in_memory() -> Result<Self> {
        let worker = Self::spawn(Connection::open_in_memory)?;
        info!("In-memory database initialized");
        Ok(Self {
            worker,
            db_path: None,
        })
    }

    /// Starts the worker and waits until its schema is current.
    fn spawn<F>(open: F) -> Result<Arc<Worker>>
    where
        F: FnOnce() -> rusqlite::Result<Connection> + Send + 'static,
    {
        let (task_tx, task_rx) = mpsc::channel::<DbTask>();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = thread::Builder::new()
            .name("fitsocial-db".into())
            .spawn(move || Worker::serve(open, ready_tx, task_rx))
            .context("failed to spawn database worker thread")?;
        let worker = Worker {
            tasks: Some(task_tx),
            thread: Some(thread),
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Arc::new(worker)),
            Ok(Err(err)) => Err(err.context("failed to prepare database")),
            Err(_) => Err(anyhow!("database worker exited before it was ready")),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref().map(PathBuf::as_path)
    }

    /// Runs `task` against the connection on the worker thread.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.worker.submit(Box::new(move |conn| {
            // The caller may have given up waiting; nothing to report then.
            let _ = reply_tx.send(task(conn));
        }))?;

        reply_rx
            .await
            .unwrap_or_else(|_| Err(anyhow!("database worker dropped the request")))
    }
}
