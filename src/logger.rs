//! Event logging shared by the manager, its workers, and the console.

use anyhow::Result;
use chrono::Local;
use parking_lot::Mutex;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::thread;

use crate::queue::SyncJob;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which side of a transfer an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Pull,
    Push,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Op::Pull => "PULL",
            Op::Push => "PUSH",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Success => "SUCCESS",
            Outcome::Error => "ERROR",
        })
    }
}

pub trait EventLog: Send + Sync {
    /// One line per PULL/PUSH event, in the fixed bracketed format.
    fn transfer(&self, _job: &SyncJob, _op: Op, _outcome: Outcome, _details: &str) {}
    /// Free-form timestamped message.
    fn message(&self, _msg: &str) {}
}

pub struct NoopLogger;
impl EventLog for NoopLogger {}

/// Line-oriented text logger. Each call emits a single formatted,
/// flushed write, so concurrent writers interleave at line
/// granularity.
pub struct TextLogger {
    file: Mutex<File>,
}

impl TextLogger {
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, s: &str) {
        let mut f = self.file.lock();
        let _ = writeln!(f, "{s}");
        let _ = f.flush();
    }
}

impl EventLog for TextLogger {
    fn transfer(&self, job: &SyncJob, op: Op, outcome: Outcome, details: &str) {
        self.line(&format!(
            "[{}] [{}] [{}] [{}] [{}] [{}] [{}]",
            Local::now().format(TIMESTAMP_FORMAT),
            job.source,
            job.target,
            thread_label(),
            op,
            outcome,
            details
        ));
    }

    fn message(&self, msg: &str) {
        self.line(&format!("[{}] {}", Local::now().format(TIMESTAMP_FORMAT), msg));
    }
}

/// Worker threads are named at spawn; fall back to the opaque id for
/// anonymous threads.
fn thread_label() -> String {
    let current = thread::current();
    match current.name() {
        Some(name) => name.to_string(),
        None => format!("{:?}", current.id()),
    }
}
