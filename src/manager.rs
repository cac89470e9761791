//! Manager runtime: the registry, the job queue, and the console
//! command dispatcher.
//!
//! A console session is one TCP connection speaking newline-terminated
//! commands: `add <src> <dst>`, `cancel <src>`, `status`, `shutdown`.
//! `add` enumerates the source directory over LIST and enqueues one
//! job per file; with a bounded queue this blocks the session on a
//! large directory, which is the intended backpressure.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::logger::EventLog;
use crate::protocol;
use crate::queue::{JobQueue, QueueError, SyncJob};
use crate::registry::{AddOutcome, SyncRegistry};
use crate::shutdown::ShutdownToken;
use crate::spec::DirSpec;

/// How an `add` request fared; the dispatcher maps this to a reply.
#[derive(Debug, PartialEq, Eq)]
pub enum AddStatus {
    Added { enqueued: usize },
    Duplicate,
    ShuttingDown,
    Failed(String),
}

pub struct Manager {
    registry: Arc<SyncRegistry>,
    queue: Arc<JobQueue>,
    log: Arc<dyn EventLog>,
    shutdown: ShutdownToken,
}

impl Manager {
    pub fn new(
        registry: Arc<SyncRegistry>,
        queue: Arc<JobQueue>,
        log: Arc<dyn EventLog>,
        shutdown: ShutdownToken,
    ) -> Self {
        Self {
            registry,
            queue,
            log,
            shutdown,
        }
    }

    pub fn registry(&self) -> &Arc<SyncRegistry> {
        &self.registry
    }

    pub fn shutdown_token(&self) -> &ShutdownToken {
        &self.shutdown
    }

    /// Register a pair and enqueue one job per file at the source.
    pub fn add(&self, source: &DirSpec, target: &DirSpec) -> AddStatus {
        match self.registry.add(source.clone(), target.clone()) {
            AddOutcome::Duplicate => {
                self.log.message(&format!("Already in queue: {source}"));
                return AddStatus::Duplicate;
            }
            AddOutcome::Added | AddOutcome::Reactivated => {}
        }
        let status = self.sync_directory(source, target);
        if let AddStatus::Added { .. } = status {
            self.log
                .message(&format!("Started sync: {source} -> {target}"));
        }
        status
    }

    fn sync_directory(&self, source: &DirSpec, target: &DirSpec) -> AddStatus {
        let files = match enumerate_source(source) {
            Ok(files) => files,
            Err(e) => {
                self.log
                    .message(&format!("Failed to start sync for {source}: {e:#}"));
                return AddStatus::Failed(format!("{e:#}"));
            }
        };
        let mut enqueued = 0;
        for filename in files {
            let job = SyncJob {
                source: source.clone(),
                target: target.clone(),
                filename: filename.clone(),
            };
            match self.queue.enqueue(job) {
                Ok(()) => {
                    enqueued += 1;
                    self.log.message(&format!(
                        "Added file: {}/{}@{}:{} -> {}/{}@{}:{}",
                        source.dir,
                        filename,
                        source.host,
                        source.port,
                        target.dir,
                        filename,
                        target.host,
                        target.port
                    ));
                }
                Err(QueueError::ShuttingDown) => return AddStatus::ShuttingDown,
            }
        }
        AddStatus::Added { enqueued }
    }

    /// Deactivate a pair. In-flight and already-enqueued jobs are
    /// unaffected; only future `add`s notice.
    pub fn cancel(&self, source: &DirSpec) -> bool {
        if self.registry.deactivate(source) {
            self.log
                .message(&format!("Synchronization stopped for {source}"));
            true
        } else {
            self.log
                .message(&format!("Directory not being synchronized: {source}"));
            false
        }
    }

    /// Human-readable snapshot of every pair.
    pub fn status_report(&self) -> String {
        let pairs = self.registry.snapshot();
        let mut out = format!("=== Sync pairs (count: {}) ===\n", pairs.len());
        for (i, pair) in pairs.iter().enumerate() {
            out.push_str(&format!(
                "{}. Source: {}\n   Target: {}\n   Active: {}, Last Sync: {}, Errors: {}\n",
                i + 1,
                pair.source,
                pair.target,
                if pair.active { "Yes" } else { "No" },
                pair.last_sync.format(crate::logger::TIMESTAMP_FORMAT),
                pair.error_count
            ));
        }
        if pairs.is_empty() {
            out.push_str("No sync pairs configured.\n");
        }
        out
    }

    /// Trigger process shutdown: stop admitting work and wake every
    /// blocked party. In-flight transfers run to completion.
    pub fn request_shutdown(&self) {
        self.log.message("Shutting down manager...");
        self.log.message("Waiting for all active workers to finish.");
        self.queue.signal_shutdown();
        self.shutdown.trigger();
    }

    /// Dispatch one console line. Returns the reply and whether the
    /// session should close.
    pub fn dispatch(&self, line: &str) -> (String, bool) {
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();
        match (cmd, args.as_slice()) {
            ("add", [source, target]) => {
                let reply = match (DirSpec::parse(source), DirSpec::parse(target)) {
                    (Ok(src), Ok(dst)) => match self.add(&src, &dst) {
                        AddStatus::Added { .. } => "Added sync pair successfully\n".to_string(),
                        AddStatus::Duplicate => format!("Already in queue: {source}\n"),
                        AddStatus::ShuttingDown => "Manager is shutting down\n".to_string(),
                        AddStatus::Failed(_) => "Error adding sync pair\n".to_string(),
                    },
                    _ => "Error adding sync pair\n".to_string(),
                };
                (reply, false)
            }
            ("cancel", [source]) => {
                let reply = match DirSpec::parse(source) {
                    Ok(src) => {
                        if self.cancel(&src) {
                            format!("Synchronization stopped for {source}\n")
                        } else {
                            format!("Directory not being synchronized: {source}\n")
                        }
                    }
                    Err(_) => "Error canceling synchronization\n".to_string(),
                };
                (reply, false)
            }
            ("status", []) => (self.status_report(), false),
            ("shutdown", []) => {
                self.request_shutdown();
                ("Shutting down manager...\n".to_string(), true)
            }
            _ => (format!("Invalid command: {line}\n"), false),
        }
    }

    /// One console session: read command lines, write replies, until
    /// EOF, `shutdown`, or the token trips. Reads poll with a short
    /// timeout so a quiet session notices shutdown.
    pub fn run_console_session(&self, stream: TcpStream) -> Result<()> {
        stream
            .set_read_timeout(Some(Duration::from_secs(1)))
            .context("set console read timeout")?;
        let mut writer = stream.try_clone().context("clone console stream")?;
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        loop {
            if self.shutdown.is_triggered() {
                return Ok(());
            }
            match reader.read_line(&mut line) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    let trimmed = line.trim();
                    if !trimmed.is_empty() {
                        let (reply, close) = self.dispatch(trimmed);
                        writer
                            .write_all(reply.as_bytes())
                            .context("send console reply")?;
                        if close {
                            return Ok(());
                        }
                    }
                    line.clear();
                }
                // Timeout: keep any partial line and re-check the token.
                Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
                Err(e) => return Err(e).context("read console command"),
            }
        }
    }

    /// Accept loop for console sessions. One ephemeral thread per
    /// session. Exits when the shutdown token trips (the token wakes
    /// this loop with a loopback connection).
    pub fn serve(self: &Arc<Self>, listener: TcpListener) -> Result<()> {
        self.shutdown
            .set_wake_addr(listener.local_addr().context("listener local addr")?);
        let mut sessions = Vec::new();
        for conn in listener.incoming() {
            if self.shutdown.is_triggered() {
                break;
            }
            match conn {
                Ok(stream) => {
                    let peer = stream
                        .peer_addr()
                        .map(|a| a.to_string())
                        .unwrap_or_else(|_| "unknown".to_string());
                    eprintln!("console connected from {peer}");
                    let manager = Arc::clone(self);
                    let handle = thread::Builder::new()
                        .name("console-session".to_string())
                        .spawn(move || {
                            if let Err(e) = manager.run_console_session(stream) {
                                eprintln!("console session error from {peer}: {e:#}");
                            }
                        })
                        .context("spawn console session")?;
                    sessions.push(handle);
                }
                Err(e) => {
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    eprintln!("accept error: {e}");
                }
            }
        }
        for session in sessions {
            let _ = session.join();
        }
        Ok(())
    }
}

/// Fetch the source directory's file list over LIST, accumulating
/// across reads until the `.` sentinel arrives. The reply is never
/// capped at a single read.
fn enumerate_source(source: &DirSpec) -> Result<Vec<String>> {
    let mut stream = TcpStream::connect(source.addr())
        .with_context(|| format!("connect to source {}", source.addr()))?;
    stream
        .write_all(format!("{} {}\n", protocol::CMD_LIST, source.dir).as_bytes())
        .context("send LIST")?;

    let mut reply = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).context("read LIST reply")?;
        if n == 0 {
            bail!("listing of {} truncated: connection closed before sentinel", source);
        }
        reply.extend_from_slice(&chunk[..n]);
        if protocol::listing_complete(&reply) {
            break;
        }
    }
    Ok(protocol::parse_listing(&reply))
}
