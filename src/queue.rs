//! Bounded FIFO of sync jobs with blocking producers and consumers.
//!
//! Producers wait while the queue is full, consumers wait while it is
//! empty; both conditions are re-checked in a loop against the
//! shutdown flag. After shutdown, `enqueue` fails and `dequeue`
//! returns `None` immediately, leaving any residual jobs for the
//! owner's drain.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use thiserror::Error;

use crate::spec::DirSpec;

/// One file to copy, snapshotted from a pair at enumeration time.
/// A job owns its endpoint copies, so deactivating the pair after
/// enqueue does not cancel the job.
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub source: DirSpec,
    pub target: DirSpec,
    pub filename: String,
}

impl SyncJob {
    pub fn source_path(&self) -> String {
        format!("{}/{}", self.source.dir, self.filename)
    }

    pub fn target_path(&self) -> String {
        format!("{}/{}", self.target.dir, self.filename)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is shutting down")]
    ShuttingDown,
}

struct Inner {
    jobs: VecDeque<SyncJob>,
    shutdown: bool,
}

pub struct JobQueue {
    inner: Mutex<Inner>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0);
        Self {
            inner: Mutex::new(Inner {
                jobs: VecDeque::with_capacity(capacity),
                shutdown: false,
            }),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Append a job, blocking while the queue is full. Fails once
    /// shutdown has been signaled, including while blocked.
    pub fn enqueue(&self, job: SyncJob) -> Result<(), QueueError> {
        let mut inner = self.inner.lock();
        while inner.jobs.len() >= self.capacity && !inner.shutdown {
            self.not_full.wait(&mut inner);
        }
        if inner.shutdown {
            return Err(QueueError::ShuttingDown);
        }
        inner.jobs.push_back(job);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Take the head job, blocking while the queue is empty. Returns
    /// `None` once shutdown has been signaled; jobs still queued at
    /// that point are abandoned to the owner's drain.
    pub fn dequeue(&self) -> Option<SyncJob> {
        let mut inner = self.inner.lock();
        while inner.jobs.is_empty() && !inner.shutdown {
            self.not_empty.wait(&mut inner);
        }
        if inner.shutdown {
            return None;
        }
        let job = inner.jobs.pop_front();
        self.not_full.notify_one();
        job
    }

    /// Set the monotone shutdown flag and wake every blocked party.
    pub fn signal_shutdown(&self) {
        let mut inner = self.inner.lock();
        inner.shutdown = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Discard residual jobs, returning how many were abandoned.
    /// Called by the pool after every worker has exited.
    pub fn drain(&self) -> usize {
        let mut inner = self.inner.lock();
        let abandoned = inner.jobs.len();
        inner.jobs.clear();
        abandoned
    }

    pub fn len(&self) -> usize {
        self.inner.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().jobs.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
