//! Fixed-size worker pool draining the shared job queue.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::logger::EventLog;
use crate::queue::JobQueue;
use crate::registry::SyncRegistry;
use crate::transfer;

pub struct WorkerPool {
    queue: Arc<JobQueue>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Launch `worker_count` named threads, each looping
    /// dequeue → execute until the queue reports closed.
    pub fn start(
        worker_count: usize,
        queue: Arc<JobQueue>,
        registry: Arc<SyncRegistry>,
        log: Arc<dyn EventLog>,
    ) -> Result<Self> {
        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            let queue = Arc::clone(&queue);
            let registry = Arc::clone(&registry);
            let log = Arc::clone(&log);
            let handle = thread::Builder::new()
                .name(format!("sync-worker-{i}"))
                .spawn(move || worker_loop(queue, registry, log))
                .with_context(|| format!("spawn worker {i}"))?;
            workers.push(handle);
        }
        Ok(Self { queue, workers })
    }

    pub fn queue(&self) -> &Arc<JobQueue> {
        &self.queue
    }

    /// Signal shutdown, join every worker (each finishes its in-flight
    /// job first), then drain residual queue entries. Returns how many
    /// queued jobs were abandoned.
    pub fn shutdown(mut self) -> usize {
        self.queue.signal_shutdown();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        self.queue.drain()
    }
}

fn worker_loop(queue: Arc<JobQueue>, registry: Arc<SyncRegistry>, log: Arc<dyn EventLog>) {
    while let Some(job) = queue.dequeue() {
        // A failing transfer never takes the worker down; the error is
        // already logged against the job by the executor.
        match transfer::execute(&job, log.as_ref()) {
            Ok(_) => registry.touch(&job.source),
            Err(_) => registry.record_error(&job.source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use crate::queue::SyncJob;
    use crate::spec::DirSpec;

    fn dead_end_job(name: &str) -> SyncJob {
        SyncJob {
            source: DirSpec::new("/src", "127.0.0.1", 1),
            target: DirSpec::new("/dst", "127.0.0.1", 1),
            filename: name.into(),
        }
    }

    #[test]
    fn workers_survive_failing_jobs() {
        let queue = Arc::new(JobQueue::new(8));
        let registry = Arc::new(SyncRegistry::new());
        registry.add(
            DirSpec::new("/src", "127.0.0.1", 1),
            DirSpec::new("/dst", "127.0.0.1", 1),
        );
        let pool = WorkerPool::start(
            2,
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::new(NoopLogger),
        )
        .unwrap();

        for i in 0..6 {
            queue.enqueue(dead_end_job(&format!("f{i}"))).unwrap();
        }
        // Every job fails to connect; the pool still drains them all
        // and joins cleanly.
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        while !queue.is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let abandoned = pool.shutdown();
        assert_eq!(abandoned, 0);
        let pair = registry
            .find(&DirSpec::new("/src", "127.0.0.1", 1))
            .unwrap();
        assert_eq!(pair.error_count, 6);
    }

    #[test]
    fn shutdown_abandons_queued_jobs() {
        let queue = Arc::new(JobQueue::new(8));
        let registry = Arc::new(SyncRegistry::new());
        // No workers: everything enqueued stays queued.
        let pool = WorkerPool::start(0, Arc::clone(&queue), registry, Arc::new(NoopLogger)).unwrap();
        for i in 0..3 {
            queue.enqueue(dead_end_job(&format!("f{i}"))).unwrap();
        }
        assert_eq!(pool.shutdown(), 3);
        assert!(queue.is_empty());
    }
}
