use anyhow::{Context, Result};
use clap::Parser;
use std::net::TcpListener;
use std::sync::Arc;

use dirsync::cli::ManagerOpts;
use dirsync::config;
use dirsync::logger::{EventLog, TextLogger};
use dirsync::manager::{AddStatus, Manager};
use dirsync::pool::WorkerPool;
use dirsync::queue::JobQueue;
use dirsync::registry::SyncRegistry;
use dirsync::shutdown::ShutdownToken;

fn main() -> Result<()> {
    let opts = ManagerOpts::parse();

    let log: Arc<dyn EventLog> = Arc::new(
        TextLogger::create(&opts.logfile)
            .with_context(|| format!("open log file {}", opts.logfile.display()))?,
    );
    let registry = Arc::new(SyncRegistry::new());
    let queue = Arc::new(JobQueue::new(opts.queue_capacity as usize));
    let pool = WorkerPool::start(
        opts.workers as usize,
        Arc::clone(&queue),
        Arc::clone(&registry),
        Arc::clone(&log),
    )?;

    let token = ShutdownToken::new();
    let manager = Arc::new(Manager::new(registry, queue, Arc::clone(&log), token.clone()));

    let listener = TcpListener::bind(("0.0.0.0", opts.port))
        .with_context(|| format!("bind console port {}", opts.port))?;

    {
        let token = token.clone();
        ctrlc::set_handler(move || token.trigger()).context("install signal handler")?;
    }

    log.message(&format!(
        "manager initialized on port {} with {} workers",
        opts.port, opts.workers
    ));

    // Every config line is an `add` submitted at startup.
    for pair in config::load(&opts.config)? {
        match manager.add(&pair.source, &pair.target) {
            AddStatus::Added { enqueued } => {
                println!("Loaded sync pair {} -> {} ({enqueued} files)", pair.source, pair.target);
            }
            AddStatus::Duplicate => println!("Sync pair already exists: {}", pair.source),
            AddStatus::ShuttingDown => {}
            AddStatus::Failed(e) => {
                eprintln!("Failed to start sync {} -> {}: {e}", pair.source, pair.target);
            }
        }
    }
    println!("{}", manager.status_report());
    println!("manager listening on port {}", opts.port);

    manager.serve(listener)?;

    let abandoned = pool.shutdown();
    if abandoned > 0 {
        log.message(&format!("Abandoned {abandoned} queued jobs."));
    }
    log.message("Manager shutdown complete.");
    Ok(())
}
