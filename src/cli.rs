//! Command-line interfaces for the three binaries.

use clap::Parser;
use std::path::PathBuf;

/// Manager daemon options.
#[derive(Debug, Parser)]
#[command(name = "dirsyncd", about = "Directory synchronization manager")]
pub struct ManagerOpts {
    /// Manager log file
    #[arg(short = 'l', value_name = "FILE")]
    pub logfile: PathBuf,

    /// Sync-pair config file, one `<source> <target>` pair per line
    #[arg(short = 'c', value_name = "FILE")]
    pub config: PathBuf,

    /// Worker thread count
    #[arg(short = 'n', value_name = "COUNT", value_parser = clap::value_parser!(u16).range(1..))]
    pub workers: u16,

    /// Console control port
    #[arg(short = 'p', value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Job queue capacity
    #[arg(short = 'b', value_name = "SIZE", value_parser = clap::value_parser!(u16).range(1..))]
    pub queue_capacity: u16,
}

/// File-server options.
#[derive(Debug, Parser)]
#[command(name = "dirsyncfs", about = "Directory synchronization file server")]
pub struct FileServerOpts {
    /// Listen port
    #[arg(short = 'p', value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,
}

/// Console options. `-h` is the manager host, so the help flag is
/// long-only.
#[derive(Debug, Parser)]
#[command(
    name = "dirsynctl",
    about = "Interactive console for the synchronization manager",
    disable_help_flag = true
)]
pub struct ConsoleOpts {
    /// Console log file
    #[arg(short = 'l', value_name = "FILE")]
    pub logfile: PathBuf,

    /// Manager host
    #[arg(short = 'h', value_name = "HOST")]
    pub host: String,

    /// Manager port
    #[arg(short = 'p', value_name = "PORT", value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    pub help: Option<bool>,
}
