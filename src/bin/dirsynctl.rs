use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;

use dirsync::cli::ConsoleOpts;
use dirsync::logger::{EventLog, TextLogger};

const HELP: &str = "\
Available commands:
  add <source> <target>  - Add directory pair for synchronization
  cancel <source>        - Cancel synchronization for source directory
  status                 - Show configured sync pairs
  shutdown               - Shutdown the manager
  help                   - Show this help message";

/// Local sanity check before a command goes on the wire.
fn validate(line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    let cmd = parts.next().unwrap_or("");
    let argc = parts.count();
    match cmd {
        "add" if argc == 2 => Ok(()),
        "add" => bail!("Invalid add command format. Use: add <source> <target>"),
        "cancel" if argc == 1 => Ok(()),
        "cancel" => bail!("Invalid cancel command format. Use: cancel <source>"),
        "status" | "shutdown" if argc == 0 => Ok(()),
        "status" | "shutdown" => bail!("{cmd} takes no arguments"),
        other => bail!("Unknown command: {other}\nAvailable commands: add, cancel, status, shutdown"),
    }
}

fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

fn main() -> Result<()> {
    let opts = ConsoleOpts::parse();
    let log = TextLogger::create(&opts.logfile)
        .with_context(|| format!("open log file {}", opts.logfile.display()))?;

    println!("console connecting to {}:{}", opts.host, opts.port);
    let mut stream = TcpStream::connect((opts.host.as_str(), opts.port))
        .with_context(|| format!("connect to manager {}:{}", opts.host, opts.port))?;
    println!("Connected to manager");
    println!("Type 'help' for available commands or 'shutdown' to exit.");
    prompt();

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("read stdin")?;
        let line = line.trim();
        if line.is_empty() {
            prompt();
            continue;
        }
        if line == "help" {
            println!("{HELP}");
            prompt();
            continue;
        }
        if let Err(e) = validate(line) {
            eprintln!("{e}");
            prompt();
            continue;
        }

        log.message(&format!("Command {line}"));
        stream
            .write_all(format!("{line}\n").as_bytes())
            .context("send command to manager")?;

        // One read of whatever the manager has for us; replies may be
        // multi-line but arrive promptly.
        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).context("read manager reply")?;
        if n == 0 {
            eprintln!("manager closed the connection");
            break;
        }
        let reply = String::from_utf8_lossy(&buf[..n]);
        print!("{reply}");
        let _ = io::stdout().flush();
        log.message(&format!("Response: {}", reply.trim_end()));

        if line.split_whitespace().next() == Some("shutdown") {
            println!("Shutting down console...");
            break;
        }
        prompt();
    }
    Ok(())
}
