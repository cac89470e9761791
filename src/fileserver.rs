//! File server: serves LIST/PULL/PUSH against a directory root.
//!
//! Each accepted connection gets its own handler thread. The PUSH
//! state machine's retained file handle lives in the per-connection
//! handler, so concurrent transfers on different connections never
//! collide on it.

use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::thread;

use crate::protocol::{self, CMD_LIST, CMD_PULL, CMD_PUSH, TRANSFER_BUF};

/// Bind and serve forever, resolving wire paths under `root`.
pub fn serve(port: u16, root: impl Into<PathBuf>) -> Result<()> {
    let listener =
        TcpListener::bind(("0.0.0.0", port)).with_context(|| format!("bind port {port}"))?;
    serve_on(listener, root)
}

/// Accept loop over an already-bound listener.
pub fn serve_on(listener: TcpListener, root: impl Into<PathBuf>) -> Result<()> {
    let root = root.into();
    eprintln!(
        "file server listening on {} root={}",
        listener.local_addr()?,
        root.display()
    );
    for conn in listener.incoming() {
        match conn {
            Ok(stream) => {
                let peer = stream
                    .peer_addr()
                    .map(|a| a.to_string())
                    .unwrap_or_else(|_| "unknown".to_string());
                let root = root.clone();
                thread::Builder::new()
                    .name("fs-conn".to_string())
                    .spawn(move || {
                        let result = ConnHandler::new(stream, root).and_then(ConnHandler::run);
                        if let Err(e) = result {
                            eprintln!("connection error from {peer}: {e:#}");
                        }
                    })
                    .context("spawn connection handler")?;
            }
            Err(e) => eprintln!("accept error: {e}"),
        }
    }
    Ok(())
}

/// One accepted connection's command loop and its PUSH state.
struct ConnHandler {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    root: PathBuf,
    /// Retained across PUSH frames: opened on `-1`, appended on
    /// `k > 0`, dropped (closed) on `0` or connection end.
    push_file: Option<File>,
}

impl ConnHandler {
    fn new(stream: TcpStream, root: PathBuf) -> Result<Self> {
        let writer = stream.try_clone().context("clone connection stream")?;
        Ok(Self {
            reader: BufReader::new(stream),
            writer,
            root,
            push_file: None,
        })
    }

    fn run(mut self) -> Result<()> {
        loop {
            let Some((cmd, delim)) = protocol::read_token(&mut self.reader)? else {
                return Ok(()); // peer closed
            };
            match cmd.as_str() {
                CMD_LIST => {
                    let dir = self.rest_of_line(delim)?;
                    self.handle_list(&dir)?;
                }
                CMD_PULL => {
                    let path = self.rest_of_line(delim)?;
                    self.handle_pull(&path)?;
                }
                CMD_PUSH => {
                    let Some((path, _)) = protocol::read_token(&mut self.reader)? else {
                        return Ok(());
                    };
                    let Some((k_token, _)) = protocol::read_token(&mut self.reader)? else {
                        return Ok(());
                    };
                    match k_token.parse::<i64>() {
                        Ok(k) => self.handle_push(&path, k)?,
                        Err(_) => eprintln!("bad PUSH chunk size {k_token:?} for {path}"),
                    }
                }
                "" => {}
                other => {
                    let rest = self.rest_of_line(delim)?;
                    eprintln!("unknown command: {other} {rest}");
                }
            }
        }
    }

    fn rest_of_line(&mut self, delim: u8) -> Result<String> {
        if delim == b'\n' {
            return Ok(String::new());
        }
        Ok(protocol::read_line_rest(&mut self.reader)?)
    }

    /// Resolve a wire path under the served root. A leading slash is
    /// stripped so absolute-looking specs land relative to the root.
    fn resolve(&self, wire_path: &str) -> PathBuf {
        self.root.join(protocol::relative(wire_path))
    }

    /// Enumerate regular files of `dir` (names starting with `.` are
    /// skipped), one per line, terminated by the `.` sentinel.
    fn handle_list(&mut self, dir: &str) -> Result<()> {
        let path = self.resolve(dir);
        match std::fs::read_dir(&path) {
            Ok(entries) => {
                for entry in entries.flatten() {
                    let name = entry.file_name();
                    let Some(name) = name.to_str() else { continue };
                    if name.starts_with('.') {
                        continue;
                    }
                    // Whitespace cannot be framed by the
                    // space-delimited PUSH header.
                    if name.contains(char::is_whitespace) {
                        continue;
                    }
                    // stat follows symlinks, like the directory walk
                    // this mirrors; only regular files are listed.
                    match std::fs::metadata(entry.path()) {
                        Ok(md) if md.is_file() => {
                            self.writer
                                .write_all(format!("{name}\n").as_bytes())
                                .context("send LIST entry")?;
                        }
                        _ => {}
                    }
                }
            }
            Err(e) => {
                // Still send the sentinel so the peer sees an empty
                // listing instead of waiting forever.
                eprintln!("error opening directory {}: {e}", path.display());
            }
        }
        self.writer
            .write_all(format!("{}\n", protocol::LIST_SENTINEL).as_bytes())
            .context("send LIST sentinel")?;
        Ok(())
    }

    /// Reply `"<size> "` followed by the raw file bytes, or
    /// `"-1 <message>"` if the file cannot be served.
    fn handle_pull(&mut self, wire_path: &str) -> Result<()> {
        let path = self.resolve(wire_path);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => return self.pull_error(&e.to_string()),
        };
        let size = match file.metadata() {
            Ok(md) => md.len(),
            Err(e) => return self.pull_error(&e.to_string()),
        };
        self.writer
            .write_all(format!("{size} ").as_bytes())
            .context("send PULL size header")?;
        let mut buf = [0u8; TRANSFER_BUF];
        loop {
            let n = file.read(&mut buf).context("read source file")?;
            if n == 0 {
                break;
            }
            self.writer
                .write_all(&buf[..n])
                .context("send PULL payload")?;
        }
        Ok(())
    }

    fn pull_error(&mut self, msg: &str) -> Result<()> {
        // No trailing newline: the error text is the rest of the reply.
        self.writer
            .write_all(format!("-1 {msg}").as_bytes())
            .context("send PULL error")?;
        Ok(())
    }

    /// PUSH state machine: `-1` opens (create + truncate), `k > 0`
    /// appends exactly `k` bytes read from this connection, `0`
    /// closes.
    fn handle_push(&mut self, wire_path: &str, k: i64) -> Result<()> {
        match k {
            -1 => {
                let path = self.resolve(wire_path);
                self.push_file = match open_for_write(&path) {
                    Ok(f) => Some(f),
                    Err(e) => {
                        eprintln!("error opening {} for writing: {e}", path.display());
                        None
                    }
                };
            }
            0 => {
                self.push_file = None;
            }
            k if k > 0 => self.receive_chunk(wire_path, k as u64)?,
            _ => eprintln!("bad PUSH chunk size {k} for {wire_path}"),
        }
        Ok(())
    }

    /// Consume exactly `k` payload bytes, looping on partial reads.
    /// The bytes are always consumed, even when the file is not
    /// writable, so the command stream stays in sync.
    fn receive_chunk(&mut self, wire_path: &str, k: u64) -> Result<()> {
        let mut buf = [0u8; TRANSFER_BUF];
        let mut remaining = k;
        while remaining > 0 {
            let want = remaining.min(TRANSFER_BUF as u64) as usize;
            let n = self.reader.read(&mut buf[..want]).context("read chunk")?;
            if n == 0 {
                anyhow::bail!("connection closed {remaining} bytes into a chunk for {wire_path}");
            }
            if let Some(file) = self.push_file.as_mut() {
                if let Err(e) = file.write_all(&buf[..n]) {
                    eprintln!("error writing {wire_path}: {e}");
                    self.push_file = None;
                }
            }
            remaining -= n as u64;
        }
        Ok(())
    }
}

fn open_for_write(path: &Path) -> std::io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o644);
    }
    opts.open(path)
}
