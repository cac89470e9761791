//! One-file transfer: PULL from the source server, chunked PUSH to
//! the target server.
//!
//! Each call opens its own pair of connections and closes them before
//! returning; connections are never shared between jobs or threads.
//! Any failure is logged against the job and returned as an error;
//! a worker survives every bad transfer.

use anyhow::{bail, Context, Result};
use std::io::{Read, Write};
use std::net::TcpStream;

use crate::logger::{EventLog, Op, Outcome};
use crate::protocol::{self, MAX_SIZE_HEADER, TRANSFER_BUF};
use crate::queue::SyncJob;

/// Copy one file from the job's source server to its target server.
/// Returns the number of payload bytes forwarded.
pub fn execute(job: &SyncJob, log: &dyn EventLog) -> Result<u64> {
    let source = match TcpStream::connect(job.source.addr()) {
        Ok(stream) => stream,
        Err(e) => {
            log.transfer(
                job,
                Op::Pull,
                Outcome::Error,
                &format!("Connection failed to source: {e}"),
            );
            return Err(e).with_context(|| format!("connect source {}", job.source.addr()));
        }
    };
    let target = match TcpStream::connect(job.target.addr()) {
        Ok(stream) => stream,
        Err(e) => {
            log.transfer(
                job,
                Op::Push,
                Outcome::Error,
                &format!("Connection failed to target: {e}"),
            );
            return Err(e).with_context(|| format!("connect target {}", job.target.addr()));
        }
    };

    let bytes = copy_file(job, source, target, log)?;
    log.transfer(
        job,
        Op::Pull,
        Outcome::Success,
        &format!("{bytes} bytes pulled"),
    );
    log.transfer(
        job,
        Op::Push,
        Outcome::Success,
        &format!("{bytes} bytes pushed"),
    );
    Ok(bytes)
}

fn copy_file(
    job: &SyncJob,
    mut source: TcpStream,
    mut target: TcpStream,
    log: &dyn EventLog,
) -> Result<u64> {
    let source_path = job.source_path();
    let target_path = job.target_path();

    source
        .write_all(format!("{} {}\n", protocol::CMD_PULL, source_path).as_bytes())
        .context("send PULL")?;

    // The reply starts with "<size> "; the first read may already
    // carry the start of the payload after the space.
    let mut header = Vec::new();
    let mut chunk = [0u8; TRANSFER_BUF];
    let (size, mut pending) = loop {
        let n = source.read(&mut chunk).context("read PULL reply")?;
        if n == 0 {
            log.transfer(
                job,
                Op::Pull,
                Outcome::Error,
                &format!("File: {} - source closed before size header", job.filename),
            );
            bail!("source closed before size header for {source_path}");
        }
        header.extend_from_slice(&chunk[..n]);
        match protocol::split_size_header(&header) {
            Some(Ok((size, payload_at))) => break (size, header.split_off(payload_at)),
            Some(Err(msg)) => {
                log.transfer(
                    job,
                    Op::Pull,
                    Outcome::Error,
                    &format!("File: {} - {}", job.filename, msg),
                );
                bail!("unparseable PULL reply for {source_path}: {msg}");
            }
            None if header.len() > MAX_SIZE_HEADER => {
                log.transfer(
                    job,
                    Op::Pull,
                    Outcome::Error,
                    &format!("File: {} - oversized size header", job.filename),
                );
                bail!("oversized PULL size header for {source_path}");
            }
            None => {}
        }
    };

    if size < 0 {
        // "-1 <message>" from the source.
        let msg = String::from_utf8_lossy(&pending).trim().to_string();
        log.transfer(
            job,
            Op::Pull,
            Outcome::Error,
            &format!("File: {} - {}", job.filename, msg),
        );
        bail!("source error for {source_path}: {msg}");
    }
    let size = size as u64;
    pending.truncate(size as usize);

    target
        .write_all(protocol::push_open_frame(&target_path).as_bytes())
        .context("send PUSH open")?;

    let mut total: u64 = 0;
    if !pending.is_empty() {
        push_chunk(job, &mut target, &target_path, &pending, log)?;
        total += pending.len() as u64;
    }
    while total < size {
        let want = ((size - total) as usize).min(TRANSFER_BUF);
        let n = source.read(&mut chunk[..want]).context("read file data")?;
        if n == 0 {
            log.transfer(
                job,
                Op::Pull,
                Outcome::Error,
                &format!(
                    "File: {} - short read, {total} of {size} bytes",
                    job.filename
                ),
            );
            bail!("short read from source for {source_path}: {total} of {size} bytes");
        }
        push_chunk(job, &mut target, &target_path, &chunk[..n], log)?;
        total += n as u64;
    }

    target
        .write_all(protocol::push_close_frame(&target_path).as_bytes())
        .context("send PUSH close")?;
    Ok(total)
}

/// One `PUSH <path> <k> ` header followed by exactly `k` payload
/// bytes. The whole payload is written before the next header goes
/// out; the header and payload may be coalesced by the OS, which is
/// fine because the receiver parses the header and then switches to a
/// counted binary read.
fn push_chunk(
    job: &SyncJob,
    target: &mut TcpStream,
    target_path: &str,
    data: &[u8],
    log: &dyn EventLog,
) -> Result<()> {
    let header = protocol::push_chunk_header(target_path, data.len());
    let sent = target
        .write_all(header.as_bytes())
        .and_then(|_| target.write_all(data));
    if let Err(e) = sent {
        log.transfer(
            job,
            Op::Push,
            Outcome::Error,
            &format!("File: {} - {}", job.filename, e),
        );
        return Err(e).with_context(|| format!("send chunk to {target_path}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::NoopLogger;
    use crate::spec::DirSpec;

    #[test]
    fn connect_failure_is_an_error_not_a_panic() {
        // Port 1 on loopback is essentially never listening.
        let job = SyncJob {
            source: DirSpec::new("/src", "127.0.0.1", 1),
            target: DirSpec::new("/dst", "127.0.0.1", 1),
            filename: "a.txt".into(),
        };
        assert!(execute(&job, &NoopLogger).is_err());
    }
}
