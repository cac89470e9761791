//! Wire protocol shared by the manager and the file server.
//!
//! The dialect is textual: newline-terminated `LIST`/`PULL`/`PUSH`
//! command lines, with two binary exceptions. A `PULL` reply is
//! `"<size> "` followed immediately by exactly `size` raw bytes (or
//! `"-1 <message>"` on failure), and a `PUSH <path> <k> ` chunk header
//! is terminated by a single space, not a newline, because the peer
//! switches to a length-counted binary read of exactly `k` bytes.

use std::io::{self, BufRead, Read};

pub const CMD_LIST: &str = "LIST";
pub const CMD_PULL: &str = "PULL";
pub const CMD_PUSH: &str = "PUSH";

/// End-of-listing sentinel: a line containing a single dot.
pub const LIST_SENTINEL: &str = ".";

/// Transfer chunk buffer. PUSH chunk payloads never exceed this.
pub const TRANSFER_BUF: usize = 8 * 1024;

/// Upper bound on the accumulated `"<size> "` header of a PULL reply.
/// A decimal u64 plus sign and space fits comfortably.
pub const MAX_SIZE_HEADER: usize = 32;

/// Strip the leading slash from a wire path so it resolves relative to
/// the file server's root.
pub fn relative(path: &str) -> &str {
    path.strip_prefix('/').unwrap_or(path)
}

/// `"open for write, truncate"` frame.
pub fn push_open_frame(path: &str) -> String {
    format!("{CMD_PUSH} {path} -1\n")
}

/// Chunk header. The trailing space is load-bearing: the receiver
/// parses up to it, then reads exactly `k` raw bytes.
pub fn push_chunk_header(path: &str, k: usize) -> String {
    format!("{CMD_PUSH} {path} {k} ")
}

/// `"close"` frame.
pub fn push_close_frame(path: &str) -> String {
    format!("{CMD_PUSH} {path} 0\n")
}

/// Split the leading `"<size> "` token off a PULL reply.
///
/// Scans for the first space; the bytes before it parse as a signed
/// decimal integer and the byte after it is the first payload byte.
/// Returns `None` while no space has arrived yet, `Some(Err)` if the
/// token is not an integer.
pub fn split_size_header(buf: &[u8]) -> Option<Result<(i64, usize), String>> {
    let space = buf.iter().position(|&b| b == b' ')?;
    let token = String::from_utf8_lossy(&buf[..space]);
    match token.trim().parse::<i64>() {
        Ok(size) => Some(Ok((size, space + 1))),
        Err(_) => Some(Err(format!("bad size token {:?}", token))),
    }
}

/// True once a LIST reply is complete: the sentinel line has arrived.
pub fn listing_complete(buf: &[u8]) -> bool {
    buf == b".\n" || buf.ends_with(b"\n.\n")
}

/// Split an accumulated LIST reply into filenames, stopping at the
/// sentinel. Blank lines are skipped.
pub fn parse_listing(buf: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    for line in String::from_utf8_lossy(buf).lines() {
        let line = line.trim_end_matches('\r');
        if line == LIST_SENTINEL {
            break;
        }
        if !line.is_empty() {
            names.push(line.to_string());
        }
    }
    names
}

/// One whitespace-delimited token from a command stream.
///
/// Reads bytes up to the first space or newline and reports which
/// delimiter ended the token (a space-terminated token may be followed
/// by raw payload bytes, so the caller must know). Returns `None` on
/// EOF before any byte.
pub fn read_token<R: BufRead>(reader: &mut R) -> io::Result<Option<(String, u8)>> {
    let mut token = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = reader.read(&mut byte)?;
        if n == 0 {
            if token.is_empty() {
                return Ok(None);
            }
            // EOF mid-token: hand back what we have, delimiter newline.
            return Ok(Some((String::from_utf8_lossy(&token).into_owned(), b'\n')));
        }
        match byte[0] {
            b' ' | b'\n' => {
                if token.is_empty() && byte[0] == b' ' {
                    continue; // skip leading spaces
                }
                return Ok(Some((String::from_utf8_lossy(&token).into_owned(), byte[0])));
            }
            b'\r' => {}
            b => token.push(b),
        }
    }
}

/// Rest of the current command line, trimmed.
pub fn read_line_rest<R: BufRead>(reader: &mut R) -> io::Result<String> {
    let mut rest = Vec::new();
    reader.read_until(b'\n', &mut rest)?;
    Ok(String::from_utf8_lossy(&rest).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn size_header_with_payload_start() {
        let (size, at) = split_size_header(b"1234 abcd").unwrap().unwrap();
        assert_eq!(size, 1234);
        assert_eq!(at, 5);
        assert_eq!(&b"1234 abcd"[at..], b"abcd");
    }

    #[test]
    fn size_header_exact() {
        let (size, at) = split_size_header(b"0 ").unwrap().unwrap();
        assert_eq!(size, 0);
        assert_eq!(at, 2);
    }

    #[test]
    fn size_header_error_reply() {
        let (size, at) = split_size_header(b"-1 no such file").unwrap().unwrap();
        assert_eq!(size, -1);
        assert_eq!(&b"-1 no such file"[at..], b"no such file");
    }

    #[test]
    fn size_header_incomplete() {
        assert!(split_size_header(b"123").is_none());
    }

    #[test]
    fn size_header_garbage() {
        assert!(split_size_header(b"abc ").unwrap().is_err());
    }

    #[test]
    fn listing_sentinel_detection() {
        assert!(listing_complete(b".\n"));
        assert!(listing_complete(b"a.txt\nb.txt\n.\n"));
        assert!(!listing_complete(b"a.txt\n"));
        assert!(!listing_complete(b"a.txt\n."));
        // a file named "x." must not terminate the listing
        assert!(!listing_complete(b"x.\n"));
    }

    #[test]
    fn listing_parse() {
        let names = parse_listing(b"a.txt\nb.bin\n.\n");
        assert_eq!(names, vec!["a.txt", "b.bin"]);
        assert!(parse_listing(b".\n").is_empty());
    }

    #[test]
    fn push_frames() {
        assert_eq!(push_open_frame("/dst/a"), "PUSH /dst/a -1\n");
        assert_eq!(push_chunk_header("/dst/a", 4096), "PUSH /dst/a 4096 ");
        assert_eq!(push_close_frame("/dst/a"), "PUSH /dst/a 0\n");
    }

    #[test]
    fn token_reader() {
        let mut cur = Cursor::new(b"PUSH /d/f 12 xxxxxxxxxxxx".to_vec());
        let (cmd, d) = read_token(&mut cur).unwrap().unwrap();
        assert_eq!((cmd.as_str(), d), ("PUSH", b' '));
        let (path, d) = read_token(&mut cur).unwrap().unwrap();
        assert_eq!((path.as_str(), d), ("/d/f", b' '));
        let (k, d) = read_token(&mut cur).unwrap().unwrap();
        assert_eq!((k.as_str(), d), ("12", b' '));
        let mut payload = [0u8; 12];
        cur.read_exact(&mut payload).unwrap();
        assert_eq!(&payload, b"xxxxxxxxxxxx");
    }

    #[test]
    fn token_reader_newline_and_eof() {
        let mut cur = Cursor::new(b"LIST /src\n".to_vec());
        let (cmd, d) = read_token(&mut cur).unwrap().unwrap();
        assert_eq!((cmd.as_str(), d), ("LIST", b' '));
        assert_eq!(read_line_rest(&mut cur).unwrap(), "/src");
        assert!(read_token(&mut cur).unwrap().is_none());
    }

    #[test]
    fn relative_paths() {
        assert_eq!(relative("/src/a.txt"), "src/a.txt");
        assert_eq!(relative("src/a.txt"), "src/a.txt");
    }
}
