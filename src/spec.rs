//! Directory specs of the form `/<dir>@<host>:<port>`.

use anyhow::{bail, Context, Result};
use std::fmt;

/// One endpoint of a sync pair: a directory on a file server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirSpec {
    pub host: String,
    pub port: u16,
    pub dir: String,
}

impl DirSpec {
    pub fn new(dir: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            dir: dir.into(),
        }
    }

    /// Parse `"<dir>@<host>:<port>"`. The dir part runs up to the
    /// first `@`; the host is an IPv4 address or resolvable name.
    pub fn parse(s: &str) -> Result<Self> {
        let Some((dir, endpoint)) = s.split_once('@') else {
            bail!("invalid directory spec {:?}: expected <dir>@<host>:<port>", s);
        };
        let Some((host, port)) = endpoint.split_once(':') else {
            bail!("invalid directory spec {:?}: missing :<port>", s);
        };
        if dir.is_empty() || host.is_empty() {
            bail!("invalid directory spec {:?}: empty dir or host", s);
        }
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid port in directory spec {:?}", s))?;
        if port == 0 {
            bail!("invalid port in directory spec {:?}", s);
        }
        Ok(Self {
            host: host.to_string(),
            port,
            dir: dir.to_string(),
        })
    }

    /// `host:port` form suitable for `TcpStream::connect`.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for DirSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.dir, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic() {
        let spec = DirSpec::parse("/data/src@127.0.0.1:8080").unwrap();
        assert_eq!(spec.dir, "/data/src");
        assert_eq!(spec.host, "127.0.0.1");
        assert_eq!(spec.port, 8080);
        assert_eq!(spec.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn display_round_trip() {
        let spec = DirSpec::parse("/src@files01:9000").unwrap();
        assert_eq!(spec.to_string(), "/src@files01:9000");
        assert_eq!(DirSpec::parse(&spec.to_string()).unwrap(), spec);
    }

    #[test]
    fn dir_runs_to_first_at() {
        // The first '@' splits dir from endpoint.
        let spec = DirSpec::parse("/a@b@127.0.0.1:1").unwrap();
        assert_eq!(spec.dir, "/a");
        assert_eq!(spec.host, "b@127.0.0.1");
        assert_eq!(spec.port, 1);
    }

    #[test]
    fn rejects_malformed() {
        assert!(DirSpec::parse("/src").is_err());
        assert!(DirSpec::parse("/src@host").is_err());
        assert!(DirSpec::parse("@host:1").is_err());
        assert!(DirSpec::parse("/src@:1").is_err());
        assert!(DirSpec::parse("/src@host:0").is_err());
        assert!(DirSpec::parse("/src@host:notaport").is_err());
        assert!(DirSpec::parse("/src@host:99999").is_err());
    }
}
