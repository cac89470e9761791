//! Startup sync-pair configuration file.
//!
//! One pair per line: `<source_spec> <target_spec>`, each spec of the
//! form `/<dir>@<host>:<port>`. Blank lines and lines starting with
//! `#` are skipped. A malformed line is a startup error.

use anyhow::{bail, Context, Result};
use std::path::Path;

use crate::spec::DirSpec;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPair {
    pub source: DirSpec,
    pub target: DirSpec,
}

pub fn load(path: &Path) -> Result<Vec<ConfigPair>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config file {}", path.display()))?;
    parse(&text).with_context(|| format!("parse config file {}", path.display()))
}

pub fn parse(text: &str) -> Result<Vec<ConfigPair>> {
    let mut pairs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut tokens = line.split_whitespace();
        let (source, target) = match (tokens.next(), tokens.next(), tokens.next()) {
            (Some(src), Some(dst), None) => (src, dst),
            _ => bail!("line {}: expected <source_spec> <target_spec>: {raw:?}", idx + 1),
        };
        pairs.push(ConfigPair {
            source: DirSpec::parse(source).with_context(|| format!("line {}", idx + 1))?,
            target: DirSpec::parse(target).with_context(|| format!("line {}", idx + 1))?,
        });
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pairs_and_skips_comments() {
        let text = "\
# replication pairs
/src@10.0.0.1:8001 /dst@10.0.0.2:8002

/other@10.0.0.1:8001 /mirror@10.0.0.3:8002
";
        let pairs = parse(text).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].source.dir, "/src");
        assert_eq!(pairs[1].target, DirSpec::new("/mirror", "10.0.0.3", 8002));
    }

    #[test]
    fn empty_file_is_fine() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("# nothing but comments\n\n").unwrap().is_empty());
    }

    #[test]
    fn missing_target_is_an_error() {
        let err = parse("/src@10.0.0.1:8001\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn extra_tokens_are_an_error() {
        assert!(parse("/a@h:1 /b@h:2 /c@h:3\n").is_err());
    }

    #[test]
    fn bad_spec_is_an_error() {
        assert!(parse("/src@nowhere /dst@10.0.0.2:8002\n").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load(Path::new("/definitely/not/here.conf")).unwrap_err();
        assert!(err.to_string().contains("read config file"));
    }
}
