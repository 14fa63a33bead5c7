//! Command history backed by `~/.ccsh_history`, one line per entry.

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Debug, Default)]
pub struct History {
    entries: Vec<String>,
    path: Option<PathBuf>,
}

impl History {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load non-blank lines from `path`. Returns `false` alongside the
    /// history when the file did not exist yet.
    pub fn load(path: impl Into<PathBuf>) -> Result<(Self, bool)> {
        let path = path.into();
        let (entries, existed) = match fs::read(&path) {
            Ok(bytes) => (
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_string)
                    .collect(),
                true,
            ),
            Err(e) if e.kind() == io::ErrorKind::NotFound => (Vec::new(), false),
            Err(e) => return Err(e).with_context(|| format!("can't read {}", path.display())),
        };
        Ok((
            Self {
                entries,
                path: Some(path),
            },
            existed,
        ))
    }

    /// Record a line and append it to the history file.
    pub fn add(&mut self, line: &str) -> Result<()> {
        self.entries.push(line.to_string());
        if let Some(path) = &self.path {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("can't open {}", path.display()))?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Forget every entry and truncate the history file.
    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        if let Some(path) = &self.path {
            fs::write(path, "").with_context(|| format!("can't truncate {}", path.display()))?;
        }
        Ok(())
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Entries containing `term`, oldest first.
    pub fn search<'a>(&'a self, term: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .map(String::as_str)
            .filter(move |entry| entry.contains(term))
    }
}
