//! Alias table and its `~/.ccshrc` persistence.
//!
//! The config file is line oriented. Lines of the form `alias NAME='COMMAND'`
//! define aliases; everything else is ignored when loading. Saving always
//! rewrites the whole file from memory.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// First line of every config file written by the shell.
pub const CONFIG_HEADER: &str = "# CCSH Configuration File";

static ALIAS_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^alias (\S+?)='(.*)'$").expect("alias pattern is valid"));

#[derive(Debug, Default)]
pub struct AliasTable {
    aliases: BTreeMap<String, String>,
    path: Option<PathBuf>,
}

impl AliasTable {
    /// A table that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load aliases from `path`.
    ///
    /// A missing file is not an error: a fresh one containing only the header
    /// is created and `Ok(false)` is returned so the caller can tell the user.
    pub fn load(path: impl Into<PathBuf>) -> Result<(Self, bool)> {
        let path = path.into();
        let mut table = Self {
            aliases: BTreeMap::new(),
            path: Some(path.clone()),
        };
        match fs::read(&path) {
            Ok(bytes) => {
                table.aliases = parse_config(&String::from_utf8_lossy(&bytes));
                tracing::debug!(path = %path.display(), count = table.aliases.len(), "loaded aliases");
                Ok((table, true))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                fs::write(&path, format!("{CONFIG_HEADER}\n"))
                    .with_context(|| format!("can't create {}", path.display()))?;
                Ok((table, false))
            }
            Err(e) => Err(e).with_context(|| format!("can't read {}", path.display())),
        }
    }

    /// Rewrite the config file from the in-memory table.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        write_config(path, &self.aliases)?;
        tracing::debug!(path = %path.display(), count = self.aliases.len(), "saved aliases");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.aliases.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, command: impl Into<String>) {
        self.aliases.insert(name.into(), command.into());
    }

    /// Remove `name`, returning whether it was defined.
    pub fn remove(&mut self, name: &str) -> bool {
        self.aliases.remove(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Aliases in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.aliases.keys().map(String::as_str)
    }

    /// Substitute an alias for the first word of `line`.
    ///
    /// The result is resolved again, so an alias may expand to another alias,
    /// but each alias is expanded at most once per line.
    pub fn resolve(&self, line: &str) -> String {
        let mut line = line.to_string();
        let mut seen = HashSet::new();
        loop {
            let trimmed = line.trim_start();
            let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
            let (first, rest) = trimmed.split_at(end);
            match self.aliases.get(first) {
                Some(value) if seen.insert(first.to_string()) => {
                    line = format!("{value}{rest}");
                }
                _ => return line,
            }
        }
    }
}

fn parse_config(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .filter_map(|line| ALIAS_LINE.captures(line))
        .map(|caps| (caps[1].to_string(), caps[2].to_string()))
        .collect()
}

fn write_config(path: &Path, aliases: &BTreeMap<String, String>) -> Result<()> {
    let mut file =
        fs::File::create(path).with_context(|| format!("can't write {}", path.display()))?;
    writeln!(file, "{CONFIG_HEADER}")?;
    for (name, command) in aliases {
        writeln!(file, "alias {name}='{command}'")?;
    }
    Ok(())
}
