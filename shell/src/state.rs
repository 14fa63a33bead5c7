use crate::alias::AliasTable;
use crate::env::Environment;
use crate::history::History;
use crate::job::JobTable;
use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;

/// Where the shell keeps its files. `None` disables persistence for that file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellConfig {
    pub rc_path: Option<PathBuf>,
    pub history_path: Option<PathBuf>,
}

impl ShellConfig {
    /// `~/.ccshrc` and `~/.ccsh_history`, when a home directory is known.
    pub fn from_env(env: &Environment) -> Self {
        let home = env.home_dir();
        Self {
            rc_path: home.as_ref().map(|h| h.join(".ccshrc")),
            history_path: home.map(|h| h.join(".ccsh_history")),
        }
    }
}

/// Everything the interpreter remembers between lines.
#[derive(Debug)]
pub struct ShellState {
    pub env: Environment,
    pub aliases: AliasTable,
    pub history: History,
    pub jobs: JobTable,
}

impl ShellState {
    /// Fresh state that never touches the filesystem.
    pub fn in_memory(env: Environment) -> Self {
        Self {
            env,
            aliases: AliasTable::in_memory(),
            history: History::in_memory(),
            jobs: JobTable::new(),
        }
    }

    /// Load aliases and history as described by `config`, telling the user
    /// on `notices` about files that had to be created.
    pub fn load(config: &ShellConfig, env: Environment, notices: &mut dyn Write) -> Result<Self> {
        let mut state = Self::in_memory(env);
        if let Some(path) = &config.rc_path {
            let (aliases, existed) = AliasTable::load(path)?;
            if !existed {
                writeln!(notices, "No config file found. Creating a new one.")?;
            }
            state.aliases = aliases;
        }
        if let Some(path) = &config.history_path {
            let (history, existed) = History::load(path)?;
            if !existed {
                writeln!(notices, "No history file found. Creating a new one.")?;
            }
            state.history = history;
        }
        Ok(state)
    }
}
