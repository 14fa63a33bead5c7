use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Variables and working directory seen by commands the shell runs.
///
/// `vars` starts as a snapshot of the process environment and is passed to
/// every spawned child. `current_dir` tracks `cd` and is used as the child's
/// working directory. `should_exit` is raised by the `exit` builtin and polled
/// by the REPL and the script runner.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
}

impl Environment {
    /// Capture the current process state.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars: stdenv::vars().collect(),
            current_dir,
            should_exit: false,
        }
    }

    /// An environment with no variables, rooted at `current_dir`.
    pub fn empty(current_dir: PathBuf) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir,
            should_exit: false,
        }
    }

    /// Look up a variable, falling back to the process environment.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// The user's home directory, from `HOME`.
    pub fn home_dir(&self) -> Option<PathBuf> {
        self.get_var("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
