use crate::command::ExitCode;
use crate::interpreter::{Factory, Interpreter};
use crate::job;
use anyhow::{Context, Result, bail};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// Names of every builtin, in the order they are offered for completion.
pub const BUILTIN_NAMES: [&str; 11] = [
    "cd", "pwd", "echo", "exit", "history", "alias", "unalias", "jobs", "fg", "bg", "source",
];

/// Built-in commands known to the shell at compile time.
///
/// Builtins run in-process against the interpreter's state and write to its
/// output and error streams. They never see redirections or the background
/// flag.
pub(crate) trait BuiltinCommand: Sized {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Build the command from its arguments. Builtins with flags or a fixed
    /// arity delegate to [`argh`].
    fn parse(args: &[&str]) -> Result<Self, EarlyExit>;

    /// Return value follows shell conventions: 0 for success, non-zero for error.
    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode>;
}

/// Object-safe face of a builtin, as handed out by a [`CommandFactory`].
pub(crate) trait ExecutableCommand {
    fn execute(self: Box<Self>, sh: &mut Interpreter) -> Result<ExitCode>;
}

/// Creates a builtin from a name and its arguments, or `None` when the name
/// belongs to some other command.
pub(crate) trait CommandFactory {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, sh: &mut Interpreter) -> Result<ExitCode> {
        match <T as BuiltinCommand>::execute(*self, sh) {
            Ok(x) => Ok(x),
            Err(e) => {
                writeln!(sh.err, "{e:#}")?;
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, sh: &mut Interpreter) -> Result<ExitCode> {
        if self.is_error {
            write!(sh.err, "{}", self.output)?;
            Ok(1)
        } else {
            write!(sh.out, "{}", self.output)?;
            Ok(0)
        }
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, name: &str, args: &[&str]) -> Option<Box<dyn ExecutableCommand>> {
        if name != T::name() {
            return None;
        }
        Some(match T::parse(args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => {
                let output = if output.ends_with('\n') {
                    output
                } else {
                    format!("{output}\n")
                };
                Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                })
            }
        })
    }
}

fn usage_error(usage: &str) -> EarlyExit {
    EarlyExit {
        output: usage.to_string(),
        status: Err(()),
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; defaults to $HOME.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        let env = &mut sh.state.env;
        let target = match self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match env.home_dir() {
                Some(home) => home,
                None => bail!("cd: HOME not set"),
            },
        };

        let new_dir = env.current_dir.join(target);
        let canonical =
            fs::canonicalize(&new_dir).with_context(|| format!("cd: {}", new_dir.display()))?;
        std::env::set_current_dir(&canonical)
            .with_context(|| format!("cd: {}", canonical.display()))?;
        tracing::debug!(dir = %canonical.display(), "changed directory");
        env.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Print the current working directory.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        writeln!(sh.out, "{}", sh.state.env.current_dir.display())?;
        Ok(0)
    }
}

/// Print the arguments separated by single spaces. No options are recognized.
pub struct Echo {
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Echo {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        writeln!(sh.out, "{}", self.args.join(" "))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Save aliases and leave the shell.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        sh.state.env.should_exit = true;
        sh.state.aliases.save()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Show, search or clear the command history.
pub struct History {
    #[argh(switch, short = 'c')]
    /// forget all entries and truncate the history file.
    pub clear: bool,

    #[argh(option, short = 's')]
    /// show only entries containing this text.
    pub search: Option<String>,

    #[argh(positional, greedy)]
    /// ignored; every entry is listed.
    pub _count: Vec<String>,
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        let history = &mut sh.state.history;
        if self.clear {
            history.clear()?;
        } else if let Some(term) = &self.search {
            for (i, entry) in history.search(term).enumerate() {
                writeln!(sh.out, "{}: {}", i + 1, entry)?;
            }
        } else {
            for (i, entry) in history.entries().iter().enumerate() {
                writeln!(sh.out, "{}: {}", i + 1, entry)?;
            }
        }
        Ok(0)
    }
}

/// List aliases, or define one.
///
/// Both `alias ll ls -la` and `alias ll='ls -la'` define `ll` as `ls -la`.
pub struct Alias {
    pub args: Vec<String>,
}

impl Alias {
    fn definition(&self) -> Option<(String, String)> {
        let (first, rest) = self.args.split_first()?;
        let (name, inline) = match first.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (first.as_str(), None),
        };
        let value = inline
            .into_iter()
            .filter(|v| !v.is_empty())
            .chain(rest.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        Some((name.to_string(), value))
    }
}

impl BuiltinCommand for Alias {
    fn name() -> &'static str {
        "alias"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Ok(Alias {
            args: args.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        let Some((name, value)) = self.definition() else {
            for (name, command) in sh.state.aliases.iter() {
                writeln!(sh.out, "{name}='{command}'")?;
            }
            return Ok(0);
        };
        if name.is_empty() || name.contains(|c: char| c.is_whitespace() || c == '\'') {
            bail!("alias: invalid alias name: {name}");
        }
        sh.state.aliases.set(name, value);
        sh.state.aliases.save()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Remove an alias.
pub struct Unalias {
    #[argh(positional)]
    /// alias to remove.
    pub name: String,
}

impl BuiltinCommand for Unalias {
    fn name() -> &'static str {
        "unalias"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        if !sh.state.aliases.remove(&self.name) {
            bail!("unalias: {} not found", self.name);
        }
        sh.state.aliases.save()?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List background jobs.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        for (index, job) in sh.state.jobs.iter() {
            writeln!(
                sh.out,
                "[{index}] {} {} ({})",
                job.status, job.command, job.pid
            )?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Take the newest background job off the job table and continue it.
pub struct Fg {}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        let Some(job) = sh.state.jobs.pop() else {
            bail!("No background jobs");
        };
        writeln!(sh.out, "{} ({})", job.command, job.pid)?;
        job::continue_process(job.pid).with_context(|| format!("fg: {}", job.pid))?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Continue the newest background job, keeping it in the job table.
pub struct Bg {}

impl BuiltinCommand for Bg {
    fn name() -> &'static str {
        "bg"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        let index = sh.state.jobs.len();
        let Some(job) = sh.state.jobs.last_mut() else {
            bail!("No background jobs");
        };
        writeln!(sh.out, "[{index}] {} ({})", job.command, job.pid)?;
        let pid = job.pid;
        job.status = job::JobStatus::Running;
        job::continue_process(pid).with_context(|| format!("bg: {pid}"))?;
        Ok(0)
    }
}

/// Run a script file in the current shell.
pub struct Source {
    pub path: PathBuf,
}

impl BuiltinCommand for Source {
    fn name() -> &'static str {
        "source"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        match args {
            [path] => Ok(Source {
                path: PathBuf::from(path),
            }),
            _ => Err(usage_error("Usage: source <script_file>")),
        }
    }

    fn execute(self, sh: &mut Interpreter) -> Result<ExitCode> {
        sh.run_script(&self.path);
        Ok(0)
    }
}
