use std::io::Read;
use std::path::PathBuf;
use std::process::Stdio;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// This mirrors the convention used by POSIX shells and many command-line tools.
pub type ExitCode = i32;

/// A parsed command line: the first stage plus any piped-to stages.
///
/// Redirections are recorded on whichever stage they appeared in, but the
/// executor honors `input` only on the first stage and `output` only on the
/// last one. `background` is only ever set on the outer command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Command {
    /// Program or builtin name. Empty when the line had no plain word.
    pub name: String,
    /// Arguments after the name, already variable-expanded.
    pub args: Vec<String>,
    /// File to read standard input from (`< path`).
    pub input: Option<PathBuf>,
    /// File to write standard output to (`> path` or `>> path`).
    pub output: Option<PathBuf>,
    /// Whether `output` is opened for appending rather than truncated.
    pub append_output: bool,
    /// Set by a trailing `&`.
    pub background: bool,
    /// Stages after this one, in order. Empty for a single command.
    pub pipeline: Vec<Command>,
}

impl Command {
    /// Whether this command has more than one stage.
    pub fn is_pipeline(&self) -> bool {
        !self.pipeline.is_empty()
    }

    /// All stages in execution order, starting with `self`.
    pub fn stages(&self) -> impl Iterator<Item = &Command> {
        std::iter::once(self).chain(self.pipeline.iter())
    }

    /// The command line as the host shell would see it: name and args joined
    /// by single spaces.
    pub fn command_line(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Abstraction over a readable input stream that can also be converted into
/// a [`Stdio`] handle for spawning external processes.
///
/// Pipeline stages take their input from one of these: a redirected file, the
/// previous stage's stdout pipe, or the interpreter's own stdin. A blanket
/// implementation exists for any type that implements `Read` and `Into<Stdio>`.
pub trait Stdin: Read {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    fn stdio(self: Box<Self>) -> Stdio;
}

impl<T: Read + Into<Stdio>> Stdin for T {
    fn stdio(self: Box<Self>) -> Stdio {
        (*self).into()
    }
}
