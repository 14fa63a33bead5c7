//! ccsh, a small interactive command interpreter.
//!
//! A line typed at the prompt (or read from a script) goes through alias
//! substitution, tokenizing and parsing into a [`Command`], which the
//! [`Interpreter`] runs as a builtin, as a single external command through the
//! host shell, or as a pipeline of directly spawned programs. Aliases and
//! history persist in the user's home directory; background commands are
//! tracked in a job table.
//!
//! The public modules [`command`] and [`env`] expose the parsed command tree
//! and the variable environment used during expansion.

mod alias;
mod builtin;
pub mod command;
mod completion;
pub mod env;
mod expand;
mod external;
mod history;
mod interpreter;
mod io_adapters;
mod job;
mod lexer;
mod parser;
mod script;
mod state;

pub use alias::AliasTable;
pub use command::{Command, ExitCode};
pub use completion::ShellHelper;
pub use expand::expand;
pub use history::History;
pub use io_adapters::MemWriter;
pub use job::{Job, JobStatus, JobTable};
pub use lexer::tokenize;
pub use parser::parse;
pub use script::{Block, LoopKind, ScriptItem, scan};
pub use state::{ShellConfig, ShellState};

/// The interactive command runner.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;
