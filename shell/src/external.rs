//! Launching external programs: redirection files, host-shell commands,
//! pipeline stages and the `test` condition used by scripts.

use crate::command::{Command, ExitCode};
use crate::env::Environment;
use anyhow::{Context, Result, anyhow};
use std::borrow::Cow;
use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Child, ExitStatus, Stdio};

/// Files opened for one command or pipeline invocation.
///
/// The handles are owned here until they are turned into child stdio, so
/// each one is closed exactly once whichever way the invocation ends.
#[derive(Debug, Default)]
pub struct Redirections {
    pub input: Option<File>,
    pub output: Option<File>,
}

impl Redirections {
    /// Open `input` for reading and `output` for writing (truncating unless
    /// `append`). If the output fails to open, the already opened input is
    /// dropped before the error is returned.
    pub fn open(input: Option<&Path>, output: Option<&Path>, append: bool) -> Result<Self> {
        let input = input
            .map(|path| File::open(path).with_context(|| format!("{}", path.display())))
            .transpose()?;
        let output = output
            .map(|path| {
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .append(append)
                    .truncate(!append)
                    .open(path)
                    .with_context(|| format!("{}", path.display()))
            })
            .transpose()?;
        Ok(Self { input, output })
    }
}

/// `std::process::Command` running `line` through the host shell.
#[cfg(unix)]
fn host_shell(line: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("sh");
    cmd.arg("-c").arg(line);
    cmd
}

#[cfg(not(unix))]
fn host_shell(line: &str) -> std::process::Command {
    let mut cmd = std::process::Command::new("cmd");
    cmd.arg("/C").arg(line);
    cmd
}

/// Spawn a single command through the host shell, with stdin/stdout bound
/// to the redirection files when present and inherited otherwise.
pub fn spawn_host_shell(
    cmd: &Command,
    env: &Environment,
    redirections: Redirections,
) -> Result<Child> {
    let line = cmd.command_line();
    let stdin = redirections.input.map_or_else(Stdio::inherit, Stdio::from);
    let stdout = redirections.output.map_or_else(Stdio::inherit, Stdio::from);
    tracing::debug!(%line, "spawning through host shell");
    let child = host_shell(&line)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(Stdio::inherit())
        .envs(&env.vars)
        .current_dir(&env.current_dir)
        .spawn()?;
    Ok(child)
}

/// Spawn one pipeline stage directly, without the host shell.
///
/// The program is looked up in `PATH` first so a missing program is
/// reported as "command not found" rather than an OS error.
pub fn spawn_stage(
    stage: &Command,
    env: &Environment,
    stdin: Stdio,
    stdout: Stdio,
    stderr: Stdio,
) -> Result<Child> {
    let search_paths = env.get_var("PATH").unwrap_or_default();
    let program = find_command_path(OsStr::new(&search_paths), Path::new(&stage.name))
        .ok_or_else(|| anyhow!("command not found"))?;
    tracing::debug!(program = %program.display(), args = ?stage.args, "spawning pipeline stage");
    let child = std::process::Command::new(&*program)
        .args(&stage.args)
        .stdin(stdin)
        .stdout(stdout)
        .stderr(stderr)
        .envs(&env.vars)
        .current_dir(&env.current_dir)
        .spawn()?;
    Ok(child)
}

/// Evaluate a script condition with the host shell's `test`.
pub fn test_condition(condition: &str, env: &Environment) -> Result<bool> {
    let status = host_shell(&format!("test {condition}"))
        .stdin(Stdio::null())
        .envs(&env.vars)
        .current_dir(&env.current_dir)
        .status()
        .context("can't run test")?;
    Ok(status.success())
}

/// Numeric exit code of a finished process; `128 + signal` for processes
/// killed by a signal.
pub fn exit_code(status: ExitStatus) -> ExitCode {
    match status.code() {
        Some(x) => x,
        None => terminated_by_signal(status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> ExitCode {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> ExitCode {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// - Absolute path: returned if it exists.
/// - `./foo` (or any path on non-unix platforms): returned if it exists.
/// - A single component: searched in each directory of `search_paths`.
/// - Several components (`bin/sh`): returned if it exists relative to the
///   current directory.
/// - Empty: `None`.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir && path.exists() {
        return Some(Cow::Borrowed(path));
    }

    let mut components = path.components();
    match (components.next(), components.next()) {
        (None, _) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .map(|dir| dir.join(cmd))
        .find(|path| path.is_file())
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if path.exists() { Some(path) } else { None }
}
