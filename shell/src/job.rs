//! Background jobs launched with a trailing `&`.
//!
//! Jobs are only ever added by the executor and removed by `fg`. Finished
//! processes are not reaped, so a job stays listed after its process exits.

use anyhow::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Stopped,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            JobStatus::Running => "running",
            JobStatus::Stopped => "stopped",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub pid: u32,
    /// Name of the command that was launched.
    pub command: String,
    pub status: JobStatus,
}

impl Job {
    pub fn running(pid: u32, command: impl Into<String>) -> Self {
        Self {
            pid,
            command: command.into(),
            status: JobStatus::Running,
        }
    }
}

#[derive(Debug, Default)]
pub struct JobTable {
    jobs: Vec<Job>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and return its 1-based index.
    pub fn push(&mut self, job: Job) -> usize {
        self.jobs.push(job);
        self.jobs.len()
    }

    /// Remove and return the most recently added job.
    pub fn pop(&mut self) -> Option<Job> {
        self.jobs.pop()
    }

    pub fn last_mut(&mut self) -> Option<&mut Job> {
        self.jobs.last_mut()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Jobs with their 1-based index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Job)> {
        self.jobs.iter().enumerate().map(|(i, job)| (i + 1, job))
    }
}

/// Send `SIGCONT` to `pid`.
#[cfg(unix)]
pub fn continue_process(pid: u32) -> Result<()> {
    let pid = libc::pid_t::try_from(pid)?;
    // SAFETY: kill has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGCONT) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error().into());
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn continue_process(_pid: u32) -> Result<()> {
    anyhow::bail!("job control signals are not supported on this platform")
}
