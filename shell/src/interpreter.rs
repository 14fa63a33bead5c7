use crate::builtin::CommandFactory;
use crate::command::{Command, ExitCode, Stdin};
use crate::completion::ShellHelper;
use crate::env::Environment;
use crate::external::{self, Redirections};
use crate::job::Job;
use crate::lexer;
use crate::parser;
use crate::state::{ShellConfig, ShellState};
use anyhow::Result;
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, Stdio};
use std::sync::mpsc;
use std::thread;

const PROMPT: &str = "ccsh> ";

/// Factory allows creating instances of a builtin.
///
/// The interpreter holds one factory per builtin type and asks each in turn.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The command interpreter: shell state plus the streams it reports to.
///
/// Lines go through alias substitution, tokenizing and parsing before
/// [`Interpreter::execute`] runs them as a builtin, a single external
/// command or a pipeline.
///
/// Example
/// ```
/// use ccsh::{Interpreter, MemWriter};
/// let (out, buf) = MemWriter::with_handle();
/// let mut sh = Interpreter::in_memory(Box::new(out), Box::new(std::io::sink()));
/// sh.run_line("alias hi echo hello");
/// sh.run_line("hi world");
/// assert_eq!(buf.borrow().as_slice(), b"hello world\n");
/// ```
pub struct Interpreter {
    pub(crate) state: ShellState,
    builtins: Vec<Box<dyn CommandFactory>>,
    pub(crate) out: Box<dyn Write>,
    pub(crate) err: Box<dyn Write>,
}

impl Interpreter {
    /// Create an interpreter writing to the process's stdout and stderr,
    /// loading aliases and history from the files named in `config`.
    pub fn new(config: &ShellConfig) -> Result<Self> {
        let mut out: Box<dyn Write> = Box::new(io::stdout());
        let state = ShellState::load(config, Environment::new(), &mut out)?;
        Ok(Self::with_state(state, out, Box::new(io::stderr())))
    }

    /// An interpreter with no persistence, reporting to the given streams.
    pub fn in_memory(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self::with_state(ShellState::in_memory(Environment::new()), out, err)
    }

    pub fn with_state(state: ShellState, out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            state,
            builtins: Self::default_builtins(),
            out,
            err,
        }
    }

    fn default_builtins() -> Vec<Box<dyn CommandFactory>> {
        use crate::builtin::*;
        vec![
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<History>::default()),
            Box::new(Factory::<Alias>::default()),
            Box::new(Factory::<Unalias>::default()),
            Box::new(Factory::<Jobs>::default()),
            Box::new(Factory::<Fg>::default()),
            Box::new(Factory::<Bg>::default()),
            Box::new(Factory::<Source>::default()),
        ]
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ShellState {
        &mut self.state
    }

    /// Whether `exit` has been run.
    pub fn should_exit(&self) -> bool {
        self.state.env.should_exit
    }

    /// Interactive read-eval-print loop on the terminal.
    ///
    /// Returns when the user runs `exit` or closes the input.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::new()?;
        rl.set_helper(Some(ShellHelper::new(self.state.aliases.names())));
        for entry in self.state.history.entries() {
            rl.add_history_entry(entry.as_str())?;
        }

        loop {
            match rl.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(line)?;
                    if let Err(e) = self.state.history.add(line) {
                        self.diagnostic(format_args!("Error: {e:#}"));
                    }
                    self.run_line(line);
                    if let Some(helper) = rl.helper_mut() {
                        helper.set_aliases(self.state.aliases.names());
                    }
                    if self.should_exit() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    writeln!(self.out, "^C")?;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err),
            }
        }

        writeln!(self.out, "Exiting ccsh")?;
        self.out.flush()?;
        Ok(())
    }

    /// Substitute aliases in `line`, parse it and execute the result.
    pub fn run_line(&mut self, line: &str) {
        let resolved = self.state.aliases.resolve(line);
        let tokens = lexer::tokenize(&resolved);
        if tokens.is_empty() {
            return;
        }
        let cmd = parser::parse(tokens, &self.state.env);
        tracing::debug!(?cmd, "parsed line");
        if cmd.name.is_empty() && !cmd.is_pipeline() {
            return;
        }
        self.execute(&cmd);
    }

    /// Run a parsed command. Failures are reported on the error stream and
    /// never returned.
    pub fn execute(&mut self, cmd: &Command) {
        let result = if cmd.is_pipeline() {
            self.execute_pipeline(cmd)
        } else {
            self.execute_single(cmd)
        };
        if let Err(e) = result {
            self.diagnostic(format_args!("Error: {e:#}"));
        }
        if let Err(e) = self.out.flush() {
            tracing::warn!("can't flush output: {e}");
        }
    }

    /// Run `name` as a builtin if it is one. Returns whether it was handled.
    pub fn try_builtin(&mut self, name: &str, args: &[String]) -> bool {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let Some(cmd) = self
            .builtins
            .iter()
            .find_map(|factory| factory.try_create(name, &args))
        else {
            return false;
        };
        match cmd.execute(self) {
            Ok(code) => tracing::debug!(name, code, "builtin finished"),
            Err(e) => tracing::warn!(name, "builtin could not write its output: {e:#}"),
        }
        true
    }

    fn execute_single(&mut self, cmd: &Command) -> Result<()> {
        if self.try_builtin(&cmd.name, &cmd.args) {
            return Ok(());
        }

        let redirections = Redirections::open(
            cmd.input.as_deref(),
            cmd.output.as_deref(),
            cmd.append_output,
        )?;
        self.out.flush()?;
        let mut child = external::spawn_host_shell(cmd, &self.state.env, redirections)?;

        if cmd.background {
            let pid = child.id();
            let index = self.state.jobs.push(Job::running(pid, &cmd.name));
            tracing::debug!(pid, index, name = %cmd.name, "started background job");
            writeln!(self.out, "[{index}] {pid}")?;
            return Ok(());
        }

        let code = external::exit_code(child.wait()?);
        if code != 0 {
            self.diagnostic(format_args!("Command exited with code {code}"));
        }
        Ok(())
    }

    fn execute_pipeline(&mut self, cmd: &Command) -> Result<()> {
        let stages: Vec<&Command> = cmd.stages().collect();
        let last_index = stages.len() - 1;
        let first = stages[0];
        let last = stages[last_index];
        if cmd.background {
            tracing::debug!("background flag ignored for pipeline");
        }

        let Redirections { input, output } = Redirections::open(
            first.input.as_deref(),
            last.output.as_deref(),
            last.append_output,
        )?;
        self.out.flush()?;

        let mut upstream: Option<Box<dyn Stdin>> = Some(match input {
            Some(file) => Box::new(file),
            None => Box::new(InheritedStdin),
        });
        let mut output = output;
        let mut earlier: Vec<Child> = Vec::new();
        let mut last_child = None;

        for (i, stage) in stages.iter().enumerate() {
            let is_last = i == last_index;
            let stdin = upstream.take().map_or_else(Stdio::null, |s| s.stdio());
            let (stdout, stderr) = if is_last {
                let stdout = output.take().map_or_else(Stdio::piped, Stdio::from);
                (stdout, Stdio::piped())
            } else {
                (Stdio::piped(), Stdio::inherit())
            };

            match external::spawn_stage(stage, &self.state.env, stdin, stdout, stderr) {
                Ok(mut child) if !is_last => {
                    upstream = child
                        .stdout
                        .take()
                        .map(|out| Box::new(out) as Box<dyn Stdin>);
                    earlier.push(child);
                }
                Ok(child) => last_child = Some(child),
                Err(e) => self.diagnostic(format_args!("ccsh: {}: {e:#}", stage.name)),
            }
        }

        if let Some(child) = last_child {
            let code = self.drain_last_stage(child)?;
            if code != 0 {
                self.diagnostic(format_args!("Pipeline exited with code {code}"));
            }
        }

        for mut child in earlier {
            if let Err(e) = child.wait() {
                tracing::warn!(pid = child.id(), "can't reap pipeline stage: {e}");
            }
        }
        Ok(())
    }

    /// Stream the last stage's output into the interpreter's streams and wait
    /// for it to exit.
    ///
    /// Both pipes are read on helper threads; chunks are written to `out` or
    /// `err` on this thread in the order they arrive.
    fn drain_last_stage(&mut self, mut child: Child) -> Result<ExitCode> {
        let (tx, rx) = mpsc::channel();
        let mut readers = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_chunks(stdout, Stream::Out, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_chunks(stderr, Stream::Err, tx.clone()));
        }
        drop(tx);

        for (stream, chunk) in rx {
            match stream {
                Stream::Out => self.out.write_all(&chunk)?,
                Stream::Err => {
                    self.err.write_all(&chunk)?;
                    self.err.flush()?;
                }
            }
        }
        for reader in readers {
            if reader.join().is_err() {
                tracing::warn!("pipe reader thread panicked");
            }
        }
        Ok(external::exit_code(child.wait()?))
    }

    /// Report a problem on the error stream.
    pub(crate) fn diagnostic(&mut self, message: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.err, "{message}") {
            tracing::warn!("can't write diagnostic `{message}`: {e}");
        }
    }
}

impl Default for Interpreter {
    /// An in-memory interpreter on the process's stdout and stderr.
    fn default() -> Self {
        Self::in_memory(Box::new(io::stdout()), Box::new(io::stderr()))
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Out,
    Err,
}

/// Read `pipe` until EOF on a new thread, sending each chunk down `tx`.
fn forward_chunks(
    mut pipe: impl Read + Send + 'static,
    stream: Stream,
    tx: mpsc::Sender<(Stream, Vec<u8>)>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = [0u8; 8192];
        loop {
            match pipe.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send((stream, buf[..n].to_vec())).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(?stream, "can't read from pipeline stage: {e}");
                    break;
                }
            }
        }
    })
}

/// The interpreter's own stdin, handed to the first pipeline stage.
struct InheritedStdin;

impl Read for InheritedStdin {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::stdin().read(buf)
    }
}

impl Stdin for InheritedStdin {
    fn stdio(self: Box<Self>) -> Stdio {
        Stdio::inherit()
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::testing::captured;
    use crate::command::Command;
    use std::fs;

    #[test]
    fn pipeline_streams_between_stages() {
        let mut c = captured();
        c.sh.run_line("printf 'b\\na\\nc\\n' | sort | head -n 2");
        assert_eq!(c.out(), "a\nb\n");
        assert_eq!(c.err(), "");
    }

    #[test]
    fn pipeline_redirections_apply_to_first_and_last_stage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "pear\napple\nplum\n").unwrap();

        let mut c = captured();
        c.sh.run_line(&format!(
            "grep p < {} | sort > {}",
            input.display(),
            output.display()
        ));
        assert_eq!(fs::read_to_string(&output).unwrap(), "apple\npear\nplum\n");
        assert_eq!(c.out(), "");

        c.sh.run_line(&format!(
            "sort < {} | head -n 1 >> {}",
            input.display(),
            output.display()
        ));
        assert_eq!(
            fs::read_to_string(&output).unwrap(),
            "apple\npear\nplum\napple\n"
        );
    }

    #[test]
    fn missing_middle_stage_does_not_hang() {
        let mut c = captured();
        c.sh.run_line("printf 'x\\n' | ccsh-no-such-program | wc -l");
        assert!(
            c.err().contains("ccsh: ccsh-no-such-program: command not found"),
            "{}",
            c.err()
        );
        assert_eq!(c.out().trim(), "0");
    }

    #[test]
    fn missing_last_stage_is_reported() {
        let mut c = captured();
        c.sh.run_line("yes | ccsh-no-such-program");
        assert!(c.err().contains("ccsh-no-such-program: command not found"));
    }

    #[test]
    fn pipeline_exit_code_of_last_stage_is_reported() {
        let mut c = captured();
        c.sh.run_line("true | false");
        assert_eq!(c.err(), "Pipeline exited with code 1\n");
    }

    #[test]
    fn last_stage_stderr_reaches_error_stream() {
        let mut c = captured();
        c.sh.run_line("true | ls /ccsh/surely/not/here");
        assert!(c.err().contains("/ccsh/surely/not/here"));
        assert!(c.err().contains("Pipeline exited with code"));
    }

    #[test]
    fn last_stage_stderr_is_written_while_stage_runs() {
        use super::Interpreter;
        use std::cell::RefCell;
        use std::io::{self, Write};
        use std::rc::Rc;
        use std::time::{Duration, Instant};

        struct FirstWrite(Rc<RefCell<Option<Instant>>>);

        impl Write for FirstWrite {
            fn write(&mut self, data: &[u8]) -> io::Result<usize> {
                self.0.borrow_mut().get_or_insert_with(Instant::now);
                Ok(data.len())
            }

            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let first_err = Rc::new(RefCell::new(None));
        let mut sh = Interpreter::in_memory(
            Box::new(io::sink()),
            Box::new(FirstWrite(first_err.clone())),
        );
        sh.run_line("true | sh -c 'echo early >&2; sleep 1; echo late'");
        let finished = Instant::now();

        let first = (*first_err.borrow()).expect("stderr was written");
        assert!(
            finished.duration_since(first) >= Duration::from_millis(500),
            "stderr arrived only at exit"
        );
    }

    #[test]
    fn single_command_writes_to_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let mut c = captured();

        c.sh.run_line(&format!("printf hello > {}", output.display()));
        c.sh.run_line(&format!("printf world >> {}", output.display()));
        assert_eq!(fs::read_to_string(&output).unwrap(), "helloworld");
        assert_eq!(c.err(), "");
    }

    #[test]
    fn single_command_reads_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        fs::write(&input, "3\n1\n2\n").unwrap();

        let mut c = captured();
        c.sh.run_line(&format!("sort < {} > {}", input.display(), output.display()));
        assert_eq!(fs::read_to_string(&output).unwrap(), "1\n2\n3\n");
    }

    #[test]
    fn host_shell_operators_still_work() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let mut c = captured();
        c.sh.run_line(&format!("true && printf ok > {}", output.display()));
        assert_eq!(fs::read_to_string(&output).unwrap(), "ok");
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let mut c = captured();
        c.sh.run_line("exit-is-a-builtin-but-this-is-not 2>/dev/null");
        assert_eq!(c.err(), "Command exited with code 127\n");
    }

    #[test]
    fn missing_input_file_is_reported_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let mut c = captured();
        c.sh.run_line(&format!(
            "cat < {}/missing.txt > {}",
            dir.path().display(),
            output.display()
        ));
        assert!(c.err().starts_with("Error: "), "{}", c.err());
        assert!(c.err().contains("missing.txt"));
        assert!(!output.exists());
    }

    #[test]
    fn background_command_is_recorded_as_job() {
        let mut c = captured();
        c.sh.run_line("sleep 1 &");

        let jobs: Vec<_> = c.sh.state.jobs.iter().map(|(i, j)| (i, j.clone())).collect();
        assert_eq!(jobs.len(), 1);
        let (index, job) = &jobs[0];
        assert_eq!(*index, 1);
        assert_eq!(job.command, "sleep");
        assert_eq!(c.out(), format!("[1] {}\n", job.pid));

        c.sh.run_line("jobs");
        assert!(c.out().ends_with(&format!("[1] running sleep ({})\n", job.pid)));
    }

    #[test]
    fn builtins_ignore_redirections() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        let mut c = captured();
        c.sh.run_line(&format!("echo hi > {}", output.display()));
        assert_eq!(c.out(), "hi\n");
        assert!(!output.exists());
    }

    #[test]
    fn aliases_are_substituted_before_parsing() {
        let mut c = captured();
        c.sh.run_line("alias greet echo hello");
        c.sh.run_line("greet there");
        assert_eq!(c.out(), "hello there\n");
    }

    #[test]
    fn variables_are_expanded_in_arguments() {
        let mut c = captured();
        c.sh.state.env.set_var("CCSH_I_WHO", "you");
        c.sh.run_line("echo hi $CCSH_I_WHO");
        assert_eq!(c.out(), "hi you\n");
    }

    #[test]
    fn execute_accepts_prebuilt_commands() {
        let mut c = captured();
        c.sh.execute(&Command {
            name: "echo".into(),
            args: vec!["direct".into()],
            ..Default::default()
        });
        assert_eq!(c.out(), "direct\n");
    }
}
