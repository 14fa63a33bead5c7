use argh::FromArgs;
use ccsh::env::Environment;
use ccsh::{Interpreter, ShellConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// ccsh: an interactive command interpreter.
struct Args {
    #[argh(positional)]
    /// script to run instead of starting the prompt.
    script: Option<PathBuf>,

    #[argh(option)]
    /// alias file to use instead of ~/.ccshrc.
    rc: Option<PathBuf>,

    #[argh(option)]
    /// history file to use instead of ~/.ccsh_history.
    history_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CCSH_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = ShellConfig::from_env(&Environment::new());
    if let Some(rc) = args.rc {
        config.rc_path = Some(rc);
    }
    if let Some(history) = args.history_file {
        config.history_path = Some(history);
    }

    let mut sh = match Interpreter::new(&config) {
        Ok(sh) => sh,
        Err(e) => {
            tracing::warn!("can't load shell files: {e:#}");
            Interpreter::default()
        }
    };

    if let Some(script) = args.script {
        sh.run_script(&script);
        return ExitCode::SUCCESS;
    }

    match sh.repl() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ccsh: {e}");
            ExitCode::FAILURE
        }
    }
}
