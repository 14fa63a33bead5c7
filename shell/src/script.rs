//! Script files: plain command lines plus `if`/`for`/`while` blocks.
//!
//! Only `if` blocks run. A block opens on a line whose first word is a block
//! keyword and closes on the first line whose first word is `fi` or `done`,
//! or at the end of the file. Blocks do not nest.

use crate::external;
use crate::interpreter::Interpreter;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopKind {
    For,
    While,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoopKind::For => "for",
            LoopKind::While => "while",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    If {
        /// Arguments for `test`.
        condition: String,
        body: Vec<String>,
    },
    /// Recognized but never executed. `raw` holds every line of the block.
    Loop { kind: LoopKind, raw: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptItem {
    Line(String),
    Block(Block),
}

fn first_word(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

fn is_block_end(line: &str) -> bool {
    matches!(first_word(line), "fi" | "done")
}

/// Split script text into command lines and blocks.
pub fn scan(content: &str) -> Vec<ScriptItem> {
    let mut items = Vec::new();
    let mut lines = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));

    while let Some(line) = lines.next() {
        let kind = match first_word(line) {
            "if" => None,
            "for" => Some(LoopKind::For),
            "while" => Some(LoopKind::While),
            _ => {
                items.push(ScriptItem::Line(line.to_string()));
                continue;
            }
        };

        let mut inner = Vec::new();
        let mut closed = false;
        for next in lines.by_ref() {
            if is_block_end(next) {
                closed = true;
                break;
            }
            inner.push(next.to_string());
        }
        if !closed {
            tracing::debug!(opener = line, "block runs to end of script");
        }

        let block = match kind {
            None => Block::If {
                condition: line
                    .split_once(char::is_whitespace)
                    .map_or("", |(_, rest)| rest)
                    .trim()
                    .to_string(),
                body: inner,
            },
            Some(kind) => {
                let mut raw = vec![line.to_string()];
                raw.extend(inner);
                Block::Loop { kind, raw }
            }
        };
        items.push(ScriptItem::Block(block));
    }
    items
}

impl Interpreter {
    /// Run the script at `path`, relative to the shell's working directory.
    pub fn run_script(&mut self, path: &Path) {
        let path = self.state.env.current_dir.join(path);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                self.diagnostic(format_args!("Error executing script: {e}"));
                return;
            }
        };
        tracing::debug!(path = %path.display(), "running script");

        for item in scan(&content) {
            if self.should_exit() {
                break;
            }
            match item {
                ScriptItem::Line(line) => self.run_line(&line),
                ScriptItem::Block(block) => self.run_block(block),
            }
        }
    }

    fn run_block(&mut self, block: Block) {
        match block {
            Block::If { condition, body } => {
                match external::test_condition(&condition, &self.state.env) {
                    Ok(true) => {
                        for line in body {
                            if self.should_exit() {
                                break;
                            }
                            self.run_line(&line);
                        }
                    }
                    Ok(false) => tracing::debug!(%condition, "condition false, skipping block"),
                    Err(e) => self.diagnostic(format_args!("Error: {e:#}")),
                }
            }
            Block::Loop { kind, .. } => {
                self.diagnostic(format_args!(
                    "{kind} loops are not implemented in this basic version"
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_skips_comments_and_blank_lines() {
        let items = scan("# header\n\n  echo a  \n#echo b\necho c\n");
        assert_eq!(
            items,
            [
                ScriptItem::Line("echo a".into()),
                ScriptItem::Line("echo c".into()),
            ]
        );
    }

    #[test]
    fn scan_collects_if_block() {
        let items = scan("if [ -d /tmp ]\n  echo yes\n  pwd\nfi\necho after\n");
        assert_eq!(
            items,
            [
                ScriptItem::Block(Block::If {
                    condition: "[ -d /tmp ]".into(),
                    body: vec!["echo yes".into(), "pwd".into()],
                }),
                ScriptItem::Line("echo after".into()),
            ]
        );
    }

    #[test]
    fn scan_collects_loops_raw() {
        let items = scan("for i in 1 2\ndo\necho $i\ndone\nwhile true\ndone\n");
        assert_eq!(
            items,
            [
                ScriptItem::Block(Block::Loop {
                    kind: LoopKind::For,
                    raw: vec!["for i in 1 2".into(), "do".into(), "echo $i".into()],
                }),
                ScriptItem::Block(Block::Loop {
                    kind: LoopKind::While,
                    raw: vec!["while true".into()],
                }),
            ]
        );
    }

    #[test]
    fn condition_follows_any_whitespace_after_if() {
        let items = scan("if\t1 -eq 1\necho a\nfi\n");
        assert_eq!(
            items,
            [ScriptItem::Block(Block::If {
                condition: "1 -eq 1".into(),
                body: vec!["echo a".into()],
            })]
        );
    }

    #[test]
    fn keywords_must_be_whole_words() {
        let items = scan("ifconfig -a\nformat disk\nfinish\n");
        assert!(items.iter().all(|item| matches!(item, ScriptItem::Line(_))));
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn unterminated_block_runs_to_end() {
        let items = scan("if 1 -eq 1\necho a\necho b\n");
        assert_eq!(
            items,
            [ScriptItem::Block(Block::If {
                condition: "1 -eq 1".into(),
                body: vec!["echo a".into(), "echo b".into()],
            })]
        );
    }

    #[cfg(unix)]
    mod run {
        use crate::interpreter::testing::captured;
        use std::fs;

        fn script(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
            let path = dir.path().join("script.ccsh");
            fs::write(&path, content).unwrap();
            path
        }

        #[test]
        fn if_runs_body_only_when_test_succeeds() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(
                &dir,
                "echo start\nif 1 -eq 1\necho yes\nfi\nif 1 -eq 2\necho no\nfi\necho end\n",
            );
            let mut c = captured();
            c.sh.run_script(&path);
            assert_eq!(c.out(), "start\nyes\nend\n");
            assert_eq!(c.err(), "");
        }

        #[test]
        fn loops_are_reported_and_skipped() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(&dir, "for i in 1 2\ndo\necho $i\ndone\necho after\n");
            let mut c = captured();
            c.sh.run_script(&path);
            assert_eq!(c.out(), "after\n");
            assert_eq!(
                c.err(),
                "for loops are not implemented in this basic version\n"
            );
        }

        #[test]
        fn missing_script_is_reported() {
            let dir = tempfile::tempdir().unwrap();
            let mut c = captured();
            c.sh.run_script(&dir.path().join("nope.ccsh"));
            assert!(
                c.err().starts_with("Error executing script: "),
                "{}",
                c.err()
            );
            assert_eq!(c.out(), "");
        }

        #[test]
        fn exit_stops_the_script() {
            let dir = tempfile::tempdir().unwrap();
            let path = script(&dir, "echo one\nexit\necho two\n");
            let mut c = captured();
            c.sh.run_script(&path);
            assert_eq!(c.out(), "one\n");
            assert!(c.sh.should_exit());
        }

        #[test]
        fn source_builtin_runs_relative_to_working_directory() {
            let dir = tempfile::tempdir().unwrap();
            script(&dir, "alias greet echo hi\ngreet there\n");
            let mut c = captured();
            c.sh.state.env.current_dir = dir.path().to_path_buf();
            c.sh.run_line("source script.ccsh");
            assert_eq!(c.out(), "hi there\n");
            assert_eq!(c.sh.state.aliases.get("greet"), Some("echo hi"));
        }
    }
}
