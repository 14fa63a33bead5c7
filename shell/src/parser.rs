//! Turning a token stream into a [`Command`].
//!
//! The grammar is deliberately flat: a line is a sequence of stages separated
//! by `|`, each stage is a name followed by arguments and redirections, and a
//! trailing `&` backgrounds the whole line. Nothing here can fail; tokens that
//! do not fit an operator position are treated as ordinary words.

use crate::command::Command;
use crate::env::Environment;
use crate::expand::expand;

struct CommandBuilder<'a> {
    tokens: Vec<String>,
    pos: usize,
    env: &'a Environment,
    root: Command,
    /// Index into `root.pipeline` of the stage being filled, `None` for the root itself.
    current: Option<usize>,
}

impl<'a> CommandBuilder<'a> {
    fn new(tokens: Vec<String>, env: &'a Environment) -> Self {
        Self {
            tokens,
            pos: 0,
            env,
            root: Command::default(),
            current: None,
        }
    }

    fn build(mut self) -> Command {
        while let Some(token) = self.consume() {
            let is_last = self.pos == self.tokens.len();
            match token.as_str() {
                "|" if !is_last => {
                    self.root.pipeline.push(Command::default());
                    self.current = Some(self.root.pipeline.len() - 1);
                }
                "<" => {
                    if let Some(target) = self.consume() {
                        self.stage().input = Some(target.into());
                    }
                }
                ">" | ">>" => {
                    if let Some(target) = self.consume() {
                        let stage = self.stage();
                        stage.output = Some(target.into());
                        stage.append_output = token == ">>";
                    }
                }
                "&" if is_last => self.root.background = true,
                _ => self.push_word(token),
            }
        }
        self.root
    }

    fn consume(&mut self) -> Option<String> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn stage(&mut self) -> &mut Command {
        match self.current {
            Some(i) => &mut self.root.pipeline[i],
            None => &mut self.root,
        }
    }

    /// First word of a stage is its name, the rest are expanded arguments.
    fn push_word(&mut self, word: String) {
        let env = self.env;
        let stage = self.stage();
        if stage.name.is_empty() {
            stage.name = word;
        } else {
            stage.args.push(expand(&word, env));
        }
    }
}

/// Build a [`Command`] from `tokens`, expanding `$NAME` in arguments from `env`.
pub fn parse(tokens: Vec<String>, env: &Environment) -> Command {
    CommandBuilder::new(tokens, env).build()
}
