use crate::builtin::BUILTIN_NAMES;
use rustyline::completion::Completer;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};

/// Completion candidates for the text typed so far: alias and builtin names
/// starting with `partial`, or all of them when none does.
pub fn candidates(aliases: &[String], partial: &str) -> Vec<String> {
    let all = aliases
        .iter()
        .map(String::as_str)
        .chain(BUILTIN_NAMES.iter().copied());
    let hits: Vec<String> = all
        .clone()
        .filter(|name| name.starts_with(partial))
        .map(str::to_string)
        .collect();
    if hits.is_empty() {
        all.map(str::to_string).collect()
    } else {
        hits
    }
}

/// Line editor helper completing alias and builtin names.
#[derive(Debug, Default)]
pub struct ShellHelper {
    aliases: Vec<String>,
}

impl ShellHelper {
    pub fn new<'a>(aliases: impl IntoIterator<Item = &'a str>) -> Self {
        let mut helper = Self::default();
        helper.set_aliases(aliases);
        helper
    }

    pub fn set_aliases<'a>(&mut self, aliases: impl IntoIterator<Item = &'a str>) {
        self.aliases = aliases.into_iter().map(str::to_string).collect();
    }
}

impl Completer for ShellHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        // Candidates replace the whole line typed so far.
        Ok((0, candidates(&self.aliases, &line[..pos])))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;

    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
