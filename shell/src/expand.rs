//! `$NAME` substitution for argument tokens.

use crate::env::Environment;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static VARIABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$(\w+)").expect("variable pattern is valid"));

/// Replace every `$NAME` in `token` with the variable's value, or with the
/// empty string when it is unset.
pub fn expand(token: &str, env: &Environment) -> String {
    VARIABLE
        .replace_all(token, |caps: &Captures<'_>| {
            env.get_var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}
