//! Rule sets: the token kinds and the instruction names of each supported language.
//!
//! A rule set is a list of `Symbol = regex` lines. Lines starting with `#` or `!` are comments.
//! The regex is taken literally after trimming, and rules keep their order from the file.

use std::{borrow::Cow, path::Path};

use crate::error::Error;

/// Built-in rule sets, by name.
pub const BUILTIN: &[(&str, &str)] = &[
    ("Syntax", include_str!("../lang/Syntax.properties")),
    ("English", include_str!("../lang/English.properties")),
    ("French", include_str!("../lang/French.properties")),
];

/// Looks up a built-in rule set. Names are case-insensitive.
pub fn builtin(name: &str) -> Option<&'static str> {
    BUILTIN
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, source)| *source)
}

/// Finds the text of a rule set, either built in or from a file.
///
/// Returns `None` for an empty name or one that is neither built in nor an existing file.
pub fn load(rule_set: &str) -> Result<Option<Cow<'static, str>>, Error> {
    let rule_set = rule_set.trim();
    if rule_set.is_empty() {
        return Ok(None);
    }
    if let Some(source) = builtin(rule_set) {
        return Ok(Some(Cow::Borrowed(source)));
    }

    let path = Path::new(rule_set);
    if !path.is_file() {
        log::warn!("no rule set named {rule_set:?}, ignoring it");
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(|s| Some(Cow::Owned(s)))
        .map_err(|source| Error::Io {
            path: path.to_owned(),
            source,
        })
}

/// Splits rule set text into `(symbol, pattern)` pairs, in order.
pub fn parse_rules(source: &str) -> impl Iterator<Item = (&str, &str)> {
    source.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            return None;
        }
        match line.split_once('=') {
            Some((key, pattern)) => Some((key.trim(), pattern.trim())),
            None => {
                log::warn!("skipping rule without a pattern: {line:?}");
                None
            }
        }
    })
}
