//! Ordered pattern rules that map program text to canonical symbols.
//!
//! Rules are tried in insertion order and the first one whose pattern matches the *whole* text
//! (ignoring case) wins. That lets a rule set list specific keywords before generic catch-alls
//! like "any number", and lets one symbol carry many spellings (`forward|fd`, `avance|av`).

use regex::{Regex, RegexBuilder};

use crate::{error::Error, lang};

#[derive(Clone, Debug)]
struct Rule {
    symbol: String,
    pattern: Regex,
}

impl Rule {
    fn new(symbol: impl Into<String>, pattern: &str) -> Result<Rule, Error> {
        let symbol = symbol.into();
        let pattern = RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
            .map_err(|source| Error::BadPattern {
                key: symbol.clone(),
                source,
            })?;
        Ok(Rule { symbol, pattern })
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

#[derive(Clone, Debug, Default)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new() -> Classifier {
        Classifier::default()
    }

    /// A classifier holding just the rules of one rule set.
    pub fn with_patterns(rule_set: &str) -> Result<Classifier, Error> {
        let mut ret = Classifier::new();
        ret.add_patterns(rule_set)?;
        Ok(ret)
    }

    /// Appends every rule of `rule_set` (a built-in language name or a rule file).
    ///
    /// An empty name, or one that names nothing, adds no rules.
    pub fn add_patterns(&mut self, rule_set: &str) -> Result<(), Error> {
        let rules = compile(rule_set)?;
        log::debug!("adding {} rules from {rule_set:?}", rules.len());
        self.rules.extend(rules);
        Ok(())
    }

    /// Replaces the whole table with the rules of `rule_set`. On error the table is unchanged.
    pub fn set_patterns(&mut self, rule_set: &str) -> Result<(), Error> {
        self.rules = compile(rule_set)?;
        log::debug!("using {} rules from {rule_set:?}", self.rules.len());
        Ok(())
    }

    /// Appends rules given as `(symbol, pattern)` pairs. If any pattern is invalid, nothing is
    /// added.
    pub fn add_rules<K, V>(&mut self, rules: impl IntoIterator<Item = (K, V)>) -> Result<(), Error>
    where
        K: Into<String>,
        V: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .map(|(k, v)| Rule::new(k, v.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.rules.extend(rules);
        Ok(())
    }

    pub fn get_symbol(&self, text: &str) -> Result<&str, Error> {
        let rule = self
            .rules
            .iter()
            .find(|rule| rule.matches(text))
            .ok_or_else(|| Error::UnknownKeyword {
                text: text.to_owned(),
                pos: None,
            })?;
        log::trace!("{text:?} is {}", rule.symbol());
        Ok(rule.symbol())
    }

    pub fn contains_string(&self, text: &str) -> bool {
        self.get_symbol(text).is_ok()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn compile(rule_set: &str) -> Result<Vec<Rule>, Error> {
    let Some(source) = lang::load(rule_set)? else {
        return Ok(Vec::new());
    };
    lang::parse_rules(&source)
        .map(|(k, v)| Rule::new(k, v))
        .collect()
}
