//! Asset filename matching.
//!
//! A rule written as `/pattern/flags` is a regular expression; any other
//! string is a plain prefix of the asset name. A leading slash alone does not
//! make a regex: `/static/app.js` has trailing text that is not a flag set,
//! so it stays an absolute-path prefix. Conditions accept a single rule or a
//! list, and a list matches when any of its rules does.

use crate::error::{ParminError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default `test` rule: JavaScript files, optionally with a query string.
pub const DEFAULT_TEST: &str = r"/\.js($|\?)/i";

/// Flags accepted after the closing slash.
const FLAGS: &str = "imsgyu";

/// Compile a `/pattern/flags` literal.
///
/// Returns `None` when `literal` is not written in slash form, including
/// when the text after the last slash is not made of regex flags.
pub fn compile_pattern(literal: &str) -> Option<Result<Regex>> {
    let body = literal.strip_prefix('/')?;
    let end = body.rfind('/')?;
    let (pattern, flags) = (&body[..end], &body[end + 1..]);
    if !flags.chars().all(|flag| FLAGS.contains(flag)) {
        return None;
    }

    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            // global/sticky/unicode have no meaning for a whole-string test
            _ => &mut builder,
        };
    }
    Some(builder.build().map_err(ParminError::from))
}

/// A single matching rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rule {
    source: String,
    regex: Option<Regex>,
}

impl Rule {
    /// Parse a rule from its textual form.
    pub fn parse(source: &str) -> Result<Self> {
        let regex = compile_pattern(source).transpose()?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    /// Check whether `name` satisfies this rule.
    pub fn matches(&self, name: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(name),
            None => name.starts_with(&self.source),
        }
    }

    /// The compiled expression, if this rule is a regex.
    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }
}

impl TryFrom<String> for Rule {
    type Error = ParminError;

    fn try_from(source: String) -> Result<Self> {
        Rule::parse(&source)
    }
}

impl From<Rule> for String {
    fn from(rule: Rule) -> Self {
        rule.source
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Rule),
    Many(Vec<Rule>),
}

/// One or more rules; matches when any rule matches.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "OneOrMany")]
pub struct Condition(Vec<Rule>);

impl From<OneOrMany> for Condition {
    fn from(value: OneOrMany) -> Self {
        match value {
            OneOrMany::One(rule) => Self(vec![rule]),
            OneOrMany::Many(rules) => Self(rules),
        }
    }
}

impl Condition {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self(rules)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.0.iter().any(|rule| rule.matches(name))
    }
}

/// Selects which assets of a batch are eligible for minification.
#[derive(Debug, Clone, Default)]
pub struct AssetMatcher {
    pub test: Condition,
    pub include: Option<Condition>,
    pub exclude: Option<Condition>,
}

impl Default for Condition {
    fn default() -> Self {
        // The literal is a compile-time constant known to be valid.
        Self(vec![Rule::parse(DEFAULT_TEST).expect("default test pattern is valid")])
    }
}

impl AssetMatcher {
    pub fn is_match(&self, name: &str) -> bool {
        if !self.test.matches(name) {
            return false;
        }
        if let Some(include) = &self.include
            && !include.matches(name)
        {
            return false;
        }
        if let Some(exclude) = &self.exclude
            && exclude.matches(name)
        {
            return false;
        }
        true
    }
}
