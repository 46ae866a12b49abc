//! Minification options.
//!
//! Options are read from a JSON document whose top-level keys are camelCase
//! (`sourceMap`, `workers`, ...). Pass-through sections for the transform
//! engine (`compress`, `mangle`, `output`) keep the engine's snake_case keys.

use crate::error::{ParminError, Result};
use crate::matcher::{AssetMatcher, Condition, Rule};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Comments kept by default: `/*!`, `@preserve`, and `@license` blocks.
pub const DEFAULT_COMMENTS: &str = r"/^\**!|@preserve|@license/";

/// A pass that is either switched off with `false`, switched on with `true`
/// (default settings), or configured with an options object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Toggle<T> {
    Enabled(bool),
    Options(T),
}

impl<T> Default for Toggle<T> {
    fn default() -> Self {
        Self::Enabled(true)
    }
}

impl<T: Default + Clone> Toggle<T> {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Enabled(false))
    }

    /// Effective settings, or `None` when the pass is disabled.
    pub fn settings(&self) -> Option<T> {
        match self {
            Self::Enabled(false) => None,
            Self::Enabled(true) => Some(T::default()),
            Self::Options(options) => Some(options.clone()),
        }
    }
}

/// Settings for the compression pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    /// Remove `debugger;` statements.
    pub drop_debugger: bool,
    /// Remove `console.*(...)` calls.
    pub drop_console: bool,
    /// Report what the pass dropped.
    pub warnings: bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            drop_debugger: true,
            drop_console: false,
            warnings: true,
        }
    }
}

/// Settings for property-name shortening.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PropsOptions {
    /// Only properties matching this rule are renamed (`_`-prefixed ones when
    /// absent).
    pub regex: Option<Rule>,
    /// Property names that are never renamed.
    pub reserved: Vec<String>,
}

/// Settings for the name-shortening pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MangleOptions {
    /// Also rename top-level bindings. Off by default since a script's
    /// top-level names are globals.
    pub toplevel: bool,
    /// Enables property-name shortening.
    pub props: Option<PropsOptions>,
}

/// How comments survive printing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CommentsRepr", into = "CommentsRepr")]
pub enum CommentPolicy {
    /// Strip every comment.
    None,
    /// Keep every comment.
    All,
    /// Keep `@preserve`, `@license`, and `@cc_on` comments.
    Some,
    /// Keep comments whose text matches the rule.
    Matching(Rule),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CommentsRepr {
    Flag(bool),
    Text(String),
}

impl TryFrom<CommentsRepr> for CommentPolicy {
    type Error = ParminError;

    fn try_from(repr: CommentsRepr) -> Result<Self> {
        Ok(match repr {
            CommentsRepr::Flag(false) => Self::None,
            CommentsRepr::Flag(true) => Self::All,
            CommentsRepr::Text(text) => match text.as_str() {
                "all" => Self::All,
                "some" => Self::Some,
                _ => Self::Matching(Rule::parse(&text)?),
            },
        })
    }
}

impl From<CommentPolicy> for CommentsRepr {
    fn from(policy: CommentPolicy) -> Self {
        match policy {
            CommentPolicy::None => Self::Flag(false),
            CommentPolicy::All => Self::Flag(true),
            CommentPolicy::Some => Self::Text("some".into()),
            CommentPolicy::Matching(rule) => Self::Text(rule.into()),
        }
    }
}

impl Default for CommentPolicy {
    fn default() -> Self {
        // The literal is a compile-time constant known to be valid.
        Self::Matching(Rule::parse(DEFAULT_COMMENTS).expect("default comment pattern is valid"))
    }
}

impl CommentPolicy {
    /// Decide whether a comment with body `text` (delimiters stripped) is kept.
    pub fn keeps(&self, text: &str) -> bool {
        match self {
            Self::None => false,
            Self::All => true,
            Self::Some => ["@preserve", "@license", "@cc_on"]
                .iter()
                .any(|tag| text.contains(tag)),
            Self::Matching(rule) => match rule.regex() {
                Some(regex) => regex.is_match(text),
                None => text.contains(&rule.to_string()),
            },
        }
    }
}

/// Overrides applied to the printing stage after `beautify`/`comments`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    pub beautify: Option<bool>,
    pub comments: Option<CommentPolicy>,
    /// Printed on its own line above the code.
    pub preamble: Option<String>,
}

/// Resolved printing settings.
#[derive(Debug, Clone)]
pub struct PrintOptions {
    pub beautify: bool,
    pub comments: CommentPolicy,
    pub preamble: Option<String>,
}

/// The per-job part of the options, shipped to workers inside each job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformOptions {
    #[serde(alias = "compressor")]
    pub compress: Toggle<CompressOptions>,
    pub mangle: Toggle<MangleOptions>,
    pub source_map: bool,
    pub beautify: bool,
    pub comments: Option<CommentPolicy>,
    pub output: OutputOptions,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            compress: Toggle::default(),
            mangle: Toggle::default(),
            source_map: true,
            beautify: false,
            comments: None,
            output: OutputOptions::default(),
        }
    }
}

impl TransformOptions {
    /// Merge `beautify`/`comments` with the `output` overrides.
    pub fn print_options(&self) -> PrintOptions {
        PrintOptions {
            beautify: self.output.beautify.unwrap_or(self.beautify),
            comments: self
                .output
                .comments
                .clone()
                .or_else(|| self.comments.clone())
                .unwrap_or_default(),
            preamble: self.output.preamble.clone(),
        }
    }
}

fn default_workers() -> usize {
    1
}

/// Full coordinator configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinifyOptions {
    #[serde(default)]
    pub test: Condition,
    #[serde(default)]
    pub include: Option<Condition>,
    #[serde(default)]
    pub exclude: Option<Condition>,
    /// Maximum number of worker processes.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(flatten)]
    pub transform: TransformOptions,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            test: Condition::default(),
            include: None,
            exclude: None,
            workers: default_workers(),
            transform: TransformOptions::default(),
        }
    }
}

impl MinifyOptions {
    /// Parse options from a JSON string and validate them.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(ParminError::Config("workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn source_map(&self) -> bool {
        self.transform.source_map
    }

    pub fn matcher(&self) -> AssetMatcher {
        AssetMatcher {
            test: self.test.clone(),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        }
    }
}
