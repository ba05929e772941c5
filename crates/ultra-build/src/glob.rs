//! Glob predicates over logical paths.
//!
//! Patterns use gitignore semantics (via the `ignore` crate):
//!
//! - `./src/**/*.css` is anchored to the project root (the leading `./`
//!   becomes `/`), while `.git` or `*.map` match at any depth.
//! - `+(ts|tsx)` / `@(ts|tsx)` alternation lists are accepted and rewritten
//!   to `{ts,tsx}`.
//! - A leading `!` re-includes paths matched by an earlier pattern.

use ignore::gitignore::{Gitignore, GitignoreBuilder};

use crate::file::strip_logical;
use crate::{Error, Result};

/// A compiled set of glob patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    matcher: Gitignore,
    patterns: Vec<String>,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl PatternSet {
    /// A set that matches nothing.
    pub fn empty() -> Self {
        Self {
            matcher: Gitignore::empty(),
            patterns: Vec::new(),
        }
    }

    /// Compile `patterns`, failing on the first malformed one.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut builder = GitignoreBuilder::new("");
        let mut kept = Vec::new();

        for pattern in patterns {
            let raw = pattern.as_ref().trim();
            if raw.is_empty() {
                continue;
            }

            let line = translate(raw)?;
            builder.add_line(None, &line).map_err(|e| Error::Pattern {
                pattern: raw.to_string(),
                message: e.to_string(),
            })?;
            kept.push(raw.to_string());
        }

        let matcher = builder.build().map_err(|e| Error::Pattern {
            pattern: kept.join(", "),
            message: e.to_string(),
        })?;

        Ok(Self {
            matcher,
            patterns: kept,
        })
    }

    /// A new set containing these patterns followed by `extra`.
    pub fn with_patterns<I, S>(&self, extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut all = self.patterns.clone();
        all.extend(extra.into_iter().map(|p| p.as_ref().to_string()));
        Self::new(all)
    }

    /// The patterns as originally written.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Does the file at `logical` match?
    pub fn is_match(&self, logical: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        self.matcher.matched(strip_logical(logical), false).is_ignore()
    }

    /// Is `logical`, or any directory above it, matched?
    ///
    /// Used for exclusion: a pattern naming a directory excludes everything
    /// beneath it.
    pub fn is_excluded(&self, logical: &str, is_dir: bool) -> bool {
        let relative = strip_logical(logical);
        if self.patterns.is_empty() || relative.is_empty() {
            return false;
        }
        self.matcher
            .matched_path_or_any_parents(relative, is_dir)
            .is_ignore()
    }
}

/// Rewrite a user pattern into a gitignore line.
fn translate(raw: &str) -> Result<String> {
    let (negated, body) = match raw.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, raw),
    };

    if body.starts_with("../") || body == ".." {
        return Err(Error::Pattern {
            pattern: raw.to_string(),
            message: "patterns cannot reach outside the project root".to_string(),
        });
    }

    let anchored = match body.strip_prefix("./") {
        Some(rest) => format!("/{}", rest),
        None => body.to_string(),
    };

    let translated = rewrite_alternations(&anchored).map_err(|message| Error::Pattern {
        pattern: raw.to_string(),
        message,
    })?;

    Ok(if negated {
        format!("!{}", translated)
    } else {
        translated
    })
}

/// `*.+(ts|tsx)` → `*.{ts,tsx}`
fn rewrite_alternations(pattern: &str) -> std::result::Result<String, String> {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();

    while let Some(c) = chars.next() {
        if (c == '+' || c == '@') && chars.peek() == Some(&'(') {
            chars.next();
            let mut group = String::new();
            let mut closed = false;
            for inner in chars.by_ref() {
                match inner {
                    ')' => {
                        closed = true;
                        break;
                    }
                    '(' => return Err("nested alternation groups are not supported".to_string()),
                    '|' => group.push(','),
                    other => group.push(other),
                }
            }
            if !closed {
                return Err(format!("unclosed '{}(' group", c));
            }
            out.push('{');
            out.push_str(&group);
            out.push('}');
        } else {
            out.push(c);
        }
    }

    Ok(out)
}
