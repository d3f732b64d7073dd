//! Glob-style route patterns.
//!
//! `*` matches any run of characters other than `/`; `**` matches any run
//! including `/`. Matching is case-sensitive, anchored at both ends and
//! ignores the query string and fragment of the request target. Patterns
//! are compiled once into a token list and matched by advancing a set of
//! live token positions one character at a time, so the result never
//! depends on how a backtracking search happens to order its attempts.

use std::{fmt, str::FromStr, sync::Arc};

use crate::error::ConfigurationError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token {
    Char(char),
    Star,
    Globstar,
}

/// A compiled route pattern.
///
/// Two patterns compare equal when their source text is identical.
///
/// ```
/// use netcondition::pattern::RoutePattern;
///
/// let pattern: RoutePattern = "**/api/payments/**".parse().expect("valid pattern");
/// assert!(pattern.matches("https://bank.test/api/payments/42?retry=1"));
/// assert!(!pattern.matches("https://bank.test/api/balance"));
/// ```
#[derive(Clone)]
pub struct RoutePattern {
    source: Arc<str>,
    tokens: Arc<[Token]>,
}

impl RoutePattern {
    /// Compile `source` into a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptyPattern`] for an empty string,
    /// [`ConfigurationError::WildcardRun`] for three or more consecutive `*`,
    /// and [`ConfigurationError::UnsupportedCharacter`] for whitespace, `?`
    /// or `#`, none of which can appear in a matched target.
    pub fn new(source: &str) -> Result<Self, ConfigurationError> {
        if source.is_empty() {
            return Err(ConfigurationError::EmptyPattern);
        }
        let tokens = normalise(tokenise(source)?);
        Ok(Self {
            source: Arc::from(source),
            tokens: tokens.into(),
        })
    }

    /// Source text the pattern was compiled from.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.source }

    /// Whether the pattern contains no wildcard and therefore matches one exact target.
    #[must_use]
    pub fn is_literal(&self) -> bool { self.tokens.iter().all(|t| matches!(t, Token::Char(_))) }

    /// Whether the pattern is the bare `*` or `**` used to address every entry.
    #[must_use]
    pub fn is_catch_all(&self) -> bool { matches!(&*self.source, "*" | "**") }

    /// Test whether `target` matches this pattern.
    ///
    /// Anything from the first `?` or `#` onwards is ignored.
    #[must_use]
    pub fn matches(&self, target: &str) -> bool {
        let target = strip_query(target);
        let len = self.tokens.len();
        let mut live = vec![false; len + 1];
        live[0] = true;
        self.close(&mut live);

        let mut next = vec![false; len + 1];
        for c in target.chars() {
            next.fill(false);
            let mut any = false;
            for (i, token) in self.tokens.iter().enumerate() {
                if !live[i] {
                    continue;
                }
                match *token {
                    Token::Char(expected) if expected == c => {
                        next[i + 1] = true;
                        any = true;
                    }
                    Token::Star if c != '/' => {
                        next[i] = true;
                        any = true;
                    }
                    Token::Globstar => {
                        next[i] = true;
                        any = true;
                    }
                    _ => {}
                }
            }
            if !any {
                return false;
            }
            self.close(&mut next);
            std::mem::swap(&mut live, &mut next);
        }
        live[len]
    }

    /// Whether this pattern lies under `prefix` for bulk clearing.
    ///
    /// A catch-all prefix covers everything. A prefix ending in `**` covers
    /// every pattern that starts with the text before that `**`; any other
    /// prefix covers itself and patterns continuing it after a `/`.
    #[must_use]
    pub fn rooted_under(&self, prefix: &RoutePattern) -> bool {
        if prefix.is_catch_all() || self.source == prefix.source {
            return true;
        }
        match prefix.source.strip_suffix("**") {
            Some(root) => self.source.starts_with(root),
            None => self
                .source
                .strip_prefix(&*prefix.source)
                .is_some_and(|rest| rest.starts_with('/')),
        }
    }

    // Wildcards may match the empty string, so a live wildcard also makes the
    // following position live. Positions only ever propagate forwards, so a
    // single ascending pass reaches the fixpoint.
    fn close(&self, live: &mut [bool]) {
        for (i, token) in self.tokens.iter().enumerate() {
            if live[i] && matches!(token, Token::Star | Token::Globstar) {
                live[i + 1] = true;
            }
        }
    }
}

fn tokenise(source: &str) -> Result<Vec<Token>, ConfigurationError> {
    let mut tokens = Vec::with_capacity(source.len());
    let mut chars = source.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        match c {
            '*' => {
                let mut run = 1;
                while chars.next_if(|&(_, next)| next == '*').is_some() {
                    run += 1;
                }
                match run {
                    1 => tokens.push(Token::Star),
                    2 => tokens.push(Token::Globstar),
                    _ => {
                        return Err(ConfigurationError::WildcardRun {
                            pattern: source.to_owned(),
                            offset,
                        });
                    }
                }
            }
            '?' | '#' => return Err(unsupported(source, c)),
            c if c.is_whitespace() => return Err(unsupported(source, c)),
            c => tokens.push(Token::Char(c)),
        }
    }
    Ok(tokens)
}

/// Collapse `**/**` into `**` so equivalent spellings compile identically.
fn normalise(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if token == Token::Globstar
            && matches!(out.as_slice(), [.., Token::Globstar, Token::Char('/')])
        {
            out.pop();
            continue;
        }
        out.push(token);
    }
    out
}

fn unsupported(source: &str, found: char) -> ConfigurationError {
    ConfigurationError::UnsupportedCharacter {
        pattern: source.to_owned(),
        found,
    }
}

fn strip_query(target: &str) -> &str {
    target.find(['?', '#']).map_or(target, |end| &target[..end])
}

/// Compile `pattern` and test it against `target` in one step.
///
/// # Errors
///
/// Returns a [`ConfigurationError`] if `pattern` is malformed.
pub fn matches(pattern: &str, target: &str) -> Result<bool, ConfigurationError> {
    Ok(RoutePattern::new(pattern)?.matches(target))
}

impl PartialEq for RoutePattern {
    fn eq(&self, other: &Self) -> bool { self.source == other.source }
}

impl Eq for RoutePattern {}

impl std::hash::Hash for RoutePattern {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { self.source.hash(state); }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.source).finish()
    }
}

impl fmt::Display for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.source) }
}

impl FromStr for RoutePattern {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::new(s) }
}

impl TryFrom<&str> for RoutePattern {
    type Error = ConfigurationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> { Self::new(value) }
}
