//! Glob-style key patterns.

use regex::Regex;
use skillforge_core::cache::CacheError;

/// Characters with a meaning in a key pattern.
const GLOB_SPECIAL: [char; 5] = ['*', '?', '[', ']', '\\'];

/// Escapes `literal` so that it only matches itself when embedded in a
/// pattern.
#[must_use]
pub fn escape_glob(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if GLOB_SPECIAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// A compiled key pattern using Redis `MATCH` syntax: `*` matches any run of
/// characters, `?` matches one character, `[abc]`, `[^abc]` and `[a-z]`
/// match one character of a class and `\x` matches `x` literally. An
/// unterminated or empty class is literal text. The memory and Redis
/// providers therefore agree on which keys a pattern selects.
#[derive(Debug, Clone)]
pub struct KeyPattern {
    raw: String,
    regex: Regex,
}

impl KeyPattern {
    /// Compiles a pattern.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::InvalidPattern` for an empty pattern.
    pub fn new(pattern: &str) -> Result<Self, CacheError> {
        if pattern.is_empty() {
            return Err(CacheError::InvalidPattern {
                pattern: pattern.to_owned(),
                reason: "pattern must not be empty".to_owned(),
            });
        }

        let regex = Regex::new(&translate(pattern)).map_err(|e| CacheError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            raw: pattern.to_owned(),
            regex,
        })
    }

    /// Returns true if `key` is selected by this pattern.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    /// The pattern as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                source.push_str(&literal(chars[i]));
            }
            '[' => match class(&chars[i + 1..]) {
                Some((class, consumed)) => {
                    source.push_str(&class);
                    i += consumed;
                }
                None => source.push_str(&literal('[')),
            },
            other => source.push_str(&literal(other)),
        }
        i += 1;
    }
    source.push('$');
    source
}

fn literal(ch: char) -> String {
    regex::escape(ch.encode_utf8(&mut [0; 4]))
}

/// Translates the class starting right after a `[`. Returns the regex class
/// and the number of characters consumed up to and including the closing `]`.
fn class(rest: &[char]) -> Option<(String, usize)> {
    let negated = rest.first() == Some(&'^');
    let mut body = String::new();
    let mut i = usize::from(negated);
    while i < rest.len() {
        let mut lo = rest[i];
        if lo == ']' {
            if body.is_empty() {
                return None;
            }
            let open = if negated { "[^" } else { "[" };
            return Some((format!("{open}{body}]"), i + 1));
        }
        if lo == '\\' && i + 1 < rest.len() {
            i += 1;
            lo = rest[i];
        }
        if rest.get(i + 1) == Some(&'-') && rest.get(i + 2).is_some_and(|c| *c != ']') {
            let mut hi_at = i + 2;
            if rest[hi_at] == '\\' && hi_at + 1 < rest.len() {
                hi_at += 1;
            }
            let hi = rest[hi_at];
            let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
            body.push_str(&literal(lo));
            body.push('-');
            body.push_str(&literal(hi));
            i = hi_at + 1;
        } else {
            body.push_str(&literal(lo));
            i += 1;
        }
    }
    None
}
