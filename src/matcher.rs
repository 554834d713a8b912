// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Glob pattern normalization and matching
//!
//! Patterns are matched against the canonical event signature
//! `Kind:Namespace/Name:Reason(Component/Host)`. A pattern written without
//! a parenthesized source qualifier gets `(*)` appended at load time so it
//! still matches any source.

use std::sync::LazyLock;

use regex::Regex;

/// Detects a parenthesized source-qualifier group anywhere in a pattern.
static EXTENDED_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.*\(.*\)$").expect("valid pattern regex"));

/// Normalize raw config patterns: trim, drop blanks, append `(*)` to any
/// pattern lacking a parenthesized group. Runs once at configuration load,
/// never per event.
pub fn normalize(raw: &[String]) -> Vec<String> {
    raw.iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| {
            if EXTENDED_PATTERN.is_match(p) {
                p.to_string()
            } else {
                format!("{}(*)", p)
            }
        })
        .collect()
}

/// True iff the signature matches at least one pattern.
pub fn matches_any(signature: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| glob_match(p, signature))
}

/// One pre-parsed unit of a glob pattern.
enum Unit {
    Literal(char),
    /// `?` - exactly one character
    Any,
    /// `*` - any run of characters
    Star,
    /// `[...]` / `[!...]` - character class
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Unit {
    fn matches(&self, c: char) -> bool {
        match self {
            Unit::Literal(l) => *l == c,
            Unit::Any => true,
            Unit::Star => false,
            Unit::Class { negated, ranges } => {
                let hit = ranges.iter().any(|&(lo, hi)| c >= lo && c <= hi);
                hit != *negated
            }
        }
    }
}

/// Tokenize a glob pattern. An unclosed `[` degrades to a literal bracket
/// rather than an error, so malformed patterns simply fail to match.
fn parse_pattern(pattern: &str) -> Vec<Unit> {
    let chars: Vec<char> = pattern.chars().collect();
    let mut units = Vec::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => units.push(Unit::Star),
            '?' => units.push(Unit::Any),
            '[' => match parse_class(&chars, i) {
                Some((unit, next)) => {
                    units.push(unit);
                    i = next;
                    continue;
                }
                None => units.push(Unit::Literal('[')),
            },
            c => units.push(Unit::Literal(c)),
        }
        i += 1;
    }

    units
}

/// Parse a character class starting at `chars[start] == '['`. Returns the
/// unit and the index one past the closing `]`, or None if the class never
/// closes. A `]` directly after the opening (or after `!`/`^`) is a literal
/// member, fnmatch-style.
fn parse_class(chars: &[char], start: usize) -> Option<(Unit, usize)> {
    let mut i = start + 1;
    let negated = matches!(chars.get(i), Some('!') | Some('^'));
    if negated {
        i += 1;
    }

    let mut ranges = Vec::new();
    let mut first = true;

    while i < chars.len() {
        let c = chars[i];
        if c == ']' && !first {
            return Some((Unit::Class { negated, ranges }, i + 1));
        }
        first = false;

        // Range like a-z, unless the '-' is the last member
        if i + 2 < chars.len() && chars[i + 1] == '-' && chars[i + 2] != ']' {
            ranges.push((c, chars[i + 2]));
            i += 3;
        } else {
            ranges.push((c, c));
            i += 1;
        }
    }

    None
}

/// Glob matching with `*`, `?` and `[...]` support.
///
/// Iterative algorithm with star backtracking; no recursion, no
/// per-candidate allocation beyond the tokenized pattern.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern = parse_pattern(pattern);
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0; // pattern index
    let mut ti = 0; // text index
    let mut star_pi = None; // position of last '*' in pattern
    let mut star_ti = 0; // position in text when we saw last '*'

    while ti < text.len() {
        if pi < pattern.len() && pattern[pi].matches(text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && matches!(pattern[pi], Unit::Star) {
            // Remember position and try matching zero chars first
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(sp) = star_pi {
            // Mismatch after a '*' - backtrack and consume one more char
            pi = sp + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    // Remaining pattern units must all be '*'
    while pi < pattern.len() && matches!(pattern[pi], Unit::Star) {
        pi += 1;
    }

    pi == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn norm(pats: &[&str]) -> Vec<String> {
        normalize(&pats.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_normalize_appends_source_qualifier() {
        assert_eq!(norm(&["Pod:*"]), vec!["Pod:*(*)"]);
        assert_eq!(norm(&["Pod:*:Failed"]), vec!["Pod:*:Failed(*)"]);
    }

    #[test]
    fn test_normalize_keeps_existing_qualifier() {
        assert_eq!(norm(&["Pod:*(prod*)"]), vec!["Pod:*(prod*)"]);
        assert_eq!(norm(&["Pod:*:Failed(kubelet/*)"]), vec!["Pod:*:Failed(kubelet/*)"]);
    }

    #[test]
    fn test_normalize_drops_blank_patterns() {
        assert!(norm(&["  "]).is_empty());
        assert!(norm(&[""]).is_empty());
        assert_eq!(norm(&[" Pod:* ", "", "  "]), vec!["Pod:*(*)"]);
    }

    #[test]
    fn test_glob_star() {
        assert!(glob_match("Pod:*", "Pod:default/web-1"));
        assert!(glob_match("*:Failed(*)", "Pod:default/web-1:Failed(kubelet/node1)"));
        assert!(!glob_match("Pod:*", "Node:worker-1"));
    }

    #[test]
    fn test_glob_question_mark() {
        assert!(glob_match("web-?", "web-1"));
        assert!(!glob_match("web-?", "web-10"));
        assert!(!glob_match("web-?", "web-"));
    }

    #[test]
    fn test_glob_multiple_wildcards() {
        assert!(glob_match("*:*/*:*(*)", "Pod:default/web-1:Failed(kubelet/node1)"));
        assert!(glob_match("Pod:*:Failed(*prod*)", "Pod:default/web-1:Failed(kubelet/node1-prod)"));
        assert!(!glob_match("Pod:*:Failed(*prod*)", "Pod:default/web-1:Failed(kubelet/node1)"));
    }

    #[test]
    fn test_glob_trailing_star() {
        assert!(glob_match("Pod*", "Pod"));
        assert!(glob_match("Pod*", "Pod:kube-system/dns"));
    }

    #[test]
    fn test_glob_character_class() {
        assert!(glob_match("web-[0-9]", "web-1"));
        assert!(!glob_match("web-[0-9]", "web-x"));
        assert!(glob_match("web-[!0-9]", "web-x"));
        assert!(!glob_match("web-[!0-9]", "web-1"));
        assert!(glob_match("[PN]od:*", "Pod:a"));
        assert!(glob_match("[PN]od:*", "Nod:a"));
    }

    #[test]
    fn test_glob_unclosed_class_is_literal() {
        assert!(glob_match("web-[0", "web-[0"));
        assert!(!glob_match("web-[0", "web-0"));
    }

    #[test]
    fn test_matches_any() {
        let pats = norm(&["Pod:*:Failed", "Node:*"]);
        assert!(matches_any("Pod:default/web-1:Failed(kubelet/node1)", &pats));
        assert!(matches_any("Node:worker-1:Ready(kubelet)", &pats));
        assert!(!matches_any("Pod:default/web-1:Started(kubelet)", &pats));
        assert!(!matches_any("anything", &[]));
    }
}
