//! Free-text medicine cabinet parsing.
//!
//! The client sends its cabinet as one line per medicine, e.g.
//!
//! ```text
//! Nurofen 400 - ✅ SUITABLE
//! Co-codamol - ❌ NOT SUITABLE: under 16
//! ```
//!
//! Parsing never fails: malformed lines are skipped. Only lines carrying a suitable
//! marker (and no earlier not-suitable marker) reach the whitelist.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// Separator between name and status: a `-` preceded by whitespace, so hyphenated
/// names like `Co-codamol` stay whole.
static NAME_DELIMITER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s-").expect("valid name delimiter pattern"));

/// "Do not recommend" markers, tolerant of spacing and hyphenation
/// (`NOT  SUITABLE`, `Not-suitable`, `un-suitable`).
static NOT_SUITABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)❌|\bnot[\s_-]*suitable|\bun-?suitable").expect("valid not-suitable pattern")
});

static SUITABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)✅|suitable").expect("valid suitable pattern"));

/// A not-suitable marker repeated right after `❌`.
static REPEATED_NOT_SUITABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:not[\s_-]*suitable|un-?suitable)").expect("valid repeated marker pattern")
});

const BULLETS: &[char] = &['-', '*', '•'];

/// One parsed cabinet line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CabinetEntry {
    pub name: String,
    pub suitable: bool,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
    Suitable,
    NotSuitable { end: usize },
}

/// Parse every usable line of a cabinet listing.
pub fn parse_entries(text: &str) -> Vec<CabinetEntry> {
    text.lines().filter_map(parse_line).collect()
}

/// Parse a single line; `None` when no name can be extracted.
pub fn parse_line(line: &str) -> Option<CabinetEntry> {
    let line = strip_bullet(line.trim());
    if line.is_empty() {
        return None;
    }

    let Some((name, rest)) = split_name(line) else {
        debug!("Skipping cabinet line without delimiter: {}", line);
        return None;
    };
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let entry = match find_marker(rest) {
        Some(Marker::Suitable) => CabinetEntry {
            name: name.to_string(),
            suitable: true,
            reason: None,
        },
        Some(Marker::NotSuitable { end }) => CabinetEntry {
            name: name.to_string(),
            suitable: false,
            reason: extract_reason(&rest[end..]),
        },
        None => CabinetEntry {
            name: name.to_string(),
            suitable: false,
            reason: None,
        },
    };
    Some(entry)
}

fn strip_bullet(line: &str) -> &str {
    match line.strip_prefix(BULLETS) {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => line,
    }
}

/// Split at the first spaced ` -`, or at the first bare `-` when there is none.
fn split_name(line: &str) -> Option<(&str, &str)> {
    match NAME_DELIMITER.find(line) {
        Some(m) => Some((&line[..m.start()], &line[m.end()..])),
        None => line.split_once('-'),
    }
}

/// Classify by whichever marker starts first; a not-suitable marker wins a tie.
fn find_marker(text: &str) -> Option<Marker> {
    let not_suitable = NOT_SUITABLE.find(text);
    let suitable = SUITABLE.find(text);

    match (not_suitable, suitable) {
        (Some(n), Some(s)) if s.start() < n.start() => Some(Marker::Suitable),
        (Some(n), _) => Some(Marker::NotSuitable { end: n.end() }),
        (None, Some(_)) => Some(Marker::Suitable),
        (None, None) => None,
    }
}

fn extract_reason(tail: &str) -> Option<String> {
    // "❌ NOT SUITABLE: age" carries the marker twice
    let reason = match REPEATED_NOT_SUITABLE.find(tail) {
        Some(m) => &tail[m.end()..],
        None => tail,
    };

    let reason = reason.trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace());
    let reason = reason.trim_end();
    (!reason.is_empty()).then(|| reason.to_string())
}

/// Normalized names of the cabinet medicines that may be recommended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CabinetWhitelist {
    names: BTreeSet<String>,
}

impl CabinetWhitelist {
    /// Build the whitelist from a raw cabinet listing.
    pub fn parse(text: &str) -> Self {
        Self::from_entries(&parse_entries(text))
    }

    pub fn from_entries(entries: &[CabinetEntry]) -> Self {
        let names = entries
            .iter()
            .filter(|e| e.suitable)
            .map(|e| normalize_name(&e.name))
            .filter(|n| !n.is_empty())
            .collect();
        Self { names }
    }

    /// Case-insensitive containment in either direction against any entry.
    ///
    /// `"Ibuprofen"` matches an entry `"ibuprofen gel"` and vice versa. A blank name
    /// never matches.
    pub fn matches(&self, name: &str) -> bool {
        let candidate = normalize_name(name);
        if candidate.is_empty() {
            return false;
        }
        self.names
            .iter()
            .any(|entry| entry.contains(&candidate) || candidate.contains(entry.as_str()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&normalize_name(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
