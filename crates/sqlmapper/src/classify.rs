//! Statement classification.
//!
//! A cheap pre-dispatch guard: it looks at the leading verb (and, for upserts, the
//! `ON DUPLICATE KEY UPDATE` clause). Quotes, comments and parentheses are tracked
//! only far enough to skip a CTE list or spot a stacked statement.

use crate::error::{OrmError, OrmResult};
use std::fmt;

/// Maximum SQL length carried in a [`OrmError::StatementKind`] error.
const MAX_ERROR_SQL_LEN: usize = 200;

/// The kind of statement detected by [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Upsert,
    Update,
    Delete,
    /// Anything else (DDL, SHOW, SET, ...)
    Other,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Select => "SELECT",
            StatementKind::Insert => "INSERT",
            StatementKind::Upsert => "UPSERT",
            StatementKind::Update => "UPDATE",
            StatementKind::Delete => "DELETE",
            StatementKind::Other => "OTHER",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification flags of one statement. An upsert is also an insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
    pub is_select: bool,
    pub is_insert: bool,
    pub is_update: bool,
    pub is_upsert: bool,
    pub is_delete: bool,
}

impl Classification {
    /// The most specific kind matched.
    pub fn kind(&self) -> StatementKind {
        if self.is_upsert {
            StatementKind::Upsert
        } else if self.is_insert {
            StatementKind::Insert
        } else if self.is_select {
            StatementKind::Select
        } else if self.is_update {
            StatementKind::Update
        } else if self.is_delete {
            StatementKind::Delete
        } else {
            StatementKind::Other
        }
    }

    /// Whether this statement is acceptable where `expected` is required.
    pub fn matches(&self, expected: StatementKind) -> bool {
        match expected {
            StatementKind::Select => self.is_select,
            StatementKind::Insert => self.is_insert,
            StatementKind::Upsert => self.is_upsert,
            StatementKind::Update => self.is_update,
            StatementKind::Delete => self.is_delete,
            StatementKind::Other => true,
        }
    }
}

/// Classify a statement by its leading keyword.
///
/// Leading whitespace, comments and parentheses are skipped and matching is
/// case-insensitive. `REPLACE` counts as an insert; for `WITH ...` the verb after the
/// CTE definitions decides.
pub fn classify(sql: &str) -> Classification {
    let trimmed = strip_sql_prefix(sql);
    let verb = if starts_with_keyword(trimmed, "WITH") {
        cte_verb(trimmed)
    } else {
        trimmed
    };

    let mut c = Classification::default();
    if starts_with_keyword(verb, "SELECT") {
        c.is_select = true;
    } else if starts_with_keyword(verb, "INSERT") || starts_with_keyword(verb, "REPLACE") {
        c.is_insert = true;
        c.is_upsert = contains_on_duplicate_key_update(verb);
    } else if starts_with_keyword(verb, "UPDATE") {
        c.is_update = true;
    } else if starts_with_keyword(verb, "DELETE") {
        c.is_delete = true;
    }
    c
}

/// Fail with [`OrmError::StatementKind`] unless `sql` classifies as `expected`.
pub fn validate(sql: &str, expected: StatementKind) -> OrmResult<()> {
    if classify(sql).matches(expected) {
        Ok(())
    } else {
        Err(OrmError::StatementKind {
            expected: expected.as_str(),
            sql: truncate(sql),
        })
    }
}

pub fn validate_select(sql: &str) -> OrmResult<()> {
    validate(sql, StatementKind::Select)
}

pub fn validate_insert(sql: &str) -> OrmResult<()> {
    validate(sql, StatementKind::Insert)
}

pub fn validate_upsert(sql: &str) -> OrmResult<()> {
    validate(sql, StatementKind::Upsert)
}

pub fn validate_update(sql: &str) -> OrmResult<()> {
    validate(sql, StatementKind::Update)
}

pub fn validate_delete(sql: &str) -> OrmResult<()> {
    validate(sql, StatementKind::Delete)
}

fn truncate(sql: &str) -> String {
    let sql = sql.trim();
    if sql.len() <= MAX_ERROR_SQL_LEN {
        return sql.to_string();
    }
    let mut end = MAX_ERROR_SQL_LEN;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

/// Strip leading whitespace, SQL comments (`--`, `#` and `/* */`), and parentheses
/// from a SQL string to find the first meaningful keyword.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") || s.starts_with('#') {
            if let Some(pos) = s.find('\n') {
                s = &s[pos + 1..];
                continue;
            }
            return "";
        }
        if s.starts_with("/*") {
            if let Some(pos) = s.find("*/") {
                s = &s[pos + 2..];
                continue;
            }
            return "";
        }
        if let Some(rest) = s.strip_prefix('(') {
            s = rest;
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

/// Case-insensitive keyword match that also requires a word boundary.
pub(crate) fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    match s.get(0..keyword.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(keyword) => !s[keyword.len()..]
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_'),
        _ => false,
    }
}

/// Whether `sql` holds more than one statement.
///
/// A `;` outside quotes and comments followed by anything other than whitespace or
/// comments counts as a second statement. One trailing terminator is allowed.
pub fn has_multiple_statements(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut terminated = false;
    let mut i = 0;
    while i < bytes.len() {
        if let Some(next) = skip_comment(bytes, i) {
            i = next;
            continue;
        }
        let b = bytes[i];
        if terminated && !b.is_ascii_whitespace() {
            return true;
        }
        if let Some(next) = skip_literal(bytes, i) {
            i = next;
            continue;
        }
        if b == b';' {
            terminated = true;
        }
        i += 1;
    }
    false
}

/// Index just past the quoted literal or identifier starting at `i`.
fn skip_literal(bytes: &[u8], i: usize) -> Option<usize> {
    let quote = match bytes.get(i)? {
        q @ (b'\'' | b'"' | b'`') => *q,
        _ => return None,
    };
    let mut j = i + 1;
    while j < bytes.len() {
        if bytes[j] == b'\\' && quote != b'`' {
            j += 2;
        } else if bytes[j] == quote {
            if bytes.get(j + 1) == Some(&quote) {
                j += 2;
            } else {
                return Some(j + 1);
            }
        } else {
            j += 1;
        }
    }
    Some(bytes.len())
}

/// Index just past the comment starting at `i`.
///
/// `--` opens a comment only when followed by whitespace, as in MySQL.
fn skip_comment(bytes: &[u8], i: usize) -> Option<usize> {
    let rest = bytes.get(i..)?;
    let line_comment = rest.starts_with(b"#")
        || (rest.starts_with(b"--") && rest.get(2).is_none_or(|c| c.is_ascii_whitespace()));
    if line_comment {
        let end = rest.iter().position(|&c| c == b'\n').map_or(bytes.len(), |p| i + p + 1);
        return Some(end);
    }
    if rest.starts_with(b"/*") {
        let end = rest[2..]
            .windows(2)
            .position(|w| w == b"*/")
            .map_or(bytes.len(), |p| i + 2 + p + 2);
        return Some(end);
    }
    None
}

fn skip_space(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() {
            i += 1;
        } else if let Some(next) = skip_comment(bytes, i) {
            i = next;
        } else {
            break;
        }
    }
    i
}

/// Index just past the parenthesized group opening at `i`.
fn skip_group(bytes: &[u8], i: usize) -> usize {
    let mut depth = 0usize;
    let mut j = i;
    while j < bytes.len() {
        if let Some(next) = skip_comment(bytes, j).or_else(|| skip_literal(bytes, j)) {
            j = next;
            continue;
        }
        match bytes[j] {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return j + 1;
                }
            }
            _ => {}
        }
        j += 1;
    }
    bytes.len()
}

fn skip_name(bytes: &[u8], i: usize) -> Option<usize> {
    if let Some(next) = skip_literal(bytes, i) {
        return Some(next);
    }
    let len = bytes[i.min(bytes.len())..]
        .iter()
        .take_while(|&&c| c.is_ascii_alphanumeric() || c == b'_' || c == b'$' || c >= 0x80)
        .count();
    (len > 0).then_some(i + len)
}

/// Find the statement following the CTE definitions of a `WITH` clause.
///
/// Walks `name [(columns)] AS (body)` groups separated by commas. A malformed list
/// yields an empty string, which classifies as nothing.
fn cte_verb(sql: &str) -> &str {
    let bytes = sql.as_bytes();
    let mut i = skip_space(bytes, "WITH".len());
    if starts_with_keyword(sql.get(i..).unwrap_or_default(), "RECURSIVE") {
        i += "RECURSIVE".len();
    }
    loop {
        i = skip_space(bytes, i);
        let Some(next) = skip_name(bytes, i) else {
            return "";
        };
        i = skip_space(bytes, next);
        if bytes.get(i) == Some(&b'(') {
            i = skip_space(bytes, skip_group(bytes, i));
        }
        if !starts_with_keyword(sql.get(i..).unwrap_or_default(), "AS") {
            return "";
        }
        i = skip_space(bytes, i + "AS".len());
        if bytes.get(i) != Some(&b'(') {
            return "";
        }
        i = skip_space(bytes, skip_group(bytes, i));
        if bytes.get(i) == Some(&b',') {
            i += 1;
            continue;
        }
        return strip_sql_prefix(sql.get(i..).unwrap_or_default());
    }
}

fn contains_on_duplicate_key_update(sql: &str) -> bool {
    let normalized = sql
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase();
    normalized.contains("ON DUPLICATE KEY UPDATE")
}
