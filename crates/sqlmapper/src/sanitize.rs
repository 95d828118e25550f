//! Value escaping into MySQL literal syntax.
//!
//! All functions here are pure: they only shape text.

use crate::ident::push_backticked;
use crate::value::Value;
use std::fmt::Write;

/// Lower-cased SQL fragments that [`escape_allowing_passthrough`] leaves untouched.
pub const PASSTHROUGH_KEYWORDS: &[&str] = &["current_timestamp", "now()", "is null", "is not null"];

/// Whether `text` is one of the [`PASSTHROUGH_KEYWORDS`] (case-insensitive, exact match).
pub fn is_passthrough_keyword(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    PASSTHROUGH_KEYWORDS.contains(&lower.as_str())
}

/// Escape a value into a literal.
///
/// - `Null` -> `NULL`, booleans -> `true` / `false`, numbers as decimal text
/// - strings are single-quoted with backslash escapes
/// - dates -> `'YYYY-MM-DD'`, datetimes -> `'YYYY-MM-DD HH:MM:SS.mmm'`
/// - bytes -> `X'..'`
/// - lists are escaped element-wise and comma-joined; non-primitive elements are dropped
/// - raw markers are emitted verbatim
pub fn escape(value: &Value) -> String {
    let mut out = String::new();
    write_escaped(&mut out, value);
    out
}

/// Like [`escape`], but text matching a pass-through keyword is emitted verbatim.
pub fn escape_allowing_passthrough(value: &Value) -> String {
    match value {
        Value::Text(s) if is_passthrough_keyword(s) => s.clone(),
        other => escape(other),
    }
}

/// Escape an identifier with backticks, quoting each dotted part.
pub fn escape_id(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    for (i, part) in name.split('.').enumerate() {
        if i > 0 {
            out.push('.');
        }
        push_backticked(&mut out, part);
    }
    out
}

/// Render a value as a parenthesized `IN` list, coercing scalars to a one-element list.
///
/// Returns `None` when no element survives (empty list).
pub fn escape_in_list(value: &Value) -> Option<String> {
    let body = match value {
        Value::List(items) => escape_list(items),
        scalar => escape_allowing_passthrough(scalar),
    };
    if body.is_empty() {
        None
    } else {
        Some(format!("({body})"))
    }
}

fn escape_list(items: &[Value]) -> String {
    let mut out = String::new();
    let mut first = true;
    for item in items.iter().filter(|v| v.is_primitive()) {
        if !first {
            out.push_str(", ");
        }
        first = false;
        write_escaped(&mut out, item);
    }
    out
}

fn write_escaped(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Int(i) => {
            let _ = write!(out, "{i}");
        }
        Value::UInt(u) => {
            let _ = write!(out, "{u}");
        }
        Value::Float(f) => {
            if f.is_finite() {
                let _ = write!(out, "{f}");
            } else {
                out.push_str("NULL");
            }
        }
        #[cfg(feature = "rust_decimal")]
        Value::Decimal(d) => {
            let _ = write!(out, "{d}");
        }
        Value::Text(s) => write_string_literal(out, s),
        Value::Bytes(bytes) => {
            out.push_str("X'");
            for b in bytes {
                let _ = write!(out, "{b:02x}");
            }
            out.push('\'');
        }
        Value::Date(d) => {
            let _ = write!(out, "'{}'", d.format("%Y-%m-%d"));
        }
        Value::DateTime(dt) => {
            let _ = write!(out, "'{}'", dt.format("%Y-%m-%d %H:%M:%S%.3f"));
        }
        Value::List(items) => out.push_str(&escape_list(items)),
        Value::Raw(sql) => out.push_str(sql),
    }
}

fn write_string_literal(out: &mut String, s: &str) {
    out.reserve(s.len() + 2);
    out.push('\'');
    for ch in s.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\u{8}' => out.push_str("\\b"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{1a}' => out.push_str("\\Z"),
            '"' => out.push_str("\\\""),
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('\'');
}
