//! Table identifiers and column-name normalization.
//!
//! [`Ident`] is a validated, possibly schema-qualified MySQL name. [`Column`] turns a
//! caller-facing property name (`lastName`) into the stored one (`last_name`).
//!
//! Bare segments must match `[A-Za-z_][A-Za-z0-9_$]*`. Backticked segments may hold
//! anything but NUL, with a literal backtick written twice.
//!
//! # Example
//! ```ignore
//! use sqlmapper::{Column, Ident};
//!
//! let t = Ident::parse("app.users")?;
//! let c = Column::normalize("lastName")?; // last_name
//! let p = Column::normalize("meta->>'$.fooBar'")?; // `meta`->>'$.fooBar'
//! # Ok::<(), sqlmapper::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};
use heck::ToSnakeCase;

/// Marker that turns a property name into a JSON path accessor (`col->'$.a'`, `col->>'$.a'`).
pub const PATH_MARKER: &str = "->";

/// One dot-separated segment of an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentPart {
    /// Written without backticks; `[A-Za-z_][A-Za-z0-9_$]*`.
    Bare(String),
    /// Written inside backticks, with doubled backticks already collapsed.
    Backticked(String),
}

impl IdentPart {
    fn name(&self) -> &str {
        match self {
            IdentPart::Bare(s) | IdentPart::Backticked(s) => s,
        }
    }
}

/// A table or column identifier, possibly schema-qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    parts: Vec<IdentPart>,
}

impl Ident {
    /// A single backticked segment holding `name` as-is.
    pub fn backticked(name: &str) -> OrmResult<Self> {
        check_raw(name)?;
        Ok(Self {
            parts: vec![IdentPart::Backticked(name.to_string())],
        })
    }

    /// Parse `table`, `schema.table`, `` `Odd Name` `` or any dotted mix of them.
    pub fn parse(s: &str) -> OrmResult<Self> {
        check_raw(s)?;
        let parts = split_segments(s)?
            .into_iter()
            .map(parse_segment)
            .collect::<OrmResult<Vec<_>>>()?;
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[IdentPart] {
        &self.parts
    }

    /// Render the identifier as SQL, quoting only the parts that need it.
    pub fn to_sql(&self) -> String {
        self.render(|part| matches!(part, IdentPart::Backticked(_)))
    }

    /// Render the identifier with every part backtick-quoted.
    pub fn to_quoted_sql(&self) -> String {
        self.render(|_| true)
    }

    fn render(&self, quote: impl Fn(&IdentPart) -> bool) -> String {
        let mut out = String::new();
        for part in &self.parts {
            if !out.is_empty() {
                out.push('.');
            }
            if quote(part) {
                push_backticked(&mut out, part.name());
            } else {
                out.push_str(part.name());
            }
        }
        out
    }
}

fn check_raw(s: &str) -> OrmResult<()> {
    if s.is_empty() {
        return Err(OrmError::validation("identifier is empty"));
    }
    if s.contains('\0') {
        return Err(OrmError::validation("identifier contains a NUL byte"));
    }
    Ok(())
}

/// Split on dots that are outside backticks. Segments keep their backticks.
fn split_segments(s: &str) -> OrmResult<Vec<&str>> {
    let mut segments = Vec::new();
    let mut in_ticks = false;
    let mut seg_start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '`' => in_ticks = !in_ticks,
            '.' if !in_ticks => {
                segments.push(&s[seg_start..i]);
                seg_start = i + 1;
            }
            _ => {}
        }
    }
    if in_ticks {
        return Err(OrmError::validation(format!(
            "identifier '{s}' has an unterminated backtick"
        )));
    }
    segments.push(&s[seg_start..]);
    Ok(segments)
}

fn parse_segment(seg: &str) -> OrmResult<IdentPart> {
    if seg.is_empty() {
        return Err(OrmError::validation("identifier has an empty segment"));
    }

    if let Some(inner) = seg.strip_prefix('`') {
        let Some(inner) = inner.strip_suffix('`') else {
            return Err(OrmError::validation(format!(
                "unexpected text after backticked segment '{seg}'"
            )));
        };
        if inner.is_empty() {
            return Err(OrmError::validation("identifier has an empty backticked segment"));
        }
        if inner.replace("``", "").contains('`') {
            return Err(OrmError::validation(format!(
                "backtick inside '{seg}' must be doubled"
            )));
        }
        return Ok(IdentPart::Backticked(inner.replace("``", "`")));
    }

    let mut chars = seg.chars();
    let valid_start = chars.next().is_some_and(|c| c == '_' || c.is_ascii_alphabetic());
    let valid_rest = chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric());
    if !valid_start || !valid_rest {
        return Err(OrmError::validation(format!(
            "'{seg}' is not a valid unquoted identifier"
        )));
    }
    Ok(IdentPart::Bare(seg.to_string()))
}

pub(crate) fn push_backticked(out: &mut String, name: &str) {
    out.push('`');
    for ch in name.chars() {
        if ch == '`' {
            out.push_str("``");
        } else {
            out.push(ch);
        }
    }
    out.push('`');
}

/// A normalized column reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    /// A plain (possibly dotted) column, already converted to snake_case.
    Plain(Ident),
    /// A JSON path accessor: the leading column is kept verbatim and quoted,
    /// the accessor suffix (starting at `->`) is emitted untouched.
    Path { head: String, accessor: String },
}

impl Column {
    /// Normalize a caller-facing property name.
    ///
    /// Bare segments are converted to snake_case (`lastName` -> `last_name`),
    /// backticked segments are kept as written. Names containing [`PATH_MARKER`]
    /// are kept verbatim.
    pub fn normalize(name: &str) -> OrmResult<Self> {
        let name = name.trim();
        if let Some(pos) = name.find(PATH_MARKER) {
            let head = name[..pos].trim();
            let head = head
                .strip_prefix('`')
                .and_then(|h| h.strip_suffix('`'))
                .unwrap_or(head);
            if head.is_empty() {
                return Err(OrmError::validation(format!(
                    "Path accessor '{name}' has no leading column"
                )));
            }
            return Ok(Column::Path {
                head: head.to_string(),
                accessor: name[pos..].to_string(),
            });
        }

        let ident = Ident::parse(name).or_else(|_| Ident::parse(&name.to_snake_case()))?;
        let parts = ident
            .parts
            .into_iter()
            .map(|part| match part {
                IdentPart::Bare(s) => {
                    let snake = s.to_snake_case();
                    if snake.is_empty() {
                        Err(OrmError::validation(format!("Invalid column name '{name}'")))
                    } else {
                        Ok(IdentPart::Bare(snake))
                    }
                }
                backticked => Ok(backticked),
            })
            .collect::<OrmResult<Vec<_>>>()?;

        Ok(Column::Plain(Ident { parts }))
    }

    /// Render for equality-style predicates and ORDER BY: bare when safe.
    pub fn to_sql(&self) -> String {
        match self {
            Column::Plain(ident) => ident.to_sql(),
            Column::Path { .. } => self.to_quoted_sql(),
        }
    }

    /// Render with the column name backtick-quoted.
    pub fn to_quoted_sql(&self) -> String {
        match self {
            Column::Plain(ident) => ident.to_quoted_sql(),
            Column::Path { head, accessor } => {
                let mut out = String::with_capacity(head.len() + accessor.len() + 2);
                push_backticked(&mut out, head);
                out.push_str(accessor);
                out
            }
        }
    }

    /// The storage name, unquoted (the last part for dotted columns).
    pub fn name(&self) -> &str {
        match self {
            Column::Plain(ident) => ident.parts.last().map(IdentPart::name).unwrap_or_default(),
            Column::Path { head, .. } => head,
        }
    }
}

/// Anything a [`QueryBuilder`](crate::QueryBuilder) accepts as its table name.
pub trait IntoIdent {
    fn into_ident(self) -> OrmResult<Ident>;
}

impl IntoIdent for Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self)
    }
}

impl IntoIdent for &Ident {
    fn into_ident(self) -> OrmResult<Ident> {
        Ok(self.clone())
    }
}

impl IntoIdent for &str {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(self)
    }
}

impl IntoIdent for String {
    fn into_ident(self) -> OrmResult<Ident> {
        Ident::parse(&self)
    }
}
