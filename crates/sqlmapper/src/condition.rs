//! Filter objects and the per-column operator grammar.
//!
//! A [`Filter`] maps columns to a [`Condition`]: either plain equality or an operator
//! object (`{gt: 1, lte: 3}`) whose predicates are AND-combined.
//!
//! # Example
//! ```ignore
//! use sqlmapper::{Filter, Op};
//!
//! let filter = Filter::new()
//!     .eq("lastName", "Doe")
//!     .gt("colInt", 1)
//!     .lte("colInt", 3)
//!     .is_null("deletedAt");
//!
//! // The same filter from JSON input:
//! let filter = Filter::from_json(serde_json::json!({
//!     "lastName": "Doe",
//!     "colInt": { "gt": 1, "lte": 3 },
//!     "deletedAt": null,
//! }))?;
//! # Ok::<(), sqlmapper::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};
use crate::ident::Column;
use crate::sanitize::{escape, escape_allowing_passthrough, escape_in_list, is_passthrough_keyword};
use crate::value::{Json, Record, ToRecord, Value};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Comparison operator of an operator object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// `gt`: column > value
    Gt,
    /// `gte`: column >= value
    Gte,
    /// `lt`: column < value
    Lt,
    /// `lte`: column <= value
    Lte,
    /// `eq`: column = value (`IS` for null)
    Eq,
    /// `ne`: column != value (`IS NOT` for null)
    Ne,
    /// `like`: column LIKE pattern
    Like,
    /// `in`: column IN (list)
    In,
    /// `nin` / `not_in`: column NOT IN (list)
    NotIn,
    /// `raw`: no operator token, the value follows the column verbatim.
    ///
    /// # Safety
    /// Be careful with SQL injection when using raw conditions.
    Raw,
}

impl Op {
    /// All recognized operators.
    pub const ALL: [Op; 10] = [
        Op::Gt,
        Op::Gte,
        Op::Lt,
        Op::Lte,
        Op::Eq,
        Op::Ne,
        Op::Like,
        Op::In,
        Op::NotIn,
        Op::Raw,
    ];

    /// The SQL comparison token (empty for [`Op::Raw`]).
    pub fn token(self) -> &'static str {
        match self {
            Op::Gt => ">",
            Op::Gte => ">=",
            Op::Lt => "<",
            Op::Lte => "<=",
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Like => "LIKE",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::Raw => "",
        }
    }

    /// The canonical operator key.
    pub fn key(self) -> &'static str {
        match self {
            Op::Gt => "gt",
            Op::Gte => "gte",
            Op::Lt => "lt",
            Op::Lte => "lte",
            Op::Eq => "eq",
            Op::Ne => "ne",
            Op::Like => "like",
            Op::In => "in",
            Op::NotIn => "nin",
            Op::Raw => "raw",
        }
    }

    fn is_list(self) -> bool {
        matches!(self, Op::In | Op::NotIn)
    }
}

impl FromStr for Op {
    type Err = OrmError;

    fn from_str(key: &str) -> OrmResult<Self> {
        Ok(match key {
            "gt" => Op::Gt,
            "gte" => Op::Gte,
            "lt" => Op::Lt,
            "lte" => Op::Lte,
            "eq" => Op::Eq,
            "ne" => Op::Ne,
            "like" => Op::Like,
            "in" => Op::In,
            "nin" | "not_in" => Op::NotIn,
            "raw" => Op::Raw,
            other => {
                return Err(OrmError::validation(format!(
                    "Unknown filter operator '{other}'"
                )));
            }
        })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The condition applied to one column.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equality; `Null` renders `IS NULL`, a list renders `IN (...)`.
    Equals(Value),
    /// An operator object; predicates are AND-combined in order.
    Ops(Vec<(Op, Value)>),
}

impl Condition {
    /// Render this condition for `column` (without surrounding parentheses).
    pub fn to_sql(&self, column: &Column) -> OrmResult<String> {
        match self {
            Condition::Equals(value) => Ok(equals_sql(&column.to_sql(), value)),
            Condition::Ops(ops) => {
                if ops.is_empty() {
                    return Err(OrmError::validation(format!(
                        "Operator object for '{}' has no operators",
                        column.name()
                    )));
                }
                let col = column.to_quoted_sql();
                let parts = ops
                    .iter()
                    .map(|(op, value)| op_sql(&col, *op, value))
                    .collect::<OrmResult<Vec<_>>>()?;
                Ok(parts.join(" AND "))
            }
        }
    }
}

fn equals_sql(col: &str, value: &Value) -> String {
    match value {
        Value::Null => format!("{col} IS NULL"),
        Value::List(_) => match escape_in_list(value) {
            Some(list) => format!("{col} IN {list}"),
            None => "1=0".to_string(),
        },
        other => format!("{col} = {}", escape(other)),
    }
}

fn is_null_keyword(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Text(s) => s.eq_ignore_ascii_case("null"),
        _ => false,
    }
}

fn is_null_check_keyword(text: &str) -> bool {
    is_passthrough_keyword(text) && text.to_ascii_lowercase().starts_with("is ")
}

fn op_sql(col: &str, op: Op, value: &Value) -> OrmResult<String> {
    if matches!(value, Value::List(_)) && !op.is_list() {
        return Err(OrmError::validation(format!(
            "Operator '{op}' does not accept a list value"
        )));
    }

    Ok(match op {
        Op::In | Op::NotIn => match escape_in_list(value) {
            Some(list) => format!("{col} {} {list}", op.token()),
            None if op == Op::In => "1=0".to_string(),
            None => "1=1".to_string(),
        },
        Op::Raw => match value {
            Value::Text(s) | Value::Raw(s) => format!("{col} {s}"),
            other => format!("{col} {}", escape(other)),
        },
        Op::Eq | Op::Ne if is_null_keyword(value) => {
            let token = if op == Op::Eq { "IS" } else { "IS NOT" };
            format!("{col} {token} NULL")
        }
        Op::Eq if value.as_str().is_some_and(is_null_check_keyword) => {
            // `{eq: "is not null"}`: the keyword already carries the comparison.
            format!("{col} {}", value.as_str().unwrap_or_default())
        }
        _ => format!("{col} {} {}", op.token(), escape_allowing_passthrough(value)),
    })
}

/// A filter object: ordered `column -> condition` entries, AND-joined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    entries: Vec<(String, Condition)>,
}

impl Filter {
    /// Create an empty filter (matches every row).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the condition for a column, replacing any previous one.
    pub fn push(&mut self, column: impl Into<String>, condition: Condition) -> &mut Self {
        let column = column.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some((_, slot)) => *slot = condition,
            None => self.entries.push((column, condition)),
        }
        self
    }

    /// Add an operator predicate, AND-combined with other operators on the same column.
    pub fn op(mut self, column: impl Into<String>, op: Op, value: impl Into<Value>) -> Self {
        let column = column.into();
        let value = value.into();
        if let Some(idx) = self.entries.iter().position(|(c, _)| *c == column) {
            if let Condition::Ops(ops) = &mut self.entries[idx].1 {
                ops.push((op, value));
                return self;
            }
        }
        self.push(column, Condition::Ops(vec![(op, value)]));
        self
    }

    /// column = value (`IS NULL` for null, `IN` for lists)
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(column, Condition::Equals(value.into()));
        self
    }

    /// column IS NULL
    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.push(column, Condition::Equals(Value::Null));
        self
    }

    /// column IS NOT NULL
    pub fn is_not_null(self, column: impl Into<String>) -> Self {
        self.op(column, Op::Ne, Value::Null)
    }

    /// column IN (values...)
    pub fn in_list<T: Into<Value>>(self, column: impl Into<String>, values: Vec<T>) -> Self {
        self.op(column, Op::In, values)
    }

    /// column NOT IN (values...)
    pub fn not_in<T: Into<Value>>(self, column: impl Into<String>, values: Vec<T>) -> Self {
        self.op(column, Op::NotIn, values)
    }

    /// column != value
    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(column, Op::Ne, value)
    }

    /// column > value
    pub fn gt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(column, Op::Gt, value)
    }

    /// column >= value
    pub fn gte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(column, Op::Gte, value)
    }

    /// column < value
    pub fn lt(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(column, Op::Lt, value)
    }

    /// column <= value
    pub fn lte(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.op(column, Op::Lte, value)
    }

    /// column LIKE pattern
    pub fn like(self, column: impl Into<String>, pattern: impl Into<Value>) -> Self {
        self.op(column, Op::Like, pattern)
    }

    /// column <sql>, with `sql` inserted verbatim.
    ///
    /// # Safety
    /// Be careful with SQL injection when using raw conditions.
    pub fn raw(self, column: impl Into<String>, sql: impl Into<String>) -> Self {
        self.op(column, Op::Raw, Value::Raw(sql.into()))
    }

    /// Build a filter from a JSON object.
    ///
    /// Object values are operator objects; every key must be a recognized operator and
    /// an operator object must not be empty.
    pub fn from_json(json: serde_json::Value) -> OrmResult<Self> {
        let serde_json::Value::Object(map) = json else {
            return Err(OrmError::validation("Filter must be a JSON object"));
        };

        let mut filter = Filter::new();
        for (column, value) in map {
            let condition = match value {
                serde_json::Value::Object(ops) => {
                    if ops.is_empty() {
                        return Err(OrmError::validation(format!(
                            "Operator object for '{column}' has no operators"
                        )));
                    }
                    let mut parsed = Vec::with_capacity(ops.len());
                    for (key, operand) in ops {
                        let op: Op = key.parse()?;
                        let operand = Value::from_json(operand).map_err(|e| {
                            OrmError::validation(format!("'{column}.{key}': {e}"))
                        })?;
                        parsed.push((op, operand));
                    }
                    Condition::Ops(parsed)
                }
                other => Condition::Equals(
                    Value::from_json(other)
                        .map_err(|e| OrmError::validation(format!("'{column}': {e}")))?,
                ),
            };
            filter.push(column, condition);
        }
        Ok(filter)
    }

    /// Build an equality-only filter from any [`ToRecord`].
    pub fn from_record(source: &impl ToRecord) -> OrmResult<Self> {
        let record = source.to_record()?;
        let mut filter = Filter::new();
        for (column, value) in record {
            filter.push(column, Condition::Equals(value));
        }
        Ok(filter)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.entries.iter().map(|(c, cond)| (c.as_str(), cond))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the `WHERE` body: one parenthesized predicate per entry, AND-joined.
    ///
    /// Returns `None` for an empty filter.
    pub fn to_where_sql(&self) -> OrmResult<Option<String>> {
        if self.entries.is_empty() {
            return Ok(None);
        }
        let mut parts = Vec::with_capacity(self.entries.len());
        for (name, condition) in &self.entries {
            let column = Column::normalize(name)?;
            parts.push(format!("({})", condition.to_sql(&column)?));
        }
        Ok(Some(parts.join(" AND ")))
    }
}

/// Anything that can be turned into a [`Filter`].
pub trait IntoFilter {
    fn into_filter(self) -> OrmResult<Filter>;
}

impl IntoFilter for Filter {
    fn into_filter(self) -> OrmResult<Filter> {
        Ok(self)
    }
}

impl IntoFilter for &Filter {
    fn into_filter(self) -> OrmResult<Filter> {
        Ok(self.clone())
    }
}

impl IntoFilter for Record {
    fn into_filter(self) -> OrmResult<Filter> {
        Filter::from_record(&self)
    }
}

impl IntoFilter for serde_json::Value {
    fn into_filter(self) -> OrmResult<Filter> {
        Filter::from_json(self)
    }
}

impl<T: Serialize> IntoFilter for Json<T> {
    fn into_filter(self) -> OrmResult<Filter> {
        Filter::from_json(serde_json::to_value(&self.0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn where_sql(filter: &Filter) -> String {
        filter.to_where_sql().unwrap().unwrap()
    }

    #[test]
    fn op_parse_recognized_keys() {
        for op in Op::ALL {
            assert_eq!(op.key().parse::<Op>().unwrap(), op);
        }
        assert_eq!("not_in".parse::<Op>().unwrap(), Op::NotIn);
    }

    #[test]
    fn op_parse_rejects_unknown_key() {
        let err = "between".parse::<Op>().unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn equality_and_null() {
        let filter = Filter::new().eq("lastName", "Doe").is_null("deletedAt");
        assert_eq!(
            where_sql(&filter),
            "(last_name = 'Doe') AND (deleted_at IS NULL)"
        );
    }

    #[test]
    fn list_equality_renders_in() {
        let filter = Filter::new().eq("id", vec![1, 2, 3]);
        assert_eq!(where_sql(&filter), "(id IN (1, 2, 3))");

        let empty = Filter::new().eq("id", Vec::<i64>::new());
        assert_eq!(where_sql(&empty), "(1=0)");
    }

    #[test]
    fn operator_object_is_and_combined() {
        let filter = Filter::new().gt("colInt", 1).lte("colInt", 3);
        assert_eq!(where_sql(&filter), "(`col_int` > 1 AND `col_int` <= 3)");
    }

    #[test]
    fn ne_null_renders_is_not() {
        let filter = Filter::new().is_not_null("deletedAt");
        assert_eq!(where_sql(&filter), "(`deleted_at` IS NOT NULL)");

        let filter = Filter::new().ne("deletedAt", "NULL");
        assert_eq!(where_sql(&filter), "(`deleted_at` IS NOT NULL)");
    }

    #[test]
    fn in_and_not_in() {
        let filter = Filter::new()
            .in_list("status", vec!["a", "b"])
            .not_in("role", vec!["admin"]);
        assert_eq!(
            where_sql(&filter),
            "(`status` IN ('a', 'b')) AND (`role` NOT IN ('admin'))"
        );

        let filter = Filter::new().op("id", Op::In, 5);
        assert_eq!(where_sql(&filter), "(`id` IN (5))");

        let filter = Filter::new().not_in("id", Vec::<i32>::new());
        assert_eq!(where_sql(&filter), "(1=1)");
    }

    #[test]
    fn passthrough_in_operator_values() {
        let filter = Filter::new().lt("createdAt", "NOW()");
        assert_eq!(where_sql(&filter), "(`created_at` < NOW())");

        let filter = Filter::new().op("deletedAt", Op::Eq, "is not null");
        assert_eq!(where_sql(&filter), "(`deleted_at` is not null)");
    }

    #[test]
    fn raw_operator_is_verbatim() {
        let filter = Filter::new().raw("score", "> 2 * bonus");
        assert_eq!(where_sql(&filter), "(`score` > 2 * bonus)");
    }

    #[test]
    fn list_value_rejected_for_scalar_operator() {
        let filter = Filter::new().gt("age", vec![1, 2]);
        assert!(filter.to_where_sql().unwrap_err().is_validation());
    }

    #[test]
    fn from_json_parses_operator_objects() {
        let filter = Filter::from_json(json!({
            "lastName": "Doe",
            "colInt": { "gt": 1, "lte": 3 },
            "deletedAt": null,
            "id": [1, 2],
        }))
        .unwrap();

        let sql = where_sql(&filter);
        assert!(sql.contains("(last_name = 'Doe')"));
        assert!(sql.contains("(`col_int` > 1 AND `col_int` <= 3)"));
        assert!(sql.contains("(deleted_at IS NULL)"));
        assert!(sql.contains("(id IN (1, 2))"));
    }

    #[test]
    fn from_json_keeps_key_order() {
        let filter = Filter::from_json(json!({ "zeta": 1, "alpha": 2, "mid": 3 })).unwrap();
        assert_eq!(where_sql(&filter), "(zeta = 1) AND (alpha = 2) AND (mid = 3)");
    }

    #[test]
    fn from_json_rejects_unknown_operator() {
        let err = Filter::from_json(json!({ "age": { "gt": 1, "between": [1, 2] } })).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn from_json_rejects_empty_operator_object() {
        let err = Filter::from_json(json!({ "age": {} })).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn later_eq_replaces_earlier_condition() {
        let filter = Filter::new().gt("age", 1).eq("age", 5);
        assert_eq!(where_sql(&filter), "(age = 5)");
    }

    #[test]
    fn empty_filter_has_no_where() {
        assert_eq!(Filter::new().to_where_sql().unwrap(), None);
    }
}
