use crate::error::{OrmError, OrmResult};
use crate::ident::Column;

/// Sort direction of one ORDER BY key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// `"desc"` (any case) is descending, anything else ascending.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Sort and pagination options for SELECT statements.
///
/// `offset` is only valid together with `limit`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    sort: Vec<(String, SortDirection)>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sort key. Keys are emitted in the order they are added.
    pub fn sort(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort.push((column.into(), direction));
        self
    }

    pub fn sort_asc(self, column: impl Into<String>) -> Self {
        self.sort(column, SortDirection::Asc)
    }

    pub fn sort_desc(self, column: impl Into<String>) -> Self {
        self.sort(column, SortDirection::Desc)
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn sort_keys(&self) -> &[(String, SortDirection)] {
        &self.sort
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    /// Parse `{"sort": {"col": "desc", ...}, "limit": n, "offset": n}`.
    pub fn from_json(json: serde_json::Value) -> OrmResult<Self> {
        let serde_json::Value::Object(map) = json else {
            return Err(OrmError::validation("Query options must be a JSON object"));
        };

        let mut options = QueryOptions::new();
        for (key, value) in map {
            match key.as_str() {
                "sort" => match value {
                    serde_json::Value::Object(keys) => {
                        for (column, dir) in keys {
                            let dir = dir.as_str().map(SortDirection::parse).unwrap_or_default();
                            options.sort.push((column, dir));
                        }
                    }
                    serde_json::Value::Null => {}
                    _ => return Err(OrmError::validation("'sort' must be an object")),
                },
                "limit" => options.limit = non_negative(&key, &value)?,
                "offset" => options.offset = non_negative(&key, &value)?,
                other => {
                    return Err(OrmError::validation(format!(
                        "Unknown query option '{other}'"
                    )));
                }
            }
        }
        Ok(options)
    }

    /// Check option invariants.
    pub fn validate(&self) -> OrmResult<()> {
        if self.offset.is_some() && self.limit.is_none() {
            return Err(OrmError::validation("offset requires limit"));
        }
        Ok(())
    }

    pub(crate) fn write_tail(&self, sql: &mut String) -> OrmResult<()> {
        self.validate()?;

        if !self.sort.is_empty() {
            sql.push_str(" ORDER BY ");
            for (i, (column, dir)) in self.sort.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push_str(&Column::normalize(column)?.to_sql());
                sql.push(' ');
                sql.push_str(dir.as_sql());
            }
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
            if let Some(offset) = self.offset {
                sql.push_str(&format!(" OFFSET {offset}"));
            }
        }
        Ok(())
    }
}

fn non_negative(key: &str, value: &serde_json::Value) -> OrmResult<Option<u64>> {
    match value {
        serde_json::Value::Null => Ok(None),
        v => v.as_u64().map(Some).ok_or_else(|| {
            OrmError::validation(format!("'{key}' must be a non-negative integer, got {v}"))
        }),
    }
}
