use super::{QueryBuilder, assignments, write_value};
use crate::error::{OrmError, OrmResult};
use crate::ident::Column;
use crate::value::{Record, ToRecord};

/// How duplicate keys are handled by a plain INSERT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertMode {
    /// Duplicate keys fail the statement.
    #[default]
    Plain,
    /// Duplicate keys are skipped by updating the first column to itself.
    ///
    /// Unlike `INSERT IGNORE`, other errors (bad values, truncation) still fail.
    IgnoreDuplicates,
}

/// The `ON DUPLICATE KEY UPDATE` part of an upsert.
#[derive(Debug, Clone, PartialEq)]
pub enum OnDuplicate {
    /// Explicit `column = value` assignments.
    Values(Record),
    /// Update each column to the value that would have been inserted.
    Columns(Vec<String>),
}

impl OnDuplicate {
    pub fn values(source: &impl ToRecord) -> OrmResult<Self> {
        Ok(OnDuplicate::Values(source.to_record()?))
    }

    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OnDuplicate::Columns(columns.into_iter().map(Into::into).collect())
    }

    fn to_sql(&self) -> OrmResult<String> {
        let sql = match self {
            OnDuplicate::Values(record) => assignments(record)?,
            OnDuplicate::Columns(columns) => {
                let mut parts = Vec::with_capacity(columns.len());
                for name in columns {
                    let col = Column::normalize(name)?.to_quoted_sql();
                    parts.push(format!("{col} = VALUES({col})"));
                }
                parts.join(", ")
            }
        };
        if sql.is_empty() {
            return Err(OrmError::validation(
                "ON DUPLICATE KEY UPDATE requires at least one column",
            ));
        }
        Ok(sql)
    }
}

impl From<Record> for OnDuplicate {
    fn from(record: Record) -> Self {
        OnDuplicate::Values(record)
    }
}

impl From<Vec<&str>> for OnDuplicate {
    fn from(columns: Vec<&str>) -> Self {
        OnDuplicate::columns(columns)
    }
}

impl From<Vec<String>> for OnDuplicate {
    fn from(columns: Vec<String>) -> Self {
        OnDuplicate::Columns(columns)
    }
}

/// Normalized column set plus the rendered `(v1, v2, ...)` tuple for every row.
struct InsertRows {
    columns: Vec<Column>,
    tuples: Vec<String>,
}

/// The first row defines the column set; every other row must supply exactly the same
/// columns (in any order).
fn collect_rows<R: ToRecord>(rows: &[R]) -> OrmResult<InsertRows> {
    let Some(first) = rows.first() else {
        return Err(OrmError::validation("INSERT requires at least one row"));
    };

    let first = first.to_record()?;
    if first.is_empty() {
        return Err(OrmError::validation("INSERT requires at least one column"));
    }
    let columns = first
        .keys()
        .map(Column::normalize)
        .collect::<OrmResult<Vec<_>>>()?;
    let names: Vec<String> = columns.iter().map(Column::to_quoted_sql).collect();

    let mut tuples = Vec::with_capacity(rows.len());
    tuples.push(render_tuple(&names, &first, 0)?);
    for (idx, row) in rows.iter().enumerate().skip(1) {
        tuples.push(render_tuple(&names, &row.to_record()?, idx)?);
    }

    Ok(InsertRows { columns, tuples })
}

fn render_tuple(names: &[String], record: &Record, row_idx: usize) -> OrmResult<String> {
    let mut slots: Vec<Option<String>> = vec![None; names.len()];
    for (key, value) in record.iter() {
        let name = Column::normalize(key)?.to_quoted_sql();
        let Some(pos) = names.iter().position(|n| *n == name) else {
            return Err(OrmError::validation(format!(
                "Row {row_idx} has column '{key}' which is not in the first row"
            )));
        };
        if slots[pos].is_some() {
            return Err(OrmError::validation(format!(
                "Row {row_idx} sets column {name} twice"
            )));
        }
        slots[pos] = Some(write_value(key, value)?);
    }

    let mut values = Vec::with_capacity(names.len());
    for (name, slot) in names.iter().zip(slots) {
        match slot {
            Some(v) => values.push(v),
            None => {
                return Err(OrmError::validation(format!(
                    "Row {row_idx} is missing column {name}"
                )));
            }
        }
    }
    Ok(format!("({})", values.join(", ")))
}

impl QueryBuilder {
    fn insert_head(&self, rows: &InsertRows) -> String {
        let columns: Vec<String> = rows.columns.iter().map(Column::to_quoted_sql).collect();
        format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table.to_sql(),
            columns.join(", "),
            rows.tuples.join(", ")
        )
    }

    /// `INSERT INTO <table> (cols) VALUES (...), (...)`
    pub fn build_insert<R: ToRecord>(&self, rows: &[R], mode: InsertMode) -> OrmResult<String> {
        let rows = collect_rows(rows)?;
        let mut sql = self.insert_head(&rows);
        if mode == InsertMode::IgnoreDuplicates {
            let first = rows.columns[0].to_quoted_sql();
            sql.push_str(&format!(" ON DUPLICATE KEY UPDATE {first} = {first}"));
        }
        Ok(sql)
    }

    /// Single-row [`QueryBuilder::build_insert`].
    pub fn build_insert_one(&self, row: &impl ToRecord, mode: InsertMode) -> OrmResult<String> {
        self.build_insert(std::slice::from_ref(&row.to_record()?), mode)
    }

    /// `INSERT ... ON DUPLICATE KEY UPDATE ...` for one row.
    pub fn build_upsert(&self, args: &impl ToRecord, on_duplicate: &OnDuplicate) -> OrmResult<String> {
        self.build_upsert_bulk(std::slice::from_ref(&args.to_record()?), on_duplicate)
    }

    /// `INSERT ... ON DUPLICATE KEY UPDATE ...` for many rows.
    pub fn build_upsert_bulk<R: ToRecord>(
        &self,
        rows: &[R],
        on_duplicate: &OnDuplicate,
    ) -> OrmResult<String> {
        let rows = collect_rows(rows)?;
        let update = on_duplicate.to_sql()?;
        Ok(format!("{} ON DUPLICATE KEY UPDATE {update}", self.insert_head(&rows)))
    }
}
