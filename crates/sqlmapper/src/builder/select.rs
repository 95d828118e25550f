use super::{QueryBuilder, QueryOptions};
use crate::condition::IntoFilter;
use crate::error::OrmResult;

impl QueryBuilder {
    /// `SELECT * FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n [OFFSET m]]`
    ///
    /// Options are validated before any SQL is rendered.
    pub fn build_select(&self, filter: impl IntoFilter, options: &QueryOptions) -> OrmResult<String> {
        options.validate()?;
        let filter = filter.into_filter()?;

        let mut sql = format!("SELECT * FROM {}", self.table.to_sql());
        self.push_where(&mut sql, &filter)?;
        options.write_tail(&mut sql)?;
        Ok(sql)
    }

    /// `SELECT COUNT(*) AS count FROM <table> [WHERE ...]`
    pub fn build_count(&self, filter: impl IntoFilter) -> OrmResult<String> {
        let filter = filter.into_filter()?;

        let mut sql = format!("SELECT COUNT(*) AS count FROM {}", self.table.to_sql());
        self.push_where(&mut sql, &filter)?;
        Ok(sql)
    }

    /// Same as [`QueryBuilder::build_count`]; sort, limit and offset are ignored.
    pub fn build_count_with(&self, filter: impl IntoFilter, _options: &QueryOptions) -> OrmResult<String> {
        self.build_count(filter)
    }
}
