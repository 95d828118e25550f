use super::QueryBuilder;
use crate::condition::IntoFilter;
use crate::error::OrmResult;

impl QueryBuilder {
    /// `DELETE FROM <table> WHERE ...`
    pub fn build_delete(&self, filter: impl IntoFilter) -> OrmResult<String> {
        let filter = filter.into_filter()?;

        let mut sql = format!("DELETE FROM {}", self.table.to_sql());
        self.push_required_where(&mut sql, &filter, "DELETE")?;
        Ok(sql)
    }

    /// [`QueryBuilder::build_delete`] capped to one row.
    pub fn build_delete_one(&self, filter: impl IntoFilter) -> OrmResult<String> {
        let mut sql = self.build_delete(filter)?;
        sql.push_str(" LIMIT 1");
        Ok(sql)
    }
}
