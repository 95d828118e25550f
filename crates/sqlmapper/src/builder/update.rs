use super::{QueryBuilder, assignments};
use crate::condition::IntoFilter;
use crate::error::{OrmError, OrmResult};
use crate::value::ToRecord;

impl QueryBuilder {
    /// `UPDATE <table> SET ... WHERE ...`
    pub fn build_update(&self, filter: impl IntoFilter, args: &impl ToRecord) -> OrmResult<String> {
        let filter = filter.into_filter()?;
        let args = args.to_record()?;
        if args.is_empty() {
            return Err(OrmError::validation(format!(
                "UPDATE on {} requires at least one column to set",
                self.table.to_sql()
            )));
        }

        let mut sql = format!("UPDATE {} SET {}", self.table.to_sql(), assignments(&args)?);
        self.push_required_where(&mut sql, &filter, "UPDATE")?;
        Ok(sql)
    }

    /// [`QueryBuilder::build_update`] capped to one row.
    pub fn build_update_one(&self, filter: impl IntoFilter, args: &impl ToRecord) -> OrmResult<String> {
        let mut sql = self.build_update(filter, args)?;
        sql.push_str(" LIMIT 1");
        Ok(sql)
    }
}
