//! Table-bound data access.
//!
//! A [`Dao`] ties a table name, a [`QueryBuilder`], a shared [`Router`] and a row
//! constructor together. Every operation builds its statement, lets the router check
//! and dispatch it, and maps each returned row through the constructor.
//!
//! # Example
//!
//! ```ignore
//! use sqlmapper::{Dao, Filter, FromRecord, QueryOptions, Router, record};
//!
//! #[derive(Debug, FromRecord)]
//! struct User {
//!     id: i64,
//!     first_name: String,
//! }
//!
//! let users: Dao<User> = Dao::from_record(router.clone(), "users")?;
//! users.create(&record! { "firstName" => "John" }).await?;
//! let page = users
//!     .get_all_and_count(Filter::new(), &QueryOptions::new().limit(20))
//!     .await?;
//! println!("{} of {}", page.results.len(), page.count);
//! ```

use crate::builder::{InsertMode, OnDuplicate, QueryBuilder, QueryOptions};
use crate::client::RowStream;
use crate::condition::IntoFilter;
use crate::error::{OrmError, OrmResult};
use crate::normalize::ModificationResult;
use crate::router::Router;
use crate::stream::{Mapper, RecordStream};
use crate::value::{Record, ToRecord};
use std::sync::Arc;

/// Construct a value from one result row.
pub trait FromRecord: Sized {
    fn from_record(record: Record) -> OrmResult<Self>;
}

impl FromRecord for Record {
    fn from_record(record: Record) -> OrmResult<Self> {
        Ok(record)
    }
}

/// A row type bound to a table.
pub trait Entity: FromRecord {
    const TABLE: &'static str;
}

/// Result of [`Dao::get_all_and_count`].
#[derive(Debug, Clone, PartialEq)]
pub struct AllAndCount<T> {
    pub results: Vec<T>,
    /// Total matching rows, ignoring sort/limit/offset.
    pub count: u64,
}

/// Data access object for one table.
pub struct Dao<T> {
    table: String,
    builder: QueryBuilder,
    router: Arc<Router>,
    mapper: Mapper<T>,
}

impl<T> Clone for Dao<T> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            builder: self.builder.clone(),
            router: Arc::clone(&self.router),
            mapper: Arc::clone(&self.mapper),
        }
    }
}

impl<T> std::fmt::Debug for Dao<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("table", &self.table)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl Dao<Record> {
    /// A DAO returning plain records.
    pub fn raw(router: Arc<Router>, table: &str) -> OrmResult<Self> {
        Self::new(router, table, Ok)
    }
}

impl<T: 'static> Dao<T> {
    /// Create a DAO with an explicit row constructor.
    pub fn new<F>(router: Arc<Router>, table: &str, mapper: F) -> OrmResult<Self>
    where
        F: Fn(Record) -> OrmResult<T> + Send + Sync + 'static,
    {
        Ok(Self {
            table: table.to_string(),
            builder: QueryBuilder::new(table)?,
            router,
            mapper: Arc::new(mapper),
        })
    }

    /// Create a DAO that builds rows through [`FromRecord`].
    pub fn from_record(router: Arc<Router>, table: &str) -> OrmResult<Self>
    where
        T: FromRecord,
    {
        Self::new(router, table, T::from_record)
    }

    /// Create a DAO for an [`Entity`] on its own table.
    pub fn for_entity(router: Arc<Router>) -> OrmResult<Self>
    where
        T: Entity,
    {
        Self::from_record(router, T::TABLE)
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn builder(&self) -> &QueryBuilder {
        &self.builder
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// The same table without the row constructor.
    pub fn as_raw(&self) -> Dao<Record> {
        Dao {
            table: self.table.clone(),
            builder: self.builder.clone(),
            router: Arc::clone(&self.router),
            mapper: Arc::new(Ok::<Record, OrmError>),
        }
    }

    fn map_one(&self, row: Option<Record>) -> OrmResult<Option<T>> {
        row.map(|row| (self.mapper)(row)).transpose()
    }

    fn map_all(&self, rows: Vec<Record>) -> OrmResult<Vec<T>> {
        rows.into_iter().map(|row| (self.mapper)(row)).collect()
    }

    fn count_from(row: Option<Record>) -> OrmResult<u64> {
        match row {
            Some(row) => row.try_get::<u64>("count"),
            None => Ok(0),
        }
    }

    /// Log a statement that failed to build; it never reaches the router.
    fn built<S>(&self, result: OrmResult<S>) -> OrmResult<S> {
        result.inspect_err(|e| tracing::error!(table = %self.table, error = %e, "query build failed"))
    }

    fn page_sql(&self, filter: impl IntoFilter, options: &QueryOptions) -> OrmResult<(String, String)> {
        let filter = filter.into_filter()?;
        let select = self.builder.build_select(&filter, options)?;
        let count = self.builder.build_count_with(&filter, options)?;
        Ok((select, count))
    }

    // ==================== Reads ====================

    /// First matching row from a read pool.
    pub async fn get_one(&self, filter: impl IntoFilter, options: &QueryOptions) -> OrmResult<Option<T>> {
        let sql = self.built(self.builder.build_select(filter, options))?;
        self.map_one(self.router.select_one(&sql).await?)
    }

    pub async fn get_one_from_master(
        &self,
        filter: impl IntoFilter,
        options: &QueryOptions,
    ) -> OrmResult<Option<T>> {
        let sql = self.built(self.builder.build_select(filter, options))?;
        self.map_one(self.router.select_one_from_master(&sql).await?)
    }

    /// All matching rows from a read pool.
    pub async fn get_all(&self, filter: impl IntoFilter, options: &QueryOptions) -> OrmResult<Vec<T>> {
        let sql = self.built(self.builder.build_select(filter, options))?;
        self.map_all(self.router.select_all(&sql).await?)
    }

    pub async fn get_all_from_master(
        &self,
        filter: impl IntoFilter,
        options: &QueryOptions,
    ) -> OrmResult<Vec<T>> {
        let sql = self.built(self.builder.build_select(filter, options))?;
        self.map_all(self.router.select_all_from_master(&sql).await?)
    }

    pub async fn get_count(&self, filter: impl IntoFilter) -> OrmResult<u64> {
        let sql = self.built(self.builder.build_count(filter))?;
        Self::count_from(self.router.select_one(&sql).await?)
    }

    pub async fn get_count_from_master(&self, filter: impl IntoFilter) -> OrmResult<u64> {
        let sql = self.built(self.builder.build_count(filter))?;
        Self::count_from(self.router.select_one_from_master(&sql).await?)
    }

    /// One page of rows plus the total count, fetched concurrently.
    pub async fn get_all_and_count(
        &self,
        filter: impl IntoFilter,
        options: &QueryOptions,
    ) -> OrmResult<AllAndCount<T>> {
        let (select, count) = self.built(self.page_sql(filter, options))?;

        let (rows, count) = tokio::try_join!(
            self.router.select_all(&select),
            self.router.select_one(&count)
        )?;
        Ok(AllAndCount {
            results: self.map_all(rows)?,
            count: Self::count_from(count)?,
        })
    }

    pub async fn get_all_and_count_from_master(
        &self,
        filter: impl IntoFilter,
        options: &QueryOptions,
    ) -> OrmResult<AllAndCount<T>> {
        let (select, count) = self.built(self.page_sql(filter, options))?;

        let (rows, count) = tokio::try_join!(
            self.router.select_all_from_master(&select),
            self.router.select_one_from_master(&count)
        )?;
        Ok(AllAndCount {
            results: self.map_all(rows)?,
            count: Self::count_from(count)?,
        })
    }

    /// First row of a hand-written SELECT.
    pub async fn get_one_from_sql(&self, sql: &str) -> OrmResult<Option<T>> {
        self.map_one(self.router.select_one(sql).await?)
    }

    /// All rows of a hand-written SELECT.
    pub async fn get_all_from_sql(&self, sql: &str) -> OrmResult<Vec<T>> {
        self.map_all(self.router.select_all(sql).await?)
    }

    // ==================== Writes ====================

    pub async fn create(&self, args: &impl ToRecord) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_insert_one(args, InsertMode::Plain))?;
        self.router.insert(&sql).await
    }

    /// Insert many rows in one statement; every row must have the first row's columns.
    pub async fn create_bulk<R: ToRecord>(&self, rows: &[R]) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_insert(rows, InsertMode::Plain))?;
        self.router.insert(&sql).await
    }

    /// Insert, silently skipping a duplicate key.
    pub async fn create_ignoring_duplicates(&self, args: &impl ToRecord) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_insert_one(args, InsertMode::IgnoreDuplicates))?;
        self.router.insert(&sql).await
    }

    pub async fn create_bulk_ignoring_duplicates<R: ToRecord>(
        &self,
        rows: &[R],
    ) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_insert(rows, InsertMode::IgnoreDuplicates))?;
        self.router.insert(&sql).await
    }

    /// Insert, or update the given columns/values when the key already exists.
    pub async fn upsert(
        &self,
        args: &impl ToRecord,
        on_duplicate: impl Into<OnDuplicate>,
    ) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_upsert(args, &on_duplicate.into()))?;
        self.router.upsert(&sql).await
    }

    pub async fn upsert_bulk<R: ToRecord>(
        &self,
        rows: &[R],
        on_duplicate: impl Into<OnDuplicate>,
    ) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_upsert_bulk(rows, &on_duplicate.into()))?;
        self.router.upsert(&sql).await
    }

    /// Update at most one matching row.
    pub async fn update_one(
        &self,
        filter: impl IntoFilter,
        args: &impl ToRecord,
    ) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_update_one(filter, args))?;
        self.router.update(&sql).await
    }

    pub async fn update_all(
        &self,
        filter: impl IntoFilter,
        args: &impl ToRecord,
    ) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_update(filter, args))?;
        self.router.update(&sql).await
    }

    /// Delete at most one matching row.
    pub async fn delete_one(&self, filter: impl IntoFilter) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_delete_one(filter))?;
        self.router.delete(&sql).await
    }

    pub async fn delete_all(&self, filter: impl IntoFilter) -> OrmResult<ModificationResult> {
        let sql = self.built(self.builder.build_delete(filter))?;
        self.router.delete(&sql).await
    }

    pub async fn insert_from_sql(&self, sql: &str) -> OrmResult<ModificationResult> {
        self.router.insert(sql).await
    }

    pub async fn upsert_from_sql(&self, sql: &str) -> OrmResult<ModificationResult> {
        self.router.upsert(sql).await
    }

    pub async fn update_from_sql(&self, sql: &str) -> OrmResult<ModificationResult> {
        self.router.update(sql).await
    }

    pub async fn delete_from_sql(&self, sql: &str) -> OrmResult<ModificationResult> {
        self.router.delete(sql).await
    }

    // ==================== Streams ====================

    fn mapped(&self, rows: RowStream) -> RecordStream<T> {
        RecordStream::new(rows, Arc::clone(&self.mapper))
    }

    fn failed(&self, err: OrmError) -> RecordStream<T> {
        self.mapped(RowStream::from_items(vec![Err(err)]))
    }

    /// Stream matching rows from a read pool, mapping each row as it is pulled.
    ///
    /// Build and validation errors are yielded as the only item.
    pub fn stream(&self, filter: impl IntoFilter, options: &QueryOptions) -> RecordStream<T> {
        match self.built(self.builder.build_select(filter, options)) {
            Ok(sql) => self.mapped(self.router.stream_query(&sql)),
            Err(e) => self.failed(e),
        }
    }

    pub fn stream_from_master(&self, filter: impl IntoFilter, options: &QueryOptions) -> RecordStream<T> {
        match self.built(self.builder.build_select(filter, options)) {
            Ok(sql) => self.mapped(self.router.stream_query_from_master(&sql)),
            Err(e) => self.failed(e),
        }
    }

    pub fn stream_from_sql(&self, sql: &str) -> RecordStream<T> {
        self.mapped(self.router.stream_query(sql))
    }

    pub fn stream_from_sql_from_master(&self, sql: &str) -> RecordStream<T> {
        self.mapped(self.router.stream_query_from_master(sql))
    }
}
