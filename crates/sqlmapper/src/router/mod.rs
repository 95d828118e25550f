//! Read/write routing.
//!
//! A [`Router`] owns one write driver and any number of read drivers. Reads go to a
//! replica (round-robin by default) or to the write pool when no replica is configured;
//! every write goes to the write pool. Each call checks the statement kind before
//! anything is sent, and driver failures are logged with the SQL and surfaced as a
//! generic [`OrmError::Execution`].
//!
//! # Example
//!
//! ```ignore
//! use sqlmapper::{MockDriver, Router};
//!
//! let router = Router::builder(MockDriver::new("write"))
//!     .read(MockDriver::new("read-0"))
//!     .build();
//! let users = router.select_all("SELECT * FROM users").await?;
//! ```

mod stream;

#[cfg(test)]
mod tests;

use crate::classify::{self, StatementKind};
use crate::client::{Driver, DriverResult, RowStream};
use crate::error::{OrmError, OrmResult};
use crate::normalize::{self, ModificationResult, SelectMode};
use crate::value::Record;
use serde::Deserialize;
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use stream::RoutedStream;

/// Default SQL truncation for log events, in bytes.
pub const DEFAULT_MAX_SQL_LOG_LENGTH: usize = 200;

/// How reads are spread across read drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadBalance {
    /// Rotate through read drivers, one per statement.
    #[default]
    RoundRobin,
    /// Always use the first read driver.
    First,
}

/// Router tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOptions {
    pub read_balance: ReadBalance,
    /// Statements slower than this emit a `warn` event.
    pub slow_query_threshold: Option<Duration>,
    /// Truncate SQL in log events (in bytes). `None` means no truncation.
    pub max_sql_log_length: Option<usize>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            read_balance: ReadBalance::RoundRobin,
            slow_query_threshold: None,
            max_sql_log_length: Some(DEFAULT_MAX_SQL_LOG_LENGTH),
        }
    }
}

impl RouterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_balance(mut self, balance: ReadBalance) -> Self {
        self.read_balance = balance;
        self
    }

    pub fn slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn max_sql_log_length(mut self, len: usize) -> Self {
        self.max_sql_log_length = Some(len);
        self
    }

    /// Log SQL in full.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_log_length = None;
        self
    }
}

/// What a router call is doing; decides the required statement kind and the
/// operation named in execution errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Select,
    Insert,
    Upsert,
    Update,
    Delete,
    Generic,
    Stream,
}

impl Operation {
    fn name(self) -> &'static str {
        match self {
            Operation::Select => "select",
            Operation::Insert => "insert",
            Operation::Upsert => "upsert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::Generic => "generic",
            Operation::Stream => "stream",
        }
    }

    fn expected(self) -> Option<StatementKind> {
        match self {
            Operation::Select | Operation::Stream => Some(StatementKind::Select),
            Operation::Insert => Some(StatementKind::Insert),
            Operation::Upsert => Some(StatementKind::Upsert),
            Operation::Update => Some(StatementKind::Update),
            Operation::Delete => Some(StatementKind::Delete),
            Operation::Generic => None,
        }
    }
}

/// Routes statements to a write driver and zero or more read drivers.
pub struct Router {
    write: Arc<dyn Driver>,
    reads: Vec<Arc<dyn Driver>>,
    next_read: AtomicUsize,
    options: RouterOptions,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("write", &self.write.name())
            .field(
                "reads",
                &self.reads.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish()
    }
}

/// Builder for [`Router`].
pub struct RouterBuilder {
    write: Arc<dyn Driver>,
    reads: Vec<Arc<dyn Driver>>,
    options: RouterOptions,
}

impl RouterBuilder {
    /// Add a read driver.
    pub fn read(mut self, driver: impl Driver + 'static) -> Self {
        self.reads.push(Arc::new(driver));
        self
    }

    /// Add an already shared read driver.
    pub fn read_shared(mut self, driver: Arc<dyn Driver>) -> Self {
        self.reads.push(driver);
        self
    }

    pub fn options(mut self, options: RouterOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Router {
        tracing::info!(
            write = self.write.name(),
            reads = self.reads.len(),
            read_balance = ?self.options.read_balance,
            "router ready"
        );
        Router {
            write: self.write,
            reads: self.reads,
            next_read: AtomicUsize::new(0),
            options: self.options,
        }
    }
}

impl Router {
    /// A router without replicas: reads are served by the write driver.
    pub fn new(write: impl Driver + 'static) -> Self {
        Self::builder(write).build()
    }

    pub fn builder(write: impl Driver + 'static) -> RouterBuilder {
        Self::builder_shared(Arc::new(write))
    }

    pub fn builder_shared(write: Arc<dyn Driver>) -> RouterBuilder {
        RouterBuilder {
            write,
            reads: Vec::new(),
            options: RouterOptions::default(),
        }
    }

    /// Connect `mysql_async` pools for every configured pool.
    #[cfg(feature = "mysql")]
    pub fn connect(config: &crate::config::RouterConfig) -> OrmResult<Self> {
        use crate::pool::MysqlDriver;

        config.validate()?;
        let mut builder = Self::builder(MysqlDriver::connect("write", &config.write)?)
            .options(config.router_options());
        let mut idx = 0;
        for read in &config.reads {
            for pool in read.expand_hosts() {
                builder = builder.read(MysqlDriver::connect(format!("read-{idx}"), &pool)?);
                idx += 1;
            }
        }
        Ok(builder.build())
    }

    pub fn read_pool_count(&self) -> usize {
        self.reads.len()
    }

    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    fn read_driver(&self) -> &Arc<dyn Driver> {
        match (self.reads.len(), self.options.read_balance) {
            (0, _) => &self.write,
            (_, ReadBalance::First) | (1, _) => &self.reads[0],
            (n, ReadBalance::RoundRobin) => {
                &self.reads[self.next_read.fetch_add(1, Ordering::Relaxed) % n]
            }
        }
    }

    fn log_sql<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        truncate_sql(sql, self.options.max_sql_log_length)
    }

    fn check_kind(&self, op: Operation, sql: &str) -> OrmResult<()> {
        let Some(kind) = op.expected() else {
            return Ok(());
        };
        classify::validate(sql, kind).inspect_err(|e| {
            tracing::error!(
                op = op.name(),
                sql = %self.log_sql(sql),
                error = %e,
                "statement rejected"
            );
        })
    }

    fn execution_error(&self, op: Operation, driver: &dyn Driver, sql: &str, err: &OrmError) -> OrmError {
        tracing::error!(
            op = op.name(),
            pool = driver.name(),
            sql = %self.log_sql(sql),
            error = %err,
            "query failed"
        );
        OrmError::Execution {
            operation: op.name(),
        }
    }

    fn report_slow(&self, op: Operation, driver: &dyn Driver, sql: &str, elapsed: Duration) {
        if let Some(threshold) = self.options.slow_query_threshold {
            if elapsed > threshold {
                tracing::warn!(
                    op = op.name(),
                    pool = driver.name(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    sql = %self.log_sql(sql),
                    "slow query"
                );
            }
        }
    }

    async fn dispatch(
        &self,
        op: Operation,
        driver: &Arc<dyn Driver>,
        sql: &str,
    ) -> OrmResult<DriverResult> {
        self.check_kind(op, sql)?;

        tracing::debug!(
            target: "sqlmapper.sql",
            op = op.name(),
            pool = driver.name(),
            sql = %self.log_sql(sql),
            "dispatch"
        );

        let start = Instant::now();
        let result = driver.execute(sql).await;
        self.report_slow(op, driver.as_ref(), sql, start.elapsed());
        result.map_err(|e| self.execution_error(op, driver.as_ref(), sql, &e))
    }

    async fn select(&self, driver: &Arc<dyn Driver>, sql: &str, mode: SelectMode) -> OrmResult<normalize::Selected> {
        let result = self.dispatch(Operation::Select, driver, sql).await?;
        Ok(normalize::normalize_select(result, mode))
    }

    async fn modify(&self, op: Operation, sql: &str) -> OrmResult<ModificationResult> {
        let result = self.dispatch(op, &self.write, sql).await?;
        Ok(normalize::normalize_modification(result))
    }

    /// First row of a SELECT from a read driver; `None` when there are no rows.
    pub async fn select_one(&self, sql: &str) -> OrmResult<Option<Record>> {
        let driver = self.read_driver();
        Ok(self.select(driver, sql, SelectMode::One).await?.into_one())
    }

    /// All rows of a SELECT from a read driver.
    pub async fn select_all(&self, sql: &str) -> OrmResult<Vec<Record>> {
        let driver = self.read_driver();
        Ok(self.select(driver, sql, SelectMode::All).await?.into_all())
    }

    /// [`Router::select_one`] against the write driver (read-your-writes).
    pub async fn select_one_from_master(&self, sql: &str) -> OrmResult<Option<Record>> {
        Ok(self.select(&self.write, sql, SelectMode::One).await?.into_one())
    }

    /// [`Router::select_all`] against the write driver (read-your-writes).
    pub async fn select_all_from_master(&self, sql: &str) -> OrmResult<Vec<Record>> {
        Ok(self.select(&self.write, sql, SelectMode::All).await?.into_all())
    }

    /// Run an INSERT (an upsert is accepted too).
    pub async fn insert(&self, sql: &str) -> OrmResult<ModificationResult> {
        self.modify(Operation::Insert, sql).await
    }

    /// Run an `INSERT ... ON DUPLICATE KEY UPDATE`.
    pub async fn upsert(&self, sql: &str) -> OrmResult<ModificationResult> {
        self.modify(Operation::Upsert, sql).await
    }

    pub async fn update(&self, sql: &str) -> OrmResult<ModificationResult> {
        self.modify(Operation::Update, sql).await
    }

    pub async fn delete(&self, sql: &str) -> OrmResult<ModificationResult> {
        self.modify(Operation::Delete, sql).await
    }

    /// Run any statement on the write driver without a kind check.
    ///
    /// Returned rows are normalized; acknowledgements are passed through.
    pub async fn execute_generic_query(&self, sql: &str) -> OrmResult<DriverResult> {
        match self.dispatch(Operation::Generic, &self.write, sql).await? {
            DriverResult::Rows(rows) => Ok(DriverResult::Rows(
                rows.into_iter().map(normalize::normalize_row).collect(),
            )),
            ack => Ok(ack),
        }
    }

    /// Stream a SELECT from a read driver.
    ///
    /// Nothing is sent until the stream is first polled. Any failure (including a
    /// rejected statement) is yielded as a single `Err` item, after which the stream ends.
    pub fn stream_query(&self, sql: &str) -> RowStream {
        let driver = Arc::clone(self.read_driver());
        self.open_stream(driver, sql)
    }

    /// [`Router::stream_query`] against the write driver.
    pub fn stream_query_from_master(&self, sql: &str) -> RowStream {
        self.open_stream(Arc::clone(&self.write), sql)
    }

    fn open_stream(&self, driver: Arc<dyn Driver>, sql: &str) -> RowStream {
        let op = Operation::Stream;
        if let Err(e) = self.check_kind(op, sql) {
            return RowStream::new(RoutedStream::failed(e));
        }

        tracing::debug!(
            target: "sqlmapper.sql",
            op = op.name(),
            pool = driver.name(),
            sql = %self.log_sql(sql),
            "dispatch"
        );
        RowStream::new(RoutedStream::open(driver, sql, self.options.clone()))
    }

    /// Disconnect every pool. Statements issued afterwards fail.
    pub async fn shutdown(&self) -> OrmResult<()> {
        let mut first_err = None;
        for driver in std::iter::once(&self.write).chain(self.reads.iter()) {
            if let Err(e) = driver.shutdown().await {
                tracing::error!(pool = driver.name(), error = %e, "pool shutdown failed");
                first_err.get_or_insert(e);
            }
        }
        tracing::info!(pools = self.reads.len() + 1, "router shut down");
        first_err.map_or(Ok(()), Err)
    }
}

/// Truncate SQL at a char boundary no later than `max` bytes.
pub(crate) fn truncate_sql(sql: &str, max: Option<usize>) -> Cow<'_, str> {
    match max {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while end > 0 && !sql.is_char_boundary(end) {
                end -= 1;
            }
            Cow::Owned(format!("{}...", &sql[..end]))
        }
        _ => Cow::Borrowed(sql),
    }
}
