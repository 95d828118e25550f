use super::{RouterOptions, truncate_sql};
use crate::client::{Driver, RowStream};
use crate::error::{OrmError, OrmResult};
use crate::normalize::normalize_row;
use crate::value::Record;
use futures_core::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

type OpenFuture = Pin<Box<dyn Future<Output = OrmResult<RowStream>> + Send>>;

enum State {
    /// Rejected before dispatch; the error is yielded once.
    Failed(OrmError),
    Opening(OpenFuture),
    Streaming(RowStream),
    Done,
}

/// Lazily opened stream: `OPEN -> (row)* -> END | ERROR`.
pub(super) struct RoutedStream {
    state: State,
    pool: String,
    sql: String,
    options: RouterOptions,
    start: Instant,
    rows: usize,
}

impl RoutedStream {
    pub(super) fn failed(err: OrmError) -> Self {
        Self {
            state: State::Failed(err),
            pool: String::new(),
            sql: String::new(),
            options: RouterOptions::default(),
            start: Instant::now(),
            rows: 0,
        }
    }

    pub(super) fn open(driver: Arc<dyn Driver>, sql: &str, options: RouterOptions) -> Self {
        let pool = driver.name().to_string();
        let owned = sql.to_string();
        let open: OpenFuture = Box::pin(async move { driver.open_stream(&owned).await });
        Self {
            state: State::Opening(open),
            pool,
            sql: sql.to_string(),
            options,
            start: Instant::now(),
            rows: 0,
        }
    }

    fn fail(&self, err: OrmError) -> OrmError {
        tracing::error!(
            op = "stream",
            pool = %self.pool,
            rows = self.rows,
            sql = %truncate_sql(&self.sql, self.options.max_sql_log_length),
            error = %err,
            "stream failed"
        );
        OrmError::Execution {
            operation: "stream",
        }
    }

    fn finish(&self) {
        let elapsed = self.start.elapsed();
        tracing::debug!(
            target: "sqlmapper.sql",
            op = "stream",
            pool = %self.pool,
            rows = self.rows,
            elapsed_ms = elapsed.as_millis() as u64,
            "stream finished"
        );
        if let Some(threshold) = self.options.slow_query_threshold {
            if elapsed > threshold {
                tracing::warn!(
                    op = "stream",
                    pool = %self.pool,
                    elapsed_ms = elapsed.as_millis() as u64,
                    sql = %truncate_sql(&self.sql, self.options.max_sql_log_length),
                    "slow query"
                );
            }
        }
    }
}

impl Stream for RoutedStream {
    type Item = OrmResult<Record>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match std::mem::replace(&mut this.state, State::Done) {
                State::Done => return Poll::Ready(None),
                State::Failed(err) => return Poll::Ready(Some(Err(err))),
                State::Opening(mut open) => match open.as_mut().poll(cx) {
                    Poll::Pending => {
                        this.state = State::Opening(open);
                        return Poll::Pending;
                    }
                    Poll::Ready(Ok(rows)) => this.state = State::Streaming(rows),
                    Poll::Ready(Err(e)) => return Poll::Ready(Some(Err(this.fail(e)))),
                },
                State::Streaming(mut rows) => match Pin::new(&mut rows).poll_next(cx) {
                    Poll::Pending => {
                        this.state = State::Streaming(rows);
                        return Poll::Pending;
                    }
                    Poll::Ready(Some(Ok(row))) => {
                        this.rows += 1;
                        this.state = State::Streaming(rows);
                        return Poll::Ready(Some(Ok(normalize_row(row))));
                    }
                    // Dropping `rows` here releases the producer.
                    Poll::Ready(Some(Err(e))) => return Poll::Ready(Some(Err(this.fail(e)))),
                    Poll::Ready(None) => {
                        this.finish();
                        return Poll::Ready(None);
                    }
                },
            }
        }
    }
}
