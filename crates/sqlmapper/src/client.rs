//! Driver capability consumed by the [`Router`](crate::Router).
//!
//! A driver owns one physical connection pool and executes complete SQL text. The
//! router never talks to a wire protocol directly; the shipped `mysql_async` adapter
//! lives in [`crate::pool`], and [`MockDriver`](crate::MockDriver) serves tests.

use crate::error::OrmResult;
use crate::value::Record;
use async_trait::async_trait;
use futures_core::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// Write acknowledgement reported by a driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverAck {
    pub affected_rows: u64,
    pub insert_id: u64,
    /// Rows actually changed by an UPDATE, when the driver reports it directly.
    pub changed_rows: Option<u64>,
    /// Server info string (`Rows matched: 1  Changed: 1  Warnings: 0`).
    pub info: Option<String>,
}

/// Raw outcome of one statement: a result set or a write acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverResult {
    Rows(Vec<Record>),
    Ack(DriverAck),
}

/// A database driver bound to one connection pool.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short label used in logs (e.g. `write`, `read-0`).
    fn name(&self) -> &str;

    /// Execute one statement and buffer its complete result.
    async fn execute(&self, sql: &str) -> OrmResult<DriverResult>;

    /// Execute a row-returning statement and hand rows out as they are pulled.
    ///
    /// The default implementation buffers through [`Driver::execute`].
    async fn open_stream(&self, sql: &str) -> OrmResult<RowStream> {
        match self.execute(sql).await? {
            DriverResult::Rows(rows) => Ok(RowStream::from_rows(rows)),
            DriverResult::Ack(_) => Ok(RowStream::from_rows(Vec::new())),
        }
    }

    /// Disconnect every connection held by this driver.
    async fn shutdown(&self) -> OrmResult<()> {
        Ok(())
    }
}

/// A stream of result rows.
///
/// This is a type-erased wrapper around a `Stream<Item = OrmResult<Record>>` so that
/// different drivers can return a uniform streaming type.
#[must_use]
pub struct RowStream {
    inner: Pin<Box<dyn Stream<Item = OrmResult<Record>> + Send>>,
}

impl RowStream {
    /// Create a new `RowStream` from any compatible stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = OrmResult<Record>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Stream over rows that are already buffered.
    pub fn from_rows(rows: Vec<Record>) -> Self {
        Self::from_items(rows.into_iter().map(Ok).collect())
    }

    /// Stream over a fixed sequence of items (rows and errors).
    pub fn from_items(items: Vec<OrmResult<Record>>) -> Self {
        Self::new(Buffered {
            items: items.into_iter(),
        })
    }

    /// Stream fed by a producer task through a bounded channel.
    ///
    /// The producer can only run ahead of the consumer by the channel capacity.
    pub fn from_receiver(rx: mpsc::Receiver<OrmResult<Record>>) -> Self {
        Self::new(Channel { rx })
    }
}

impl std::fmt::Debug for RowStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowStream").finish_non_exhaustive()
    }
}

impl Stream for RowStream {
    type Item = OrmResult<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

struct Buffered {
    items: std::vec::IntoIter<OrmResult<Record>>,
}

impl Stream for Buffered {
    type Item = OrmResult<Record>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.items.next())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}

struct Channel {
    rx: mpsc::Receiver<OrmResult<Record>>,
}

impl Stream for Channel {
    type Item = OrmResult<Record>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
