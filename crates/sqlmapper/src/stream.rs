//! Typed row streams.

use crate::client::RowStream;
use crate::error::OrmResult;
use crate::value::Record;
use futures_core::Stream;
use futures_core::stream::FusedStream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Row constructor shared by a DAO and the streams it opens.
pub type Mapper<T> = Arc<dyn Fn(Record) -> OrmResult<T> + Send + Sync>;

/// A stream of mapped rows.
///
/// Each row is mapped as it is pulled, in order. The first error (from the source or
/// from the mapper) is yielded once; after it the stream ends.
#[must_use = "streams do nothing unless polled"]
pub struct RecordStream<T> {
    rows: RowStream,
    mapper: Mapper<T>,
    done: bool,
}

impl<T> RecordStream<T> {
    pub fn new(rows: RowStream, mapper: Mapper<T>) -> Self {
        Self {
            rows,
            mapper,
            done: false,
        }
    }
}

impl<T> Stream for RecordStream<T> {
    type Item = OrmResult<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.done {
            return Poll::Ready(None);
        }

        let item = match Pin::new(&mut self.rows).poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(None) => {
                self.done = true;
                return Poll::Ready(None);
            }
            Poll::Ready(Some(row)) => row.and_then(|row| (self.mapper)(row)),
        };

        if item.is_err() {
            self.done = true;
        }
        Poll::Ready(Some(item))
    }
}

impl<T> FusedStream for RecordStream<T> {
    fn is_terminated(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OrmError;
    use crate::record;
    use futures_util::StreamExt;

    fn ids() -> Mapper<i64> {
        Arc::new(|row: Record| row.try_get::<i64>("id"))
    }

    #[tokio::test]
    async fn maps_rows_in_order() {
        let rows = RowStream::from_rows(vec![
            record! { "id" => 1 },
            record! { "id" => 2 },
            record! { "id" => 3 },
        ]);
        let out: Vec<i64> = RecordStream::new(rows, ids())
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn ends_after_source_error() {
        let rows = RowStream::from_items(vec![
            Ok(record! { "id" => 1 }),
            Err(OrmError::driver("lost connection")),
            Ok(record! { "id" => 2 }),
        ]);
        let mut stream = RecordStream::new(rows, ids());
        assert_eq!(stream.next().await.unwrap().unwrap(), 1);
        assert!(stream.next().await.unwrap().is_err());
        assert!(stream.next().await.is_none());
        assert!(stream.is_terminated());
    }

    #[tokio::test]
    async fn mapping_error_is_passed_through() {
        let rows = RowStream::from_rows(vec![record! { "id" => "not a number" }, record! { "id" => 2 }]);
        let mut stream = RecordStream::new(rows, ids());
        match stream.next().await {
            Some(Err(OrmError::Decode { column, .. })) => assert_eq!(column, "id"),
            other => panic!("unexpected: {:?}", other.map(|r| r.is_ok())),
        }
        assert!(stream.next().await.is_none());
    }
}
