//! In-memory scripted driver.
//!
//! `MockDriver` records every statement it receives and answers with queued
//! responses, so routers and DAOs can be exercised without a database.
//!
//! ```ignore
//! let write = MockDriver::new("write");
//! write.push_ack(DriverAck { affected_rows: 1, insert_id: 7, ..Default::default() });
//! let router = Router::new(write.clone());
//! ```

use crate::client::{Driver, DriverAck, DriverResult, RowStream};
use crate::error::{OrmError, OrmResult};
use crate::value::Record;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Rows(Vec<Record>),
    Ack(DriverAck),
    /// The statement fails with a driver error.
    Error(String),
    /// Streams the rows, then fails (buffered execution fails outright).
    RowsThenError(Vec<Record>, String),
}

#[derive(Debug, Default)]
struct MockState {
    queue: VecDeque<MockResponse>,
    executed: Vec<String>,
    shut_down: bool,
}

/// Scripted [`Driver`]; clones share the same script and log.
///
/// When the queue is empty, statements succeed with an empty result set.
#[derive(Debug, Clone)]
pub struct MockDriver {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, response: MockResponse) -> &Self {
        self.state().queue.push_back(response);
        self
    }

    pub fn push_rows(&self, rows: Vec<Record>) -> &Self {
        self.push(MockResponse::Rows(rows))
    }

    pub fn push_ack(&self, ack: DriverAck) -> &Self {
        self.push(MockResponse::Ack(ack))
    }

    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.push(MockResponse::Error(message.into()))
    }

    /// Every statement received so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.state().executed.last().cloned()
    }

    pub fn clear_executed(&self) {
        self.state().executed.clear();
    }

    pub fn is_shut_down(&self) -> bool {
        self.state().shut_down
    }

    fn next_response(&self, sql: &str) -> OrmResult<MockResponse> {
        let mut state = self.state();
        if state.shut_down {
            return Err(OrmError::driver(format!("{}: pool is closed", self.name)));
        }
        state.executed.push(sql.to_string());
        Ok(state
            .queue
            .pop_front()
            .unwrap_or(MockResponse::Rows(Vec::new())))
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, sql: &str) -> OrmResult<DriverResult> {
        match self.next_response(sql)? {
            MockResponse::Rows(rows) => Ok(DriverResult::Rows(rows)),
            MockResponse::Ack(ack) => Ok(DriverResult::Ack(ack)),
            MockResponse::Error(message) | MockResponse::RowsThenError(_, message) => {
                Err(OrmError::driver(message))
            }
        }
    }

    async fn open_stream(&self, sql: &str) -> OrmResult<RowStream> {
        match self.next_response(sql)? {
            MockResponse::Rows(rows) => Ok(RowStream::from_rows(rows)),
            MockResponse::Ack(_) => Ok(RowStream::from_rows(Vec::new())),
            MockResponse::Error(message) => Err(OrmError::driver(message)),
            MockResponse::RowsThenError(rows, message) => {
                let mut items: Vec<OrmResult<Record>> = rows.into_iter().map(Ok).collect();
                items.push(Err(OrmError::driver(message)));
                Ok(RowStream::from_items(items))
            }
        }
    }

    async fn shutdown(&self) -> OrmResult<()> {
        self.state().shut_down = true;
        Ok(())
    }
}
