//! DAO behavior over scripted drivers.
//!
//! These tests do NOT need a database: every statement goes to a `MockDriver`
//! and the generated SQL is checked from its log.

use futures_util::StreamExt;
use serde_json::json;
use sqlmapper::{
    Dao, DriverAck, Filter, MockDriver, MockResponse, OrmError, OrmResult, QueryOptions, Record,
    Router, Value, record,
};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: i64,
    name: String,
}

fn user_from(record: Record) -> OrmResult<User> {
    Ok(User {
        id: record.try_get("id")?,
        name: record.try_get("name")?,
    })
}

fn users(router: Router) -> Dao<User> {
    Dao::new(Arc::new(router), "users", user_from).unwrap()
}

fn ack(affected_rows: u64, insert_id: u64) -> DriverAck {
    DriverAck {
        affected_rows,
        insert_id,
        ..Default::default()
    }
}

// ── Reads ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn get_one_maps_first_row() {
    let read = MockDriver::new("read-0");
    read.push_rows(vec![record! { "id" => 1, "name" => "Ann" }]);
    let dao = users(Router::builder(MockDriver::new("write")).read(read.clone()).build());

    let user = dao
        .get_one(Filter::new().eq("firstName", "Ann"), &QueryOptions::new())
        .await
        .unwrap();

    assert_eq!(
        user,
        Some(User {
            id: 1,
            name: "Ann".into()
        })
    );
    assert_eq!(
        read.last_sql().as_deref(),
        Some("SELECT * FROM users WHERE (first_name = 'Ann')")
    );
}

#[tokio::test]
async fn empty_results_are_none_and_empty() {
    let dao = users(Router::new(MockDriver::new("write")));

    let one = dao.get_one(Filter::new(), &QueryOptions::new()).await.unwrap();
    let all = dao.get_all(Filter::new(), &QueryOptions::new()).await.unwrap();

    assert_eq!(one, None);
    assert!(all.is_empty());
}

#[tokio::test]
async fn get_all_and_count_runs_both_statements() {
    let write = MockDriver::new("write");
    let dao = users(Router::new(write.clone()));
    write.push_rows(vec![
        record! { "id" => 1, "name" => "Ann" },
        record! { "id" => 2, "name" => "Bob" },
    ]);
    write.push_rows(vec![record! { "count" => 7 }]);

    let page = dao
        .get_all_and_count(
            Filter::new().gt("age", 18),
            &QueryOptions::new().sort_asc("id").limit(2),
        )
        .await
        .unwrap();

    assert_eq!(page.results.len(), 2);
    assert_eq!(page.count, 7);

    let executed = write.executed();
    assert_eq!(executed.len(), 2);
    assert!(executed.iter().any(|sql| sql.starts_with("SELECT * FROM users")
        && sql.ends_with("ORDER BY id ASC LIMIT 2")));
    assert!(executed
        .iter()
        .any(|sql| sql.starts_with("SELECT COUNT(*) AS count FROM users") && !sql.contains("LIMIT")));
}

#[tokio::test]
async fn count_of_empty_result_is_zero() {
    let dao = users(Router::new(MockDriver::new("write")));
    assert_eq!(dao.get_count(Filter::new()).await.unwrap(), 0);
}

#[tokio::test]
async fn from_master_reads_skip_replicas() {
    let write = MockDriver::new("write");
    let read = MockDriver::new("read-0");
    let dao = users(Router::builder(write.clone()).read(read.clone()).build());

    dao.get_all_from_master(Filter::new(), &QueryOptions::new())
        .await
        .unwrap();
    dao.get_count_from_master(Filter::new()).await.unwrap();

    assert_eq!(write.executed().len(), 2);
    assert!(read.executed().is_empty());
}

#[tokio::test]
async fn json_filters_are_accepted() {
    let write = MockDriver::new("write");
    let dao = Dao::raw(Arc::new(Router::new(write.clone())), "users").unwrap();

    dao.get_all(
        json!({ "lastName": "Doe", "age": { "gte": 21 } }),
        &QueryOptions::new(),
    )
    .await
    .unwrap();

    let sql = write.last_sql().unwrap();
    assert!(sql.contains("last_name = 'Doe'"), "{sql}");
    assert!(sql.contains(">= 21"), "{sql}");
}

#[tokio::test]
async fn raw_dao_returns_records() {
    let write = MockDriver::new("write");
    write.push_rows(vec![record! { "id" => 3, "meta" => Value::Null }]);
    let dao = Dao::raw(Arc::new(Router::new(write)), "users").unwrap();

    let rows = dao.get_all_from_sql("SELECT * FROM users").await.unwrap();
    assert_eq!(rows, vec![record! { "id" => 3, "meta" => Value::Null }]);
}

#[tokio::test]
async fn mapping_errors_pass_through_unwrapped() {
    let write = MockDriver::new("write");
    write.push_rows(vec![record! { "id" => "not a number", "name" => "Ann" }]);
    let dao = users(Router::new(write));

    let err = dao
        .get_all(Filter::new(), &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Decode { .. }), "{err:?}");
}

#[tokio::test]
async fn driver_errors_are_wrapped() {
    let write = MockDriver::new("write");
    write.push_error("Table 'shop.users' doesn't exist");
    let dao = users(Router::new(write));

    let err = dao
        .get_all(Filter::new(), &QueryOptions::new())
        .await
        .unwrap_err();
    assert!(err.is_execution());
    assert_eq!(err.to_string(), "Error executing select query");
}

// ── Writes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_reports_insert_id() {
    let write = MockDriver::new("write");
    write.push_ack(ack(1, 42));
    let dao = users(Router::new(write.clone()));

    let result = dao
        .create(&record! { "firstName" => "John", "lastName" => "O'Brien" })
        .await
        .unwrap();

    assert_eq!(result.affected_rows, 1);
    assert_eq!(result.insert_id, 42);
    assert_eq!(
        write.last_sql().as_deref(),
        Some("INSERT INTO users (`first_name`, `last_name`) VALUES ('John', 'O\\'Brien')")
    );
}

#[tokio::test]
async fn create_bulk_reorders_to_first_row() {
    let write = MockDriver::new("write");
    let dao = users(Router::new(write.clone()));

    dao.create_bulk(&[record! { "a" => 1, "b" => "x" }, record! { "b" => "y", "a" => 2 }])
        .await
        .unwrap();

    assert_eq!(
        write.last_sql().as_deref(),
        Some("INSERT INTO users (`a`, `b`) VALUES (1, 'x'), (2, 'y')")
    );
}

#[tokio::test]
async fn upsert_targets_write_pool() {
    let write = MockDriver::new("write");
    let read = MockDriver::new("read-0");
    write.push_ack(ack(2, 1));
    let dao = users(Router::builder(write.clone()).read(read.clone()).build());

    let result = dao
        .upsert(&record! { "id" => 1, "name" => "Ann" }, vec!["name"])
        .await
        .unwrap();

    assert_eq!(result.affected_rows, 2);
    let sql = write.last_sql().unwrap();
    assert!(sql.contains("ON DUPLICATE KEY UPDATE"), "{sql}");
    assert!(read.executed().is_empty());
}

#[tokio::test]
async fn update_and_delete_one_are_limited() {
    let write = MockDriver::new("write");
    let dao = users(Router::new(write.clone()));

    dao.update_one(Filter::new().eq("id", 5), &record! { "name" => "Bo" })
        .await
        .unwrap();
    dao.delete_one(Filter::new().eq("id", 5)).await.unwrap();

    let executed = write.executed();
    assert!(executed[0].starts_with("UPDATE users SET `name` = 'Bo' WHERE"));
    assert!(executed[0].ends_with("LIMIT 1"));
    assert!(executed[1].starts_with("DELETE FROM users WHERE"));
    assert!(executed[1].ends_with("LIMIT 1"));
}

#[tokio::test]
async fn unfiltered_update_and_delete_never_reach_the_driver() {
    let write = MockDriver::new("write");
    let dao = users(Router::new(write.clone()));

    let err = dao.delete_all(Filter::new()).await.unwrap_err();
    assert!(err.is_validation());
    let err = dao
        .update_all(Filter::new(), &record! { "name" => "x" })
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let err = dao
        .update_all(Filter::new().eq("id", 1), &Record::new())
        .await
        .unwrap_err();
    assert!(err.is_validation());

    assert!(write.executed().is_empty());
}

#[tokio::test]
async fn from_sql_writes_check_statement_kind() {
    let write = MockDriver::new("write");
    let dao = users(Router::new(write.clone()));

    let err = dao
        .delete_from_sql("UPDATE users SET name = 'x' WHERE id = 1")
        .await
        .unwrap_err();
    assert!(err.is_validation());
    assert!(write.executed().is_empty());

    dao.update_from_sql("UPDATE users SET name = 'x' WHERE id = 1")
        .await
        .unwrap();
    dao.insert_from_sql("INSERT INTO users (id) VALUES (1) ON DUPLICATE KEY UPDATE id = id")
        .await
        .unwrap();
    assert_eq!(write.executed().len(), 2);
}

#[tokio::test]
async fn changed_rows_come_from_driver_info() {
    let write = MockDriver::new("write");
    write.push_ack(DriverAck {
        affected_rows: 3,
        info: Some("Rows matched: 3  Changed: 1  Warnings: 0".into()),
        ..Default::default()
    });
    let dao = users(Router::new(write));

    let result = dao
        .update_all(Filter::new().gt("id", 0), &record! { "name" => "x" })
        .await
        .unwrap();
    assert_eq!(result.changed_rows, Some(1));
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn build_failures_are_logged_as_errors() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let write = MockDriver::new("write");
    let dao = users(Router::new(write.clone()));

    let err = dao
        .get_all(Filter::new(), &QueryOptions::new().offset(5))
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let err = dao
        .create_bulk(&[record! { "a" => 1 }, record! { "b" => 2 }])
        .await
        .unwrap_err();
    assert!(err.is_validation());
    let _: Vec<_> = dao
        .stream(Filter::new(), &QueryOptions::new().offset(5))
        .collect()
        .await;

    let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
    assert_eq!(output.matches("query build failed").count(), 3, "{output}");
    assert!(output.contains("ERROR"), "{output}");
    assert!(output.contains("table=users"), "{output}");
    assert!(write.executed().is_empty());
}

// ── Streams ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn stream_yields_the_same_rows_as_get_all() {
    let rows = vec![
        record! { "id" => 1, "name" => "Ann" },
        record! { "id" => 2, "name" => "Bob" },
    ];
    let write = MockDriver::new("write");
    write.push_rows(rows.clone());
    write.push_rows(rows);
    let dao = users(Router::new(write));

    let all = dao.get_all(Filter::new(), &QueryOptions::new()).await.unwrap();
    let streamed: Vec<User> = dao
        .stream(Filter::new(), &QueryOptions::new())
        .map(|row| row.unwrap())
        .collect()
        .await;

    assert_eq!(all, streamed);
}

#[tokio::test]
async fn stream_build_error_is_single_item() {
    let write = MockDriver::new("write");
    let dao = users(Router::new(write.clone()));

    let items: Vec<_> = dao
        .stream(Filter::new(), &QueryOptions::new().offset(10))
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(items[0].as_ref().unwrap_err().is_validation());
    assert!(write.executed().is_empty());
}

#[tokio::test]
async fn stream_stops_after_driver_error() {
    let write = MockDriver::new("write");
    write.push(MockResponse::RowsThenError(
        vec![record! { "id" => 1, "name" => "Ann" }],
        "connection reset".into(),
    ));
    let dao = users(Router::new(write));

    let items: Vec<_> = dao.stream_from_sql("SELECT * FROM users").collect().await;

    assert_eq!(items.len(), 2);
    assert!(items[0].is_ok());
    assert!(items[1].as_ref().unwrap_err().is_execution());
}

#[tokio::test]
async fn stream_from_sql_rejects_writes() {
    let write = MockDriver::new("write");
    let dao = users(Router::new(write.clone()));

    let items: Vec<_> = dao
        .stream_from_sql_from_master("DELETE FROM users WHERE id = 1")
        .collect()
        .await;

    assert_eq!(items.len(), 1);
    assert!(items[0].is_err());
    assert!(write.executed().is_empty());
}
