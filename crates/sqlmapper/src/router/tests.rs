use super::*;
use crate::client::DriverAck;
use crate::mock::{MockDriver, MockResponse};
use crate::{Value, record};
use futures_util::StreamExt;

fn replicated() -> (Router, MockDriver, MockDriver, MockDriver) {
    let write = MockDriver::new("write");
    let r0 = MockDriver::new("read-0");
    let r1 = MockDriver::new("read-1");
    let router = Router::builder(write.clone())
        .read(r0.clone())
        .read(r1.clone())
        .build();
    (router, write, r0, r1)
}

#[tokio::test]
async fn test_reads_fall_back_to_write() {
    let write = MockDriver::new("write");
    write.push_rows(vec![record! { "id" => 1 }]);
    let router = Router::new(write.clone());

    assert_eq!(router.read_pool_count(), 0);
    let rows = router.select_all("SELECT * FROM users").await.unwrap();
    assert_eq!(rows, vec![record! { "id" => 1 }]);
    assert_eq!(write.executed(), vec!["SELECT * FROM users"]);
}

#[tokio::test]
async fn test_round_robin_reads() {
    let (router, write, r0, r1) = replicated();
    for _ in 0..4 {
        router.select_all("SELECT 1").await.unwrap();
    }
    assert_eq!(r0.executed().len(), 2);
    assert_eq!(r1.executed().len(), 2);
    assert!(write.executed().is_empty());
}

#[tokio::test]
async fn test_first_read_balance() {
    let r0 = MockDriver::new("read-0");
    let r1 = MockDriver::new("read-1");
    let router = Router::builder(MockDriver::new("write"))
        .read(r0.clone())
        .read(r1.clone())
        .options(RouterOptions::new().read_balance(ReadBalance::First))
        .build();
    for _ in 0..3 {
        router.select_one("SELECT 1").await.unwrap();
    }
    assert_eq!(r0.executed().len(), 3);
    assert!(r1.executed().is_empty());
}

#[tokio::test]
async fn test_from_master_and_writes_use_write_pool() {
    let (router, write, r0, r1) = replicated();
    router.select_one_from_master("SELECT 1").await.unwrap();
    router.select_all_from_master("SELECT 2").await.unwrap();
    router.update("UPDATE t SET a = 1 WHERE id = 1").await.unwrap();
    router.delete("DELETE FROM t WHERE id = 1").await.unwrap();
    assert_eq!(write.executed().len(), 4);
    assert!(r0.executed().is_empty() && r1.executed().is_empty());
}

#[tokio::test]
async fn test_empty_results() {
    let router = Router::new(MockDriver::new("write"));
    assert_eq!(router.select_one("SELECT * FROM users WHERE id = 0").await.unwrap(), None);
    assert!(router.select_all("SELECT * FROM users WHERE id = 0").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_kind_mismatch_fails_before_dispatch() {
    let (router, write, r0, r1) = replicated();

    let err = router.insert("SELECT * FROM users").await.unwrap_err();
    assert!(matches!(err, OrmError::StatementKind { expected: "INSERT", .. }));

    let err = router.select_all("DELETE FROM users").await.unwrap_err();
    assert!(err.is_validation());

    let err = router.upsert("INSERT INTO t (a) VALUES (1)").await.unwrap_err();
    assert!(matches!(err, OrmError::StatementKind { expected: "UPSERT", .. }));

    assert!(router.update("DELETE FROM t WHERE id = 1").await.is_err());
    assert!(router.delete("UPDATE t SET a = 1").await.is_err());

    assert!(write.executed().is_empty());
    assert!(r0.executed().is_empty() && r1.executed().is_empty());
}

#[tokio::test]
async fn test_insert_accepts_upsert() {
    let write = MockDriver::new("write");
    write.push_ack(DriverAck {
        affected_rows: 2,
        insert_id: 5,
        ..Default::default()
    });
    let router = Router::new(write.clone());
    let result = router
        .insert("INSERT INTO t (a) VALUES (1) ON DUPLICATE KEY UPDATE a = a")
        .await
        .unwrap();
    assert_eq!(result.affected_rows, 2);
    assert_eq!(result.insert_id, 5);
    assert_eq!(result.changed_rows, None);
}

#[tokio::test]
async fn test_update_reports_changed_rows() {
    let write = MockDriver::new("write");
    write.push_ack(DriverAck {
        affected_rows: 4,
        info: Some("Rows matched: 4  Changed: 3  Warnings: 0".to_string()),
        ..Default::default()
    });
    let router = Router::new(write);
    let result = router.update("UPDATE t SET a = 1 WHERE b = 2").await.unwrap();
    assert_eq!(result.affected_rows, 4);
    assert_eq!(result.changed_rows, Some(3));
}

#[tokio::test]
async fn test_driver_error_is_wrapped() {
    let write = MockDriver::new("write");
    write.push_error("Table 'app.users' doesn't exist");
    let router = Router::new(write);

    let err = router.select_all("SELECT * FROM users").await.unwrap_err();
    assert!(err.is_execution());
    assert_eq!(err.to_string(), "Error executing select query");
    assert!(!err.to_string().contains("doesn't exist"));
}

#[tokio::test]
async fn test_generic_query_is_unchecked() {
    let write = MockDriver::new("write");
    write.push_ack(DriverAck::default());
    write.push_rows(vec![record! { "Tables_in_app" => "users" }]);
    let router = Router::new(write.clone());

    assert!(matches!(
        router.execute_generic_query("CREATE TABLE x (id INT)").await.unwrap(),
        DriverResult::Ack(_)
    ));
    match router.execute_generic_query("SHOW TABLES").await.unwrap() {
        DriverResult::Rows(rows) => assert_eq!(rows.len(), 1),
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(write.executed().len(), 2);
}

#[tokio::test]
async fn test_stream_is_lazy() {
    let write = MockDriver::new("write");
    write.push_rows(vec![record! { "id" => 1 }, record! { "id" => 2 }]);
    let router = Router::new(write.clone());

    let stream = router.stream_query("SELECT id FROM t");
    assert!(write.executed().is_empty());

    let rows: Vec<_> = stream.collect().await;
    assert_eq!(write.executed(), vec!["SELECT id FROM t"]);
    let ids: Vec<Value> = rows
        .into_iter()
        .map(|r| r.unwrap().get("id").cloned().unwrap())
        .collect();
    assert_eq!(ids, vec![Value::Int(1), Value::Int(2)]);
}

#[tokio::test]
async fn test_stream_error_then_end() {
    let write = MockDriver::new("write");
    write.push(MockResponse::RowsThenError(
        vec![record! { "id" => 1 }],
        "connection reset".to_string(),
    ));
    let router = Router::new(write);

    let mut stream = router.stream_query_from_master("SELECT id FROM t");
    assert!(stream.next().await.unwrap().is_ok());
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(err.is_execution());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_stream_open_error() {
    let write = MockDriver::new("write");
    write.push_error("access denied");
    let router = Router::new(write);

    let mut stream = router.stream_query("SELECT 1");
    assert!(stream.next().await.unwrap().unwrap_err().is_execution());
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_stream_rejects_non_select() {
    let write = MockDriver::new("write");
    let router = Router::new(write.clone());

    let mut stream = router.stream_query("DELETE FROM t");
    assert!(stream.next().await.unwrap().unwrap_err().is_validation());
    assert!(stream.next().await.is_none());
    assert!(write.executed().is_empty());
}

#[tokio::test]
async fn test_shutdown_closes_all_pools() {
    let (router, write, r0, r1) = replicated();
    router.shutdown().await.unwrap();
    assert!(write.is_shut_down() && r0.is_shut_down() && r1.is_shut_down());

    let err = router.select_all("SELECT 1").await.unwrap_err();
    assert!(err.is_execution());
}

#[test]
fn test_truncate_sql() {
    assert_eq!(truncate_sql("SELECT 1", Some(100)), "SELECT 1");
    assert_eq!(truncate_sql("SELECT 1", Some(3)), "SEL...");
    assert_eq!(truncate_sql("SELECT 'é'", Some(9)), "SELECT '...");
    assert_eq!(truncate_sql("SELECT 1", None), "SELECT 1");
}
