#![allow(dead_code)]
#![cfg(feature = "derive")]

use sqlmapper::{
    Dao, Entity, FromRecord, MockDriver, OrmError, QueryOptions, Record, Router, ToRecord, Value,
    record,
};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, FromRecord, ToRecord, Entity)]
#[orm(table = "users")]
struct User {
    id: i64,
    first_name: String,
    #[orm(column = "email_address")]
    email: Option<String>,
    #[orm(skip)]
    tags: Vec<String>,
}

#[derive(Debug, FromRecord, Entity)]
struct AuditEntry {
    id: u64,
    #[orm(default)]
    note: String,
}

#[test]
fn from_record_reads_columns() {
    let user = User::from_record(record! {
        "id" => 7,
        "first_name" => "Ann",
        "email_address" => Value::Null,
    })
    .unwrap();

    assert_eq!(
        user,
        User {
            id: 7,
            first_name: "Ann".into(),
            email: None,
            tags: Vec::new(),
        }
    );
}

#[test]
fn from_record_missing_column_is_decode_error() {
    let err = User::from_record(record! { "id" => 7 }).unwrap_err();
    assert!(matches!(err, OrmError::Decode { .. }), "{err:?}");
}

#[test]
fn default_attribute_tolerates_missing_column() {
    let entry = AuditEntry::from_record(record! { "id" => 1 }).unwrap();
    assert_eq!(entry.note, "");
}

#[test]
fn to_record_writes_renamed_columns_and_skips() {
    let user = User {
        id: 1,
        first_name: "Ann".into(),
        email: Some("a@x.io".into()),
        tags: vec!["x".into()],
    };
    let record = user.to_record().unwrap();

    let keys: Vec<&str> = record.keys().collect();
    assert_eq!(keys, vec!["id", "first_name", "email_address"]);
    assert_eq!(record.get("email_address"), Some(&Value::from("a@x.io")));
}

#[test]
fn entity_table_names() {
    assert_eq!(User::TABLE, "users");
    assert_eq!(AuditEntry::TABLE, "audit_entry");
}

#[tokio::test]
async fn entity_dao_round_trip_through_mock() {
    let write = MockDriver::new("write");
    write.push_rows(vec![record! { "id" => 1, "first_name" => "Ann", "email_address" => "a@x.io" }]);
    let dao = Dao::<User>::for_entity(Arc::new(Router::new(write.clone()))).unwrap();

    let users = dao.get_all(Record::new(), &QueryOptions::new()).await.unwrap();
    assert_eq!(users[0].email.as_deref(), Some("a@x.io"));
    assert_eq!(write.last_sql().as_deref(), Some("SELECT * FROM users"));

    dao.create(&users[0]).await.unwrap();
    assert_eq!(
        write.last_sql().as_deref(),
        Some("INSERT INTO users (`id`, `first_name`, `email_address`) VALUES (1, 'Ann', 'a@x.io')")
    );
}
