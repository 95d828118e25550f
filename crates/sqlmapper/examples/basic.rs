//! Query building and routing without a database
//!
//! Run with: cargo run --example basic -p sqlmapper
//!
//! A scripted `MockDriver` stands in for MySQL so every generated statement
//! can be printed.

use sqlmapper::{
    Dao, DriverAck, Entity, Filter, FromRecord, MockDriver, OrmError, QueryOptions, Router,
    ToRecord, record,
};
use std::sync::Arc;

#[derive(Debug, Clone, FromRecord, ToRecord, Entity)]
#[orm(table = "users")]
struct User {
    id: i64,
    first_name: String,
    last_name: String,
    email: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), OrmError> {
    let write = MockDriver::new("write");
    let read = MockDriver::new("read-0");
    let router = Arc::new(Router::builder(write.clone()).read(read.clone()).build());
    let users = Dao::<User>::for_entity(Arc::clone(&router))?;

    // Writes go to the write pool.
    write.push_ack(DriverAck {
        affected_rows: 1,
        insert_id: 1,
        ..Default::default()
    });
    let created = users
        .create(&User {
            id: 1,
            first_name: "John".into(),
            last_name: "O'Hara".into(),
            email: None,
        })
        .await?;
    println!("inserted id={} via {:?}", created.insert_id, write.last_sql());

    // Reads go to a replica.
    read.push_rows(vec![record! {
        "id" => 1,
        "first_name" => "John",
        "last_name" => "O'Hara",
        "email" => sqlmapper::Value::Null,
    }]);
    let found = users
        .get_all(
            Filter::new().eq("lastName", "O'Hara").gt("age", 18),
            &QueryOptions::new().sort_desc("createdAt").limit(10),
        )
        .await?;
    println!("found {found:?} via {:?}", read.last_sql());

    // Operator objects can come straight from JSON.
    let filter = serde_json::json!({ "age": { "gte": 21, "lt": 65 }, "deletedAt": null });
    users.update_all(filter, &record! { "isActive" => true }).await?;
    println!("{:?}", write.last_sql());

    // Unfiltered deletes are refused before reaching a pool.
    match users.delete_all(Filter::new()).await {
        Err(e) => println!("refused: {e}"),
        Ok(_) => unreachable!(),
    }

    router.shutdown().await
}
