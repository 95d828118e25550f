//! Stream rows from MySQL with backpressure.
//!
//! Run with:
//! SQLMAPPER_WRITE_URL=mysql://root:pw@localhost/shop cargo run --example streaming -p sqlmapper

use futures_util::StreamExt;
use sqlmapper::{Dao, FromRecord, OrmResult, Router, RouterConfig};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, FromRecord)]
struct Item {
    n: i64,
}

#[tokio::main]
async fn main() -> OrmResult<()> {
    dotenvy::dotenv().ok();

    let router = Arc::new(Router::connect(&RouterConfig::from_env()?)?);
    let items = Dao::<Item>::from_record(Arc::clone(&router), "items")?;

    let mut stream = items.stream_from_sql(
        "WITH RECURSIVE seq (n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 10) \
         SELECT n FROM seq",
    );

    while let Some(item) = stream.next().await {
        let item = item?;
        println!("{}", item.n);

        // Slow consumer; the driver only reads ahead by one row.
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    router.shutdown().await
}
