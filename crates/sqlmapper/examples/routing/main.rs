//! Read/write routing from a TOML file.
//!
//! Run with: cargo run --example routing -p sqlmapper -- router.toml
//!
//! ```toml
//! read_balance = "round_robin"
//! slow_query_threshold_ms = 250
//!
//! [write]
//! host = "db-primary"
//! user = "app"
//! password = "${DB_PASSWORD}"
//! database = "shop"
//!
//! [[reads]]
//! hosts = ["db-replica-1", "db-replica-2"]
//! user = "app"
//! password = "${DB_PASSWORD}"
//! database = "shop"
//! ```

use sqlmapper::{Dao, Filter, QueryOptions, Router, RouterConfig};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "router.toml".to_string());
    let config = RouterConfig::from_toml_file(&path)?;
    let router = Arc::new(Router::connect(&config)?);
    println!("read pools: {}", router.read_pool_count());

    let orders = Dao::raw(Arc::clone(&router), "orders")?;
    let page = orders
        .get_all_and_count(
            Filter::new().eq("status", "open"),
            &QueryOptions::new().sort_desc("createdAt").limit(20),
        )
        .await?;
    println!("{} of {} open orders", page.results.len(), page.count);

    // Read-your-writes: bypass replicas right after a change.
    orders
        .update_one(Filter::new().eq("id", 1), &sqlmapper::record! { "status" => "closed" })
        .await?;
    let fresh = orders
        .get_one_from_master(Filter::new().eq("id", 1), &QueryOptions::new())
        .await?;
    println!("{fresh:?}");

    router.shutdown().await?;
    Ok(())
}
