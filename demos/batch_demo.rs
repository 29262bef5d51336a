//! Batch execution walkthrough.
//!
//! Runs against `DBMSDB_URL` when set, otherwise against an in-process mock.
//!
//! ```sh
//! cargo run --example batch_demo
//! ```

use anyhow::Result;
use dbmsdb::{Client, ClientConfig, InsertOptions, QueryOptions};
use dbmsdb_mock::{MockConfig, MockServer};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dbmsdb_core=debug,dbmsdb=debug")),
        )
        .init();

    let (_mock, url) = match std::env::var("DBMSDB_URL") {
        Ok(url) => (None, url),
        Err(_) => {
            let server = MockServer::start(MockConfig::ephemeral())?;
            let url = server.url();
            (Some(server), url)
        }
    };
    println!("Using server at {}", url);

    let client = Client::new(ClientConfig::default().with_url(url))?;
    let db = client.database("school");
    if !db.has_relation("students").await? {
        db.create_relation("students", None).await?;
    }

    let batch = db.begin_batch_execution(true);
    let students = batch.relation("students");
    let kris = students
        .insert(json!({"_key": "Kris", "age": 20}), InsertOptions::default())
        .await?;
    let rita = students
        .insert(json!({"_key": "Rita", "age": 22}), InsertOptions::default())
        .await?;
    let constant = batch.sql().execute("RETURN 1", QueryOptions::default()).await?;
    let invalid = batch.sql().execute("INVALID QUERY", QueryOptions::default()).await?;

    println!("Queued {} calls, committing", batch.len());
    batch.commit().await?;

    if let Some(jobs) = batch.queued_jobs() {
        for job in jobs {
            println!("  job {} at position {}: {}", job.id(), job.position(), job.status());
        }
    }

    for job in [kris, rita].into_iter().flatten() {
        match job.result() {
            Ok(meta) => println!("Inserted {}", meta["_id"]),
            Err(err) => println!("Insert failed: {}", err),
        }
    }
    if let Some(job) = constant {
        let mut cursor = job.result()?;
        println!("RETURN 1 gave {:?}", cursor.all().await?);
    }
    if let Some(job) = invalid {
        if let Err(err) = job.result() {
            println!("Invalid query failed as expected: {}", err);
        }
    }

    println!("students now holds {} documents", db.relation("students").count().await?);
    Ok(())
}
