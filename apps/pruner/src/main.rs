//! Queue Pruner - Entry Point
//!
//! CLI that consumes a queue, drops messages matching substring rules, and
//! optionally republishes the rest.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    queue_pruner::run().await
}
