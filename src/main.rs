//! tilexec demo binary
//!
//! Loads a small table into in-memory storage and runs a few plans
//! against it, printing the result rows.

use std::sync::Arc;

use parking_lot::RwLock;
use tilexec::catalog::{Catalog, ColumnDef, DataType, TableDef};
use tilexec::config::ExecutorConfig;
use tilexec::executor::{Datum, PlanExecutor, RowDescriptor};
use tilexec::plan::{AggregateExpr, AggregateFunc, Expr, PlanNode, SortKey};
use tilexec::storage::MemoryStorage;
use tilexec::txn::TransactionManager;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ExecutorConfig::from_env();
    tracing::info!(tile_size = config.tile_size, policy = ?config.unsupported_nodes, "Starting tilexec");

    let storage = Arc::new(MemoryStorage::new());
    let mut catalog = Catalog::new();
    catalog.create_table(
        TableDef::new("accounts")
            .column(ColumnDef::new("id", DataType::BigInt).nullable(false))
            .column(ColumnDef::new("owner", DataType::Text).nullable(false))
            .column(ColumnDef::new("balance", DataType::BigInt)),
    )?;

    let manager = Arc::new(TransactionManager::new(storage.clone()));
    let executor = PlanExecutor::new(
        storage,
        Arc::new(RwLock::new(catalog)),
        manager.clone(),
        config,
    );

    let load = PlanNode::insert(
        "accounts",
        vec![
            vec![Expr::lit(1), Expr::lit("ada"), Expr::lit(120)],
            vec![Expr::lit(2), Expr::lit("grace"), Expr::lit(75)],
            vec![Expr::lit(3), Expr::lit("edsger"), Expr::lit(300)],
            vec![Expr::lit(4), Expr::lit("barbara"), Expr::lit(Datum::Null)],
        ],
    );
    let loaded = executor
        .execute_plan_default(
            Some(&load),
            &[],
            &RowDescriptor::default(),
            manager.allocate_id(),
        )
        .await?;
    println!("load: {:?}", loaded.result);

    // Accounts over a threshold, richest first
    let query = PlanNode::order_by(vec![SortKey {
        column: 2,
        ascending: false,
    }])
    .with_child(PlanNode::filtered_scan(
        "accounts",
        Expr::gt(Expr::col(2), Expr::param(0)),
    ));
    let desc = RowDescriptor::default()
        .column("id", DataType::BigInt)
        .column("owner", DataType::Text)
        .column("balance", DataType::BigInt);
    let rich = executor
        .execute_plan_default(Some(&query), &[Datum::Int(100)], &desc, manager.allocate_id())
        .await?;
    for row in &rich.rows {
        let values: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("{}", values.join(" | "));
    }

    let totals = PlanNode::aggregate(
        vec![],
        vec![
            AggregateExpr::new(AggregateFunc::CountStar, None, "accounts"),
            AggregateExpr::new(AggregateFunc::Sum, Some(Expr::col(2)), "total"),
        ],
    )
    .with_child(PlanNode::seq_scan("accounts"));
    let desc = RowDescriptor::default()
        .column("accounts", DataType::BigInt)
        .column("total", DataType::BigInt);
    let summary = executor
        .execute_plan_default(Some(&totals), &[], &desc, manager.allocate_id())
        .await?;
    for row in &summary.rows {
        let values: Vec<String> = row.iter().map(ToString::to_string).collect();
        println!("totals: {}", values.join(" | "));
    }

    tracing::info!(
        committed = manager.committed_count(),
        aborted = manager.aborted_count(),
        "done"
    );
    Ok(())
}
