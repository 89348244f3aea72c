//! tilexec - plan compilation and tile-at-a-time execution
//!
//! Features:
//! - Compiles physical plan trees into pull-based operator trees
//! - Batch (tile) oriented scans, joins, projection, aggregation and sorting
//! - Statement-scoped or caller-scoped transactions with undo-based abort

pub mod catalog;
pub mod config;
pub mod executor;
pub mod plan;
pub mod storage;
pub mod txn;
