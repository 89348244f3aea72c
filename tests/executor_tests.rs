//! Executor integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use tilexec::catalog::{Catalog, ColumnDef, DataType, TableDef};
use tilexec::config::{ExecutorConfig, UnsupportedNodePolicy};
use tilexec::executor::{
    add_materialization, Datum, Executor, ExecutorError, PlanExecutor, Row, RowConverter,
    RowDescriptor, TreeBuilder,
};
use tilexec::plan::{
    AggregateExpr, AggregateFunc, BinaryOp, Expr, PlanKind, PlanNode, PlanNodeType, ProjectColumn,
    SortKey,
};
use tilexec::storage::MemoryStorage;
use tilexec::txn::{
    Transaction, TransactionId, TransactionManager, TransactionRegistry, TransactionResult,
    TxnOutcome,
};

/// Registry that counts begin, commit and abort calls
struct CountingRegistry {
    inner: TransactionManager,
    begins: AtomicUsize,
    commits: AtomicUsize,
    aborts: AtomicUsize,
}

impl CountingRegistry {
    fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }

    fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    fn aborts(&self) -> usize {
        self.aborts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionRegistry for CountingRegistry {
    fn lookup(&self, id: TransactionId) -> Option<Arc<Transaction>> {
        self.inner.lookup(id)
    }

    fn begin(&self, id: TransactionId) -> TransactionResult<Arc<Transaction>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        self.inner.begin(id)
    }

    fn lookup_or_begin(&self, id: TransactionId) -> TransactionResult<(Arc<Transaction>, bool)> {
        let (txn, created) = self.inner.lookup_or_begin(id)?;
        if created {
            self.begins.fetch_add(1, Ordering::SeqCst);
        }
        Ok((txn, created))
    }

    async fn commit(&self, txn: &Transaction) -> TransactionResult<()> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit(txn).await
    }

    async fn abort(&self, txn: &Transaction) -> TransactionResult<()> {
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.inner.abort(txn).await
    }
}

struct Harness {
    storage: Arc<MemoryStorage>,
    registry: Arc<CountingRegistry>,
    executor: PlanExecutor,
}

fn harness(config: ExecutorConfig) -> Harness {
    let storage = Arc::new(MemoryStorage::new());
    let mut catalog = Catalog::new();
    catalog
        .create_table(
            TableDef::new("users")
                .column(ColumnDef::new("id", DataType::BigInt).nullable(false))
                .column(ColumnDef::new("name", DataType::Text).nullable(false))
                .column(ColumnDef::new("age", DataType::Int)),
        )
        .unwrap();
    catalog
        .create_table(
            TableDef::new("orders")
                .column(ColumnDef::new("order_id", DataType::BigInt).nullable(false))
                .column(ColumnDef::new("user_id", DataType::BigInt).nullable(false))
                .column(ColumnDef::new("amount", DataType::BigInt).nullable(false)),
        )
        .unwrap();

    let registry = Arc::new(CountingRegistry {
        inner: TransactionManager::new(storage.clone()),
        begins: AtomicUsize::new(0),
        commits: AtomicUsize::new(0),
        aborts: AtomicUsize::new(0),
    });
    let executor = PlanExecutor::new(
        storage.clone(),
        Arc::new(RwLock::new(catalog)),
        registry.clone(),
        config,
    );
    Harness {
        storage,
        registry,
        executor,
    }
}

fn users_desc() -> RowDescriptor {
    RowDescriptor::default()
        .column("id", DataType::BigInt)
        .column("name", DataType::Text)
        .column("age", DataType::Int)
}

fn user(id: i64, name: &str, age: Option<i64>) -> Row {
    Row::new(vec![
        Datum::Int(id),
        Datum::from(name),
        age.map_or(Datum::Null, Datum::Int),
    ])
}

fn ids(rows: &[Row]) -> Vec<i64> {
    rows.iter().map(|r| r.get(0).unwrap().as_int().unwrap()).collect()
}

/// Insert users in their own implicit transaction
async fn seed(h: &Harness, users: &[(i64, &str, Option<i64>)]) {
    let values = users
        .iter()
        .map(|(id, name, age)| {
            vec![
                Expr::lit(*id),
                Expr::lit(*name),
                Expr::lit(age.map_or(Datum::Null, Datum::Int)),
            ]
        })
        .collect();
    let plan = PlanNode::insert("users", values);
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &RowDescriptor::default(), TransactionId(1000))
        .await
        .unwrap();
    assert_eq!(res.result, TxnOutcome::Success);
}

async fn scan_users(h: &Harness, txn_id: u64) -> Vec<Row> {
    let plan = PlanNode::seq_scan("users");
    h.executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(txn_id))
        .await
        .unwrap()
        .rows
}

#[tokio::test]
async fn test_seq_scan_root_is_materialized() {
    let h = harness(ExecutorConfig::default());
    seed(&h, &[(1, "A", Some(30)), (2, "B", None)]).await;
    let commits_before = h.registry.commits();

    let plan = PlanNode::seq_scan("users");
    let txn = Transaction::new(TransactionId(77));
    let builder = TreeBuilder::new(h.executor.env(), h.executor.config());
    let tree = builder.build(Some(&plan), &[], &txn).unwrap();
    let root = add_materialization(tree.root).unwrap();
    assert_eq!(root.node_type(), PlanNodeType::Materialize);
    assert!(root.plan_node().is_none());
    assert_eq!(root.children()[0].node_type(), PlanNodeType::SeqScan);

    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(1))
        .await
        .unwrap();
    assert_eq!(res.rows, vec![user(1, "A", Some(30)), user(2, "B", None)]);
    assert_eq!(res.result, TxnOutcome::Success);
    assert_eq!(h.registry.commits(), commits_before + 1);
    assert_eq!(h.registry.aborts(), 0);
}

#[tokio::test]
async fn test_physical_roots_are_not_wrapped() {
    let h = harness(ExecutorConfig::default());
    let txn = Transaction::new(TransactionId(1));
    let builder = TreeBuilder::new(h.executor.env(), h.executor.config());

    let projection = PlanNode::projection(vec![ProjectColumn::new(
        Expr::col(0),
        "id",
        DataType::BigInt,
    )])
    .with_child(PlanNode::seq_scan("users"));
    let root = add_materialization(builder.build(Some(&projection), &[], &txn).unwrap().root)
        .unwrap();
    assert_eq!(root.node_type(), PlanNodeType::Projection);
    assert!(std::ptr::eq(root.plan_node().unwrap(), &projection));

    let limit = PlanNode::limit(Some(1), 0).with_child(PlanNode::seq_scan("users"));
    let root = add_materialization(builder.build(Some(&limit), &[], &txn).unwrap().root).unwrap();
    assert_eq!(root.node_type(), PlanNodeType::Materialize);
    assert_eq!(root.children()[0].node_type(), PlanNodeType::Limit);
}

#[tokio::test]
async fn test_rows_follow_pull_and_tile_order() {
    let h = harness(ExecutorConfig::default().with_tile_size(2));
    seed(
        &h,
        &[
            (5, "e", None),
            (3, "c", None),
            (1, "a", None),
            (4, "d", None),
            (2, "b", None),
        ],
    )
    .await;

    assert_eq!(ids(&scan_users(&h, 1).await), vec![1, 2, 3, 4, 5]);

    let range = PlanNode::index_scan("users", Some(Expr::param(0)), Some(Expr::param(1)));
    let res = h
        .executor
        .execute_plan_default(
            Some(&range),
            &[Datum::Int(2), Datum::Int(4)],
            &users_desc(),
            TransactionId(2),
        )
        .await
        .unwrap();
    assert_eq!(ids(&res.rows), vec![2, 3, 4]);
}

#[tokio::test]
async fn test_rerun_with_new_txn_yields_same_rows() {
    let h = harness(ExecutorConfig::default().with_tile_size(3));
    seed(&h, &[(1, "a", Some(20)), (2, "b", Some(40)), (3, "c", Some(60))]).await;

    let plan = PlanNode::limit(Some(2), 1).with_child(PlanNode::filtered_scan(
        "users",
        Expr::gt(Expr::col(2), Expr::param(0)),
    ));
    let params = [Datum::Int(10)];
    let first = h
        .executor
        .execute_plan_default(Some(&plan), &params, &users_desc(), TransactionId(10))
        .await
        .unwrap();
    let second = h
        .executor
        .execute_plan_default(Some(&plan), &params, &users_desc(), TransactionId(11))
        .await
        .unwrap();
    assert_eq!(ids(&first.rows), vec![2, 3]);
    assert_eq!(first.rows, second.rows);
}

#[tokio::test]
async fn test_unsupported_sole_root() {
    let h = harness(ExecutorConfig::default());
    let flushes = h.storage.flush_count();

    let plan = PlanNode::unsupported("HashJoin");
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(42))
        .await
        .unwrap();
    assert!(res.rows.is_empty());
    assert_eq!(res.result, TxnOutcome::Success);
    assert_eq!(res.gaps.len(), 1);
    assert_eq!(res.gaps[0].name, "HashJoin");

    assert_eq!(h.registry.begins(), 0);
    assert_eq!(h.registry.commits() + h.registry.aborts(), 0);
    assert!(h.registry.lookup(TransactionId(42)).is_none());
    assert_eq!(h.storage.flush_count(), flushes);
    assert!(h.storage.is_empty());
}

#[tokio::test]
async fn test_all_unsupported_plan_yields_no_rows() {
    let h = harness(ExecutorConfig::default());
    let plan = PlanNode::unsupported("Hash").with_child(PlanNode::new(PlanKind::Invalid));
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(6))
        .await
        .unwrap();
    assert!(res.rows.is_empty());
    assert_eq!(res.result, TxnOutcome::Success);
    assert_eq!(res.gaps.len(), 2);
    assert_eq!(h.registry.begins(), 0);
    assert_eq!(h.registry.commits() + h.registry.aborts(), 0);
    assert!(h.registry.lookup(TransactionId(6)).is_none());

    // A caller's transaction is neither closed nor changed
    let caller = h.registry.begin(TransactionId(7)).unwrap();
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(7))
        .await
        .unwrap();
    assert_eq!(res.result, TxnOutcome::Success);
    assert_eq!(h.registry.commits() + h.registry.aborts(), 0);
    assert!(caller.is_active());
}

#[tokio::test]
async fn test_null_plan_touches_nothing() {
    let h = harness(ExecutorConfig::default());
    let res = h
        .executor
        .execute_plan_default(None, &[], &users_desc(), TransactionId(7))
        .await
        .unwrap();
    assert!(res.rows.is_empty());
    assert_eq!(res.result, TxnOutcome::Success);
    assert!(h.registry.lookup(TransactionId(7)).is_none());
    assert_eq!(h.registry.commits() + h.registry.aborts(), 0);
}

#[tokio::test]
async fn test_init_failure_aborts_implicit_txn() {
    let h = harness(ExecutorConfig::default());
    let plan = PlanNode::seq_scan("ghosts");
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(8))
        .await
        .unwrap();
    assert!(res.rows.is_empty());
    assert_eq!(res.result, TxnOutcome::Failure);
    assert_eq!(h.registry.aborts(), 1);
    assert_eq!(h.registry.commits(), 0);
}

#[tokio::test]
async fn test_init_failure_closes_caller_txn() {
    let h = harness(ExecutorConfig::default());
    let caller = h.registry.begin(TransactionId(9)).unwrap();

    // Delete needs a child; init fails before any pull
    let plan = PlanNode::delete("users");
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(9))
        .await
        .unwrap();
    assert_eq!(res.result, TxnOutcome::Failure);
    assert_eq!(h.registry.aborts(), 1);
    assert!(!caller.is_active());
}

#[tokio::test]
async fn test_implicit_txn_closed_exactly_once() {
    let h = harness(ExecutorConfig::default());
    seed(&h, &[(1, "a", None)]).await;
    assert_eq!(h.registry.commits(), 1);

    for (i, txn_id) in (20..25).enumerate() {
        scan_users(&h, txn_id).await;
        assert_eq!(h.registry.commits(), i + 2);
    }
    assert_eq!(h.registry.aborts(), 0);
}

#[tokio::test]
async fn test_caller_txn_left_to_caller() {
    let h = harness(ExecutorConfig::default());
    let caller = h.registry.begin(TransactionId(30)).unwrap();

    let insert = PlanNode::insert(
        "users",
        vec![vec![Expr::lit(1), Expr::lit("a"), Expr::lit(Datum::Null)]],
    );
    let res = h
        .executor
        .execute_plan_default(Some(&insert), &[], &users_desc(), TransactionId(30))
        .await
        .unwrap();
    assert_eq!(res.result, TxnOutcome::Success);
    assert_eq!(h.registry.commits() + h.registry.aborts(), 0);
    assert!(caller.is_active());

    // Same transaction, second statement
    let res = h
        .executor
        .execute_plan_default(
            Some(&PlanNode::seq_scan("users")),
            &[],
            &users_desc(),
            TransactionId(30),
        )
        .await
        .unwrap();
    assert_eq!(ids(&res.rows), vec![1]);

    h.registry.commit(&caller).await.unwrap();
    assert_eq!(h.registry.commits(), 1);
    assert_eq!(ids(&scan_users(&h, 31).await), vec![1]);
}

#[tokio::test]
async fn test_caller_abort_rolls_back_writes() {
    let h = harness(ExecutorConfig::default());
    seed(&h, &[(1, "a", Some(10)), (2, "b", Some(20)), (3, "c", Some(30))]).await;
    let before = scan_users(&h, 40).await;

    let caller = h.registry.begin(TransactionId(41)).unwrap();
    let statements = [
        PlanNode::update("users", vec![(2, Expr::lit(99))])
            .with_child(PlanNode::index_scan("users", Some(Expr::lit(1)), Some(Expr::lit(2)))),
        PlanNode::delete("users").with_child(PlanNode::filtered_scan(
            "users",
            Expr::eq(Expr::col(0), Expr::lit(3)),
        )),
        PlanNode::insert(
            "users",
            vec![vec![Expr::lit(4), Expr::lit("d"), Expr::lit(Datum::Null)]],
        ),
    ];
    for plan in &statements {
        let res = h
            .executor
            .execute_plan_default(Some(plan), &[], &users_desc(), TransactionId(41))
            .await
            .unwrap();
        assert_eq!(res.result, TxnOutcome::Success);
    }
    assert_eq!(caller.undo_log().len(), 4);

    h.registry.abort(&caller).await.unwrap();
    assert_eq!(scan_users(&h, 42).await, before);
}

#[tokio::test]
async fn test_update_root_produces_no_rows() {
    let h = harness(ExecutorConfig::default());
    seed(&h, &[(1, "a", Some(10)), (2, "b", Some(20))]).await;

    let plan = PlanNode::update(
        "users",
        vec![(2, Expr::binary(BinaryOp::Add, Expr::col(2), Expr::param(0)))],
    )
    .with_child(PlanNode::seq_scan("users"));
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[Datum::Int(1)], &users_desc(), TransactionId(50))
        .await
        .unwrap();
    assert!(res.rows.is_empty());
    assert_eq!(res.result, TxnOutcome::Success);
    assert_eq!(h.registry.commits(), 2);

    let ages: Vec<_> = scan_users(&h, 51)
        .await
        .iter()
        .map(|r| r.get(2).unwrap().as_int().unwrap())
        .collect();
    assert_eq!(ages, vec![11, 21]);
}

#[tokio::test]
async fn test_execution_failure_keeps_partial_rows() {
    let h = harness(ExecutorConfig::default().with_tile_size(1));
    seed(&h, &[(1, "a", None), (2, "b", None), (3, "c", None)]).await;

    // 100 / (id - 3) fails on the third tile
    let plan = PlanNode::projection(vec![ProjectColumn::new(
        Expr::binary(
            BinaryOp::Div,
            Expr::lit(100),
            Expr::binary(BinaryOp::Sub, Expr::col(0), Expr::lit(3)),
        ),
        "q",
        DataType::BigInt,
    )])
    .with_child(PlanNode::seq_scan("users"));
    let desc = RowDescriptor::default().column("q", DataType::BigInt);
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &desc, TransactionId(60))
        .await
        .unwrap();
    assert_eq!(ids(&res.rows), vec![-50, -100]);
    assert_eq!(res.result, TxnOutcome::Failure);
    assert_eq!(h.registry.aborts(), 1);
}

#[tokio::test]
async fn test_failed_insert_is_rolled_back() {
    let h = harness(ExecutorConfig::default());
    seed(&h, &[(1, "a", None)]).await;

    let plan = PlanNode::insert(
        "users",
        vec![
            vec![Expr::lit(10), Expr::lit("j"), Expr::lit(Datum::Null)],
            vec![Expr::lit(1), Expr::lit("dup"), Expr::lit(Datum::Null)],
        ],
    );
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(61))
        .await
        .unwrap();
    assert_eq!(res.result, TxnOutcome::Failure);
    assert_eq!(ids(&scan_users(&h, 62).await), vec![1]);
}

#[tokio::test]
async fn test_reject_policy_fails_before_txn() {
    let h = harness(ExecutorConfig::default().with_unsupported_nodes(UnsupportedNodePolicy::Reject));
    let plan = PlanNode::limit(Some(1), 0).with_child(PlanNode::unsupported("Hash"));
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &users_desc(), TransactionId(70))
        .await;
    assert!(matches!(
        res,
        Err(ExecutorError::UnsupportedPlanNode { node_type: PlanNodeType::Unsupported, .. })
    ));
    assert!(h.registry.lookup(TransactionId(70)).is_none());
    assert_eq!(h.registry.commits() + h.registry.aborts(), 0);
}

/// Keeps rows with an even key only
struct EvenRows;

impl RowConverter for EvenRows {
    type Output = i64;

    fn convert(&self, row: &Row, _descriptor: &RowDescriptor) -> Option<i64> {
        row.get(0).ok()?.as_int().filter(|id| id % 2 == 0)
    }
}

#[tokio::test]
async fn test_unconvertible_rows_are_dropped() {
    let h = harness(ExecutorConfig::default());
    seed(&h, &[(1, "a", None), (2, "b", None), (3, "c", None), (4, "d", None)]).await;

    let plan = PlanNode::seq_scan("users");
    let res = h
        .executor
        .execute_plan(Some(&plan), &[], &users_desc(), TransactionId(80), &EvenRows)
        .await
        .unwrap();
    assert_eq!(res.rows, vec![2, 4]);
    assert_eq!(res.result, TxnOutcome::Success);

    // Rows of the wrong shape never reach the caller
    let narrow = RowDescriptor::default().column("id", DataType::BigInt);
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &narrow, TransactionId(81))
        .await
        .unwrap();
    assert!(res.rows.is_empty());
    assert_eq!(res.result, TxnOutcome::Success);
}

async fn seed_orders(h: &Harness) {
    let plan = PlanNode::insert(
        "orders",
        [(100, 1, 5), (101, 2, 7), (102, 1, 11), (103, 3, 2)]
            .iter()
            .map(|(o, u, a)| vec![Expr::lit(*o), Expr::lit(*u), Expr::lit(*a)])
            .collect(),
    );
    h.executor
        .execute_plan_default(Some(&plan), &[], &RowDescriptor::default(), TransactionId(900))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_nested_loop_join_through_engine() {
    let h = harness(ExecutorConfig::default().with_tile_size(2));
    seed(&h, &[(1, "a", None), (2, "b", None)]).await;
    seed_orders(&h).await;

    // users.id = orders.user_id
    let plan = PlanNode::nested_loop_join(Some(Expr::eq(Expr::col(0), Expr::col(4))))
        .with_child(PlanNode::seq_scan("users"))
        .with_child(PlanNode::seq_scan("orders"));
    let desc = users_desc()
        .column("order_id", DataType::BigInt)
        .column("user_id", DataType::BigInt)
        .column("amount", DataType::BigInt);
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &desc, TransactionId(90))
        .await
        .unwrap();
    let pairs: Vec<(i64, i64)> = res
        .rows
        .iter()
        .map(|r| (r.get(0).unwrap().as_int().unwrap(), r.get(3).unwrap().as_int().unwrap()))
        .collect();
    assert_eq!(pairs, vec![(1, 100), (1, 102), (2, 101)]);
}

#[tokio::test]
async fn test_sorted_merge_join_and_aggregate() {
    let h = harness(ExecutorConfig::default());
    seed(&h, &[(1, "a", None), (2, "b", None), (3, "c", None)]).await;
    seed_orders(&h).await;

    // orders sorted by user_id, merged with users on id, summed per user
    let join = PlanNode::merge_join(0, 1)
        .with_child(PlanNode::seq_scan("users"))
        .with_child(
            PlanNode::order_by(vec![SortKey {
                column: 1,
                ascending: true,
            }])
            .with_child(PlanNode::seq_scan("orders")),
        );
    let plan = PlanNode::aggregate(
        vec![1],
        vec![
            AggregateExpr::new(AggregateFunc::CountStar, None, "orders"),
            AggregateExpr::new(AggregateFunc::Sum, Some(Expr::col(5)), "total"),
        ],
    )
    .with_child(join);
    let desc = RowDescriptor::default()
        .column("name", DataType::Text)
        .column("orders", DataType::BigInt)
        .column("total", DataType::BigInt);
    let res = h
        .executor
        .execute_plan_default(Some(&plan), &[], &desc, TransactionId(91))
        .await
        .unwrap();
    assert_eq!(
        res.rows,
        vec![
            Row::new(vec![Datum::from("a"), Datum::Int(2), Datum::Int(16)]),
            Row::new(vec![Datum::from("b"), Datum::Int(1), Datum::Int(7)]),
            Row::new(vec![Datum::from("c"), Datum::Int(1), Datum::Int(2)]),
        ]
    );
}
