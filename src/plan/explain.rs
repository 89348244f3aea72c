//! Plan pretty-printing for trace output

use std::fmt::Write;

use super::{PlanKind, PlanNode};

/// Render a plan tree, one node per line, children indented
pub fn explain(plan: &PlanNode) -> String {
    let mut out = String::new();
    format_node(plan, 0, &mut out);
    out
}

fn format_node(plan: &PlanNode, indent: usize, out: &mut String) {
    let prefix = "  ".repeat(indent);

    // Writing to a String cannot fail
    let _ = match plan.kind() {
        PlanKind::Invalid => writeln!(out, "{}Invalid", prefix),
        PlanKind::SeqScan(scan) => match &scan.predicate {
            Some(p) => writeln!(out, "{}SeqScan: {} filter {}", prefix, scan.table, p),
            None => writeln!(out, "{}SeqScan: {}", prefix, scan.table),
        },
        PlanKind::IndexScan(scan) => {
            let bound = |b: &Option<_>| match b {
                Some(e) => format!("{}", e),
                None => "..".to_string(),
            };
            writeln!(
                out,
                "{}IndexScan: {} [{}, {}]",
                prefix,
                scan.table,
                bound(&scan.low),
                bound(&scan.high)
            )
        }
        PlanKind::Insert(insert) => {
            writeln!(out, "{}Insert: {} ({} rows)", prefix, insert.table, insert.values.len())
        }
        PlanKind::Delete(delete) => writeln!(out, "{}Delete: {}", prefix, delete.table),
        PlanKind::Update(update) => {
            let cols: Vec<_> = update
                .assignments
                .iter()
                .map(|(c, e)| format!("#{} = {}", c, e))
                .collect();
            writeln!(out, "{}Update: {} [{}]", prefix, update.table, cols.join(", "))
        }
        PlanKind::Limit(limit) => match limit.limit {
            Some(n) => writeln!(out, "{}Limit: {} offset {}", prefix, n, limit.offset),
            None => writeln!(out, "{}Limit: all offset {}", prefix, limit.offset),
        },
        PlanKind::NestedLoopJoin(join) => match &join.predicate {
            Some(p) => writeln!(out, "{}NestedLoopJoin: {}", prefix, p),
            None => writeln!(out, "{}NestedLoopJoin: cross", prefix),
        },
        PlanKind::MergeJoin(join) => writeln!(
            out,
            "{}MergeJoin: #{} = #{}",
            prefix, join.left_key, join.right_key
        ),
        PlanKind::Projection(proj) => {
            let names: Vec<_> = proj.columns.iter().map(|c| c.name.as_str()).collect();
            writeln!(out, "{}Projection: [{}]", prefix, names.join(", "))
        }
        PlanKind::Materialize => writeln!(out, "{}Materialize", prefix),
        PlanKind::Aggregate(agg) => {
            let names: Vec<_> = agg.aggregates.iter().map(|a| a.name.as_str()).collect();
            writeln!(
                out,
                "{}Aggregate: group by {:?} [{}]",
                prefix,
                agg.group_by,
                names.join(", ")
            )
        }
        PlanKind::OrderBy(order) => {
            let keys: Vec<_> = order
                .keys
                .iter()
                .map(|k| format!("#{} {}", k.column, if k.ascending { "ASC" } else { "DESC" }))
                .collect();
            writeln!(out, "{}OrderBy: [{}]", prefix, keys.join(", "))
        }
        PlanKind::Unsupported(name) => writeln!(out, "{}Unsupported: {}", prefix, name),
    };

    for child in plan.children() {
        format_node(child, indent + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{Expr, SortKey};

    #[test]
    fn test_explain_indents_children() {
        let plan = PlanNode::order_by(vec![SortKey {
            column: 1,
            ascending: false,
        }])
        .with_child(
            PlanNode::nested_loop_join(Some(Expr::eq(Expr::col(0), Expr::col(2))))
                .with_child(PlanNode::seq_scan("a"))
                .with_child(PlanNode::unsupported("Hash")),
        );

        let text = explain(&plan);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "OrderBy: [#1 DESC]",
                "  NestedLoopJoin: (#0 = #2)",
                "    SeqScan: a",
                "    Unsupported: Hash",
            ]
        );
    }
}
