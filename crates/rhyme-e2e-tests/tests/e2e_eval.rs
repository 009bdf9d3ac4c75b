mod common;

use rhyme_ir::{AssignOp, BinaryOp, Expr, ProgramBuilder};
use serde_json::json;

#[test]
fn total_sum() {
    let mut b = ProgramBuilder::new();
    b.generator("*A", Expr::Input.field("data"));
    b.assign("tmp0", vec![], AssignOp::Add, common::item().field("value"));
    let p = b.finish(Expr::tmp("tmp0"));
    assert_eq!(common::eval(&p, common::sales()), json!(100));
}

#[test]
fn group_by_sum() {
    let p = common::group_by(AssignOp::Add, Some(0), common::item().field("value"));
    assert_eq!(common::eval(&p, common::sales()), json!({"A": 70, "B": 30}));
}

#[test]
fn group_by_count() {
    let p = common::group_by(AssignOp::Add, Some(0), Expr::constant(1));
    assert_eq!(common::eval(&p, common::sales()), json!({"A": 2, "B": 1}));
}

#[test]
fn group_by_max() {
    let p = common::group_by(AssignOp::Max, None, common::item().field("value"));
    assert_eq!(common::eval(&p, common::sales()), json!({"A": 60, "B": 30}));
}

#[test]
fn group_by_collect() {
    let p = common::group_by(AssignOp::Push, None, common::item().field("value"));
    assert_eq!(
        common::eval(&p, common::sales()),
        json!({"A": [10, 60], "B": [30]})
    );
}

#[test]
fn percent_of_total_reads_closed_aggregates() {
    let p = common::percent_by_key();
    assert_eq!(common::eval(&p, common::sales()), json!({"A": 70, "B": 30}));
}

#[test]
fn weighted_share_reruns_first_loop() {
    let p = common::share_of_weighted_total();
    let data = json!({"a": {"x": 10, "y": 40}, "b": {"p": 1}});
    assert_eq!(common::eval(&p, data), json!({"x": 20, "y": 80}));
}

#[test]
fn group_by_count_skips_missing_values() {
    let p = common::group_by(AssignOp::Count, None, common::item().field("value"));
    let data = json!({"data": [
        {"key": "A", "value": 1},
        {"key": "A", "value": null},
        {"key": "B", "value": 3},
        {"key": "A", "value": 4}
    ]});
    assert_eq!(common::eval(&p, data), json!({"A": 2, "B": 1}));
}

fn nested(result: &str) -> rhyme_ir::Program {
    let mut b = ProgramBuilder::new();
    b.generator("*K", Expr::Input);
    b.generator("*D", Expr::Input.get(Expr::var("*K")));
    let cell = Expr::Input.get(Expr::var("*K")).get(Expr::var("*D"));
    b.assign("tmp0", vec![Expr::var("*K")], AssignOp::Add, cell.clone());
    b.assign("tmp1", vec![], AssignOp::Max, cell);
    b.assign(
        "tmp2",
        vec![],
        AssignOp::Assign,
        Expr::tmp("tmp0")
            .field("B")
            .binary(BinaryOp::Add, Expr::tmp("tmp1")),
    );
    b.finish(Expr::tmp(result))
}

#[test]
fn nested_groups() {
    let data = json!({"A": [1, 2], "B": {"x": 3, "y": 4}});
    assert_eq!(common::eval(&nested("tmp0"), data.clone()), json!({"A": 3, "B": 7}));
    assert_eq!(common::eval(&nested("tmp1"), data.clone()), json!(4));
    assert_eq!(common::eval(&nested("tmp2"), data), json!(11));
}

#[test]
fn empty_input_yields_null() {
    let p = common::group_by(AssignOp::Add, Some(0), Expr::constant(1));
    assert_eq!(common::eval(&p, json!({"data": []})), json!(null));
}
