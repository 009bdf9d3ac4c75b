//! Property-based tests for the loop-fusion scheduler.
//!
//! Random acyclic programs are built from a small shape description:
//! - loops, each iterating a field of the input, the keys of an
//!   accumulator, or nested in an earlier loop;
//! - writes to accumulators, each keyed by a subset of the loops and
//!   reading a subset of the accumulators declared before it.
//!
//! A write to `tmpN` only uses loops that (through their parents) iterate
//! accumulators below `N`, which keeps the programs acyclic.
//!
//! Every such program must schedule, and the schedule must pass
//! verification.

use std::collections::BTreeSet;

use proptest::prelude::*;

use rhyme_ir::{AssignOp, BinaryOp, Expr, Program, ProgramBuilder, StmtId};
use rhyme_sched::{ScheduleOptions, compile_schedule};

// ============================================================================
// Test Helpers
// ============================================================================

#[derive(Clone, Debug)]
struct Shape {
    /// Per loop: odd values nest the loop in an earlier one, values equal
    /// to 2 mod 4 iterate an accumulator.
    parents: Vec<u8>,
    /// Per write: (accumulator, loop mask, read mask).
    writes: Vec<(u8, u8, u8)>,
}

fn shape() -> impl Strategy<Value = Shape> {
    (
        proptest::collection::vec(any::<u8>(), 1..5),
        proptest::collection::vec((0u8..5, any::<u8>(), any::<u8>()), 0..12),
    )
        .prop_map(|(parents, writes)| Shape { parents, writes })
}

fn loop_name(i: usize) -> String {
    format!("*L{i}")
}

fn tmp_name(i: usize) -> String {
    format!("tmp{i}")
}

fn build(shape: &Shape) -> Program {
    let mut b = ProgramBuilder::new();
    let loops = shape.parents.len();
    // highest accumulator each loop iterates, itself or through a parent
    let mut iterates: Vec<Option<usize>> = Vec::with_capacity(loops);
    for (i, &p) in shape.parents.iter().enumerate() {
        let (source, reach) = if i > 0 && p % 2 == 1 {
            let parent = (p as usize / 2) % i;
            (Expr::Input.get(Expr::var(loop_name(parent))), iterates[parent])
        } else if p % 4 == 2 {
            let acc = (p as usize / 4) % 5;
            (Expr::tmp(tmp_name(acc)), Some(acc))
        } else {
            (Expr::Input.field(&format!("src{i}")), None)
        };
        b.generator(loop_name(i), source);
        iterates.push(reach);
    }
    for &(acc, loop_mask, read_mask) in &shape.writes {
        let path = (0..loops)
            .filter(|&l| (loop_mask >> l) & 1 == 1)
            .filter(|&l| iterates[l].is_none_or(|j| j < acc as usize))
            .map(|l| Expr::var(loop_name(l)))
            .collect();
        let mut value = Expr::constant(1);
        for j in 0..acc as usize {
            if (read_mask >> j) & 1 == 1 {
                value = value.binary(BinaryOp::Add, Expr::tmp(tmp_name(j)));
            }
        }
        b.assign(tmp_name(acc as usize), path, AssignOp::Add, value);
    }
    b.finish(Expr::Input)
}

// ============================================================================
// Property: Every Statement Exactly Once, Verified
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: acyclic programs schedule and pass verification
    #[test]
    fn acyclic_programs_schedule(shape in shape()) {
        let program = build(&shape);
        let result = compile_schedule(&program, &ScheduleOptions::default());
        prop_assert!(result.is_ok(), "scheduling failed: {:?}", result.as_ref().err());
        let (graph, schedule) = result.unwrap();
        prop_assert_eq!(schedule.verify(&program, &graph), Ok(()));
    }

    /// Property: each statement id appears exactly once
    #[test]
    fn statements_emitted_once(shape in shape()) {
        let program = build(&shape);
        let (_, schedule) = compile_schedule(&program, &ScheduleOptions::default()).unwrap();
        let order: Vec<StmtId> = schedule.statements().collect();
        let unique: BTreeSet<StmtId> = order.iter().copied().collect();
        prop_assert_eq!(order.len(), program.statements.len());
        prop_assert_eq!(unique.len(), order.len());
    }

    /// Property: writes to one accumulator keep rank order
    #[test]
    fn rank_order_is_preserved(shape in shape()) {
        let program = build(&shape);
        let (_, schedule) = compile_schedule(&program, &ScheduleOptions::default()).unwrap();
        let mut last = std::collections::BTreeMap::new();
        for id in schedule.statements() {
            let stmt = &program.statements[id];
            if let Some(prev) = last.insert(stmt.write.clone(), stmt.write_rank) {
                prop_assert!(prev < stmt.write_rank);
            }
        }
    }

    /// Property: scheduling twice gives the same stream
    #[test]
    fn scheduling_is_deterministic(shape in shape()) {
        let program = build(&shape);
        let options = ScheduleOptions::default();
        let (_, first) = compile_schedule(&program, &options).unwrap();
        let (_, second) = compile_schedule(&program, &options).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Property: loop-order hints only change the order, never correctness
    #[test]
    fn hints_are_optional(shape in shape()) {
        let program = build(&shape);
        let options = ScheduleOptions { loop_order_hints: false };
        let (graph, schedule) = compile_schedule(&program, &options).unwrap();
        prop_assert_eq!(schedule.verify(&program, &graph), Ok(()));
    }
}
