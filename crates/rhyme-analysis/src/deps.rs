//! Dependency graph construction and derived scheduling relations.
//!
//! Builds a directed graph whose nodes are statements and generator groups
//! and whose edges point from a node to the nodes it depends on. Cycles are
//! rejected with Tarjan's algorithm, then the relations the loop-fusion
//! scheduler consumes are computed once:
//!
//! - `stmt_deps[s]`: statements `s` transitively depends on;
//! - `loop_deps[s]`: loops `s` must be nested in;
//! - `stmt_by_loop[s][d]`: loops of `d` that must be closed before `s` may
//!   read `d` (decorrelation);
//! - `loop_after_loop[s][d]`: loop-ordering hints that avoid reopening loops.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use rhyme_ir::{IrError, Program, StmtId, Symbol};

use crate::scc::tarjan_scc;

/// Errors during dependency analysis.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The IR violates a structural invariant.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// One or more dependency cycles; each inner list is one strongly
    /// connected component, named by its nodes.
    #[error("cyclic dependency: {}", format_cycles(.cycles))]
    CyclicDependency { cycles: Vec<Vec<String>> },
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| format!("[{}]", c.join(", ")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Identifier of a generator group (loop) in a [`DependencyGraph`].
///
/// Loops are numbered in order of first appearance in the program.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct LoopId(pub u32);

impl LoopId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A unique identifier for a node in the dependency graph.
///
/// Statement nodes come first (node `i` is statement `i`), followed by one
/// node per generator group.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a dependency graph node stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    Statement(StmtId),
    Loop(LoopId),
}

/// Relations derived from the graph, read-only during scheduling.
///
/// Per-statement tables are indexed by statement index; per-loop tables by
/// [`LoopId`]. Ordered containers keep every iteration deterministic.
#[derive(Clone, Debug, Default)]
pub struct Relations {
    /// Transitive statement ancestors of each statement.
    pub stmt_deps: Vec<BTreeSet<StmtId>>,
    /// Loops each statement must be nested in.
    pub loop_deps: Vec<BTreeSet<LoopId>>,
    /// Loops each generator group must be nested in (excluding itself).
    pub group_loop_deps: Vec<BTreeSet<LoopId>>,
    /// `stmt_by_loop[s][d]`: loops of `d` that `s` does not share. Only
    /// non-empty entries are stored.
    pub stmt_by_loop: Vec<BTreeMap<StmtId, BTreeSet<LoopId>>>,
    /// `loop_after_loop[s][d][l1]`: loops that should close before `l1`
    /// opens. Only non-empty entries are stored.
    pub loop_after_loop: Vec<BTreeMap<StmtId, BTreeMap<LoopId, BTreeSet<LoopId>>>>,
}

/// The statement/generator dependency graph of one program.
#[derive(Clone, Debug)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    /// `deps[n]`: nodes that `n` depends on, sorted and deduplicated.
    deps: Vec<Vec<NodeId>>,
    loop_symbols: Vec<Symbol>,
    loop_ids: IndexMap<Symbol, LoopId>,
    relations: Relations,
}

impl DependencyGraph {
    /// Build the dependency graph and its relations.
    ///
    /// 1. Statements are grouped by write symbol; a dependency on a symbol
    ///    resolves to its *last* write.
    /// 2. Generators are grouped by symbol (one node per group).
    /// 3. Edges follow the declared `deps`, plus rank-chain edges between
    ///    consecutive writes of one symbol.
    /// 4. Any strongly connected component with more than one node, or a
    ///    node depending on itself, is a [`AnalysisError::CyclicDependency`].
    /// 5. Transitive relations are computed by depth-first search.
    pub fn build(program: &Program) -> Result<Self, AnalysisError> {
        program.validate()?;

        let stmt_count = program.statements.len();

        let mut last_write: IndexMap<&Symbol, StmtId> = IndexMap::new();
        let mut writes: IndexMap<&Symbol, Vec<StmtId>> = IndexMap::new();
        for (id, stmt) in program.statements.iter() {
            last_write.insert(&stmt.write, id);
            writes.entry(&stmt.write).or_default().push(id);
        }

        let groups = program.generators_by_symbol();
        let loop_symbols: Vec<Symbol> = groups.keys().map(|s| (*s).clone()).collect();
        let loop_ids: IndexMap<Symbol, LoopId> = loop_symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), LoopId(i as u32)))
            .collect();

        let mut nodes: Vec<Node> = program.statements.handles().map(Node::Statement).collect();
        nodes.extend((0..loop_symbols.len() as u32).map(|i| Node::Loop(LoopId(i))));

        let loop_node = |l: LoopId| NodeId((stmt_count + l.index()) as u32);
        let resolve = |sym: &Symbol| -> Option<NodeId> {
            if let Some(&l) = loop_ids.get(sym) {
                Some(loop_node(l))
            } else {
                last_write.get(sym).map(|s| NodeId(s.index() as u32))
            }
        };

        let mut deps: Vec<BTreeSet<NodeId>> = vec![BTreeSet::new(); nodes.len()];

        for (id, stmt) in program.statements.iter() {
            for sym in &stmt.deps {
                if sym == &stmt.write {
                    continue;
                }
                if let Some(n) = resolve(sym) {
                    deps[id.index()].insert(n);
                }
            }
        }

        for chain in writes.values() {
            for pair in chain.windows(2) {
                deps[pair[1].index()].insert(NodeId(pair[0].index() as u32));
            }
        }

        for (i, gens) in groups.values().enumerate() {
            let n = loop_node(LoopId(i as u32));
            for g in gens {
                for sym in &g.deps {
                    if let Some(d) = resolve(sym) {
                        deps[n.index()].insert(d);
                    }
                }
            }
        }

        let mut graph = Self {
            nodes,
            deps: deps.into_iter().map(|d| d.into_iter().collect()).collect(),
            loop_symbols,
            loop_ids,
            relations: Relations::default(),
        };

        graph.check_acyclic(program)?;
        graph.relations = graph.compute_relations(program);

        log::debug!(
            "dependency graph: {} statements, {} loops, {} edges",
            stmt_count,
            graph.loop_count(),
            graph.edge_count(),
        );
        for (i, sym) in graph.loop_symbols.iter().enumerate() {
            let used = graph
                .relations
                .loop_deps
                .iter()
                .any(|ls| ls.contains(&LoopId(i as u32)));
            if !used {
                log::warn!("generator group '{sym}' is not needed by any statement");
            }
        }

        Ok(graph)
    }

    fn check_acyclic(&self, program: &Program) -> Result<(), AnalysisError> {
        let components = tarjan_scc(self.nodes.len(), |n| {
            self.deps[n].iter().map(|d| d.index()).collect::<Vec<_>>()
        });

        let cycles: Vec<Vec<String>> = components
            .into_iter()
            .filter(|c| c.len() > 1 || self.deps[c[0]].contains(&NodeId(c[0] as u32)))
            .map(|c| {
                c.into_iter()
                    .map(|n| self.node_name(program, NodeId(n as u32)))
                    .collect()
            })
            .collect();

        if cycles.is_empty() {
            Ok(())
        } else {
            Err(AnalysisError::CyclicDependency { cycles })
        }
    }

    /// Nodes reachable from `root`, following an edge only when `follow`
    /// accepts the node it enters. `root` itself is not included.
    fn reachable(&self, root: NodeId, follow: impl Fn(Node) -> bool) -> Vec<NodeId> {
        let mut seen = vec![false; self.nodes.len()];
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(curr) = stack.pop() {
            for &pre in &self.deps[curr.index()] {
                if pre == root || seen[pre.index()] || !follow(self.nodes[pre.index()]) {
                    continue;
                }
                seen[pre.index()] = true;
                out.push(pre);
                stack.push(pre);
            }
        }
        out
    }

    fn compute_relations(&self, program: &Program) -> Relations {
        let mut rel = Relations::default();

        for id in program.statements.handles() {
            let root = NodeId(id.index() as u32);

            let stmts = self
                .reachable(root, |_| true)
                .into_iter()
                .filter_map(|n| match self.nodes[n.index()] {
                    Node::Statement(s) => Some(s),
                    Node::Loop(_) => None,
                })
                .collect();
            rel.stmt_deps.push(stmts);

            rel.loop_deps.push(self.loops_reachable(root));
        }

        for l in 0..self.loop_count() {
            let root = NodeId((program.statements.len() + l) as u32);
            rel.group_loop_deps.push(self.loops_reachable(root));
        }

        for (s, stmt) in program.statements.iter() {
            let own = &rel.loop_deps[s.index()];
            let mut by_loop = BTreeMap::new();
            let mut after = BTreeMap::new();
            for &d in &rel.stmt_deps[s.index()] {
                if program.statements[d].write == stmt.write {
                    continue;
                }
                let theirs = &rel.loop_deps[d.index()];
                let only_theirs: BTreeSet<LoopId> = theirs.difference(own).copied().collect();
                if only_theirs.is_empty() {
                    continue;
                }
                let hints: BTreeMap<LoopId, BTreeSet<LoopId>> = own
                    .difference(theirs)
                    .map(|&l1| (l1, only_theirs.clone()))
                    .collect();
                if !hints.is_empty() {
                    after.insert(d, hints);
                }
                by_loop.insert(d, only_theirs);
            }
            rel.stmt_by_loop.push(by_loop);
            rel.loop_after_loop.push(after);
        }

        rel
    }

    fn loops_reachable(&self, root: NodeId) -> BTreeSet<LoopId> {
        self.reachable(root, |n| matches!(n, Node::Loop(_)))
            .into_iter()
            .filter_map(|n| match self.nodes[n.index()] {
                Node::Loop(l) => Some(l),
                Node::Statement(_) => None,
            })
            .collect()
    }

    /// The derived scheduling relations.
    pub fn relations(&self) -> &Relations {
        &self.relations
    }

    /// Number of nodes (statements plus generator groups).
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of dependency edges.
    pub fn edge_count(&self) -> usize {
        self.deps.iter().map(Vec::len).sum()
    }

    /// Number of generator groups.
    pub fn loop_count(&self) -> usize {
        self.loop_symbols.len()
    }

    pub fn node(&self, id: NodeId) -> Node {
        self.nodes[id.index()]
    }

    /// Direct dependencies of a node.
    pub fn deps_of(&self, id: NodeId) -> &[NodeId] {
        &self.deps[id.index()]
    }

    /// The symbol of a loop.
    pub fn loop_symbol(&self, id: LoopId) -> &Symbol {
        &self.loop_symbols[id.index()]
    }

    /// Looks up the loop for a generator symbol.
    pub fn loop_id(&self, symbol: &Symbol) -> Option<LoopId> {
        self.loop_ids.get(symbol).copied()
    }

    /// Loop symbols in [`LoopId`] order.
    pub fn loop_symbols(&self) -> &[Symbol] {
        &self.loop_symbols
    }

    /// Human-readable name of a node: `tmp0#2` or `*A`.
    pub fn node_name(&self, program: &Program, id: NodeId) -> String {
        match self.nodes[id.index()] {
            Node::Statement(s) => {
                let stmt = &program.statements[s];
                format!("{}#{}", stmt.write, stmt.write_rank)
            }
            Node::Loop(l) => self.loop_symbol(l).to_string(),
        }
    }
}

/// A set of loops printed by symbol, e.g. `{*A, *B}`.
pub struct LoopSet<'a> {
    graph: &'a DependencyGraph,
    loops: &'a BTreeSet<LoopId>,
}

impl DependencyGraph {
    /// Displays `loops` by symbol.
    pub fn display_loops<'a>(&'a self, loops: &'a BTreeSet<LoopId>) -> LoopSet<'a> {
        LoopSet { graph: self, loops }
    }
}

impl fmt::Display for LoopSet<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, l) in self.loops.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", self.graph.loop_symbol(*l))?;
        }
        f.write_str("}")
    }
}

/// Format the dependency relations for human-readable output (used by
/// `--emit-deps`).
pub fn format_relations(program: &Program, graph: &DependencyGraph) -> String {
    let rel = graph.relations();
    let mut out = String::new();
    let name = |s: StmtId| graph.node_name(program, NodeId(s.index() as u32));

    out.push_str(&format!(
        "=== Dependencies ({} nodes, {} edges) ===\n",
        graph.node_count(),
        graph.edge_count(),
    ));

    for (s, _) in program.statements.iter() {
        let i = s.index();
        out.push_str(&format!("{s} {}\n", name(s)));

        let deps: Vec<String> = rel.stmt_deps[i].iter().map(|&d| name(d)).collect();
        out.push_str(&format!("  stmt deps: [{}]\n", deps.join(", ")));
        out.push_str(&format!(
            "  loop deps: {}\n",
            graph.display_loops(&rel.loop_deps[i])
        ));

        for (d, ls) in &rel.stmt_by_loop[i] {
            out.push_str(&format!(
                "  needs {} closed after {}\n",
                graph.display_loops(ls),
                name(*d)
            ));
        }
        for (d, hints) in &rel.loop_after_loop[i] {
            for (l1, l2s) in hints {
                out.push_str(&format!(
                    "  hint ({}): open {} after {}\n",
                    name(*d),
                    graph.loop_symbol(*l1),
                    graph.display_loops(l2s),
                ));
            }
        }
    }

    for (i, sym) in graph.loop_symbols().iter().enumerate() {
        out.push_str(&format!(
            "loop {sym} nested in {}\n",
            graph.display_loops(&rel.group_loop_deps[i])
        ));
    }

    out
}
