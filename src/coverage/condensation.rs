//! Strongly connected components of the coverage graph
//!
//! Two-pass Kosaraju over registered explicit edges, starting from the
//! entries of registered methods:
//!
//! 1. DFS along successors, recording finishing order.
//! 2. DFS along predecessors in reverse finishing order; every tree of
//!    this pass is one component.
//!
//! On the resulting DAG a component is *fully covered* when it is covered
//! and every successor component is fully covered: nothing reachable from
//! it can still gain coverage.
//!
//! Method bodies can be arbitrarily large and call chains arbitrarily
//! deep, so every traversal here runs on an explicit stack.
//!
//! The structure is never patched. It is rebuilt from scratch once new
//! trace data makes it stale.

use std::cell::Cell;
use std::collections::{HashMap, HashSet};

use super::CoverageGraph;
use crate::ir::InstId;

/// Pending node of an iterative DFS
struct Frame<N> {
    node: N,
    children: Vec<N>,
    next: usize,
}

impl<N> Frame<N> {
    fn new(node: N, children: Vec<N>) -> Self {
        Self { node, children, next: 0 }
    }
}

/// DFS forest over `roots`, in order
///
/// `on_root` fires before each new tree, `on_exit` when a node finishes.
fn dfs_forest<C, R, E>(roots: &[InstId], mut children: C, mut on_root: R, mut on_exit: E)
where
    C: FnMut(InstId) -> Vec<InstId>,
    R: FnMut(InstId),
    E: FnMut(InstId),
{
    let mut visited: HashSet<InstId> = HashSet::new();
    let mut stack: Vec<Frame<InstId>> = Vec::new();

    for &root in roots {
        if !visited.insert(root) {
            continue;
        }
        on_root(root);
        stack.push(Frame::new(root, children(root)));

        while let Some(top) = stack.last_mut() {
            if top.next < top.children.len() {
                let next = top.children[top.next];
                top.next += 1;
                if visited.insert(next) {
                    let grandchildren = children(next);
                    stack.push(Frame::new(next, grandchildren));
                }
            } else {
                on_exit(top.node);
                stack.pop();
            }
        }
    }
}

/// Condensation of the registered part of the coverage graph
#[derive(Debug, Clone, Default)]
pub struct Condensation {
    components: Vec<Vec<InstId>>,
    component_of: HashMap<InstId, usize>,
    successors: Vec<Vec<usize>>,
    covered: Vec<bool>,
    fully_covered: Vec<bool>,
}

impl Condensation {
    /// Build components and coverage flags from the current graph state
    pub fn build(graph: &CoverageGraph) -> Self {
        let order = finishing_order(graph);

        let mut condensation = Self::default();
        condensation.collect_components(graph, &order);
        condensation.fully_covered = propagate_fully_covered(&condensation.covered, &condensation.successors);
        condensation
    }

    fn collect_components(&mut self, graph: &CoverageGraph, order: &[InstId]) {
        // Only nodes reached by the first pass belong to the condensation
        let reached: HashSet<InstId> = order.iter().copied().collect();
        let roots: Vec<InstId> = order.iter().rev().copied().collect();

        let trees = Cell::new(0usize);
        let mut assignment: Vec<(InstId, usize)> = Vec::new();
        dfs_forest(
            &roots,
            |inst| {
                graph
                    .predecessors(inst)
                    .into_iter()
                    .filter(|p| reached.contains(p))
                    .collect()
            },
            |_| trees.set(trees.get() + 1),
            |inst| assignment.push((inst, trees.get() - 1)),
        );

        self.components = vec![Vec::new(); trees.get()];
        for (inst, index) in assignment {
            self.components[index].push(inst);
            self.component_of.insert(inst, index);
        }

        for (index, members) in self.components.iter().enumerate() {
            let mut covered = true;
            let mut succ: Vec<usize> = Vec::new();
            for &inst in members {
                covered = covered && graph.is_covered(inst);
                for next in graph.successors(inst) {
                    if let Some(&component) = self.component_of.get(&next) {
                        if component != index && !succ.contains(&component) {
                            succ.push(component);
                        }
                    }
                }
            }
            self.covered.push(covered);
            self.successors.push(succ);
        }
    }

    /// Whether nothing reachable from `inst` can gain coverage
    ///
    /// Instructions outside the condensation have nothing to gain.
    pub fn is_fully_covered(&self, inst: InstId) -> bool {
        match self.component_of.get(&inst) {
            Some(&component) => self.fully_covered[component],
            None => true,
        }
    }

    pub fn component_of(&self, inst: InstId) -> Option<usize> {
        self.component_of.get(&inst).copied()
    }

    pub fn component(&self, index: usize) -> Option<&[InstId]> {
        self.components.get(index).map(Vec::as_slice)
    }

    pub fn component_successors(&self, index: usize) -> Option<&[usize]> {
        self.successors.get(index).map(Vec::as_slice)
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Pass 1: finishing order of a DFS from the registered entries
fn finishing_order(graph: &CoverageGraph) -> Vec<InstId> {
    let mut order = Vec::new();
    dfs_forest(&graph.entries(), |inst| graph.successors(inst), |_| {}, |inst| order.push(inst));
    order
}

/// Fully-covered flags over the condensation DAG
///
/// Memoized DFS on an explicit stack. An uncovered component is settled
/// immediately; its successors are reached by the outer loop if needed.
fn propagate_fully_covered(covered: &[bool], successors: &[Vec<usize>]) -> Vec<bool> {
    let mut fully: Vec<Option<bool>> = vec![None; covered.len()];

    struct Pending {
        component: usize,
        next: usize,
        all_fully: bool,
    }

    for start in 0..covered.len() {
        if fully[start].is_some() {
            continue;
        }
        let mut stack = vec![Pending { component: start, next: 0, all_fully: true }];

        while let Some(top) = stack.last_mut() {
            let component = top.component;
            if !covered[component] {
                fully[component] = Some(false);
                stack.pop();
                continue;
            }
            match successors[component].get(top.next).copied() {
                Some(child) => match fully[child] {
                    Some(done) => {
                        top.all_fully &= done;
                        top.next += 1;
                    }
                    // Condensation is acyclic, so the child is not on the stack
                    None => stack.push(Pending { component: child, next: 0, all_fully: true }),
                },
                None => {
                    fully[component] = Some(top.all_fully);
                    stack.pop();
                }
            }
        }
    }

    fully.into_iter().map(|f| f.unwrap_or(false)).collect()
}
