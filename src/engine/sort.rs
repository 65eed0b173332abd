//! Cycle Detector & Topological Sorter
//!
//! Produces the final load order from a `ConstraintGraph`.
//!
//! # Design
//!
//! - **Pins first**: edges between pinned and non-pinned mods are detached
//!   before anything else; the three groups (top, middle, bottom) are sorted
//!   independently and concatenated
//! - **Iterative DFS**: cycle detection keeps an explicit stack and a
//!   per-node `VisitState`, so pathological inputs cannot overflow the stack
//! - **Edge-disjoint cycles**: an edge is consumed by at most one reported
//!   cycle; detection repeats on the remainder until the graph is acyclic
//! - **Kahn with a min-heap**: ready nodes leave in catalog order, never in
//!   lexicographic order
//!
//! # Cycle Policy
//!
//! | Policy       | Cycle members in the order                    |
//! |--------------|-----------------------------------------------|
//! | `Exclude`    | omitted (listed only in `cycles`)             |
//! | `BreakEdges` | kept, ordered by the edges that remain        |

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};
use tracing::debug;

use crate::catalog::PackageId;
use crate::diagnostics::Diagnostic;
use crate::engine::graph::ConstraintGraph;
use crate::types::{CyclePolicy, PinOrder, PinSide};

// ============================================================================
// Types
// ============================================================================

/// Traversal state of one node during cycle detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Unvisited,
    InProgress,
    Done,
}

/// Result of sorting one constraint graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOutcome {
    pub order: Vec<PackageId>,
    /// Each cycle starts at the node that closed it; the first element is
    /// not repeated at the end
    pub cycles: Vec<Vec<PackageId>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Adjacency lists indexed by node, as the sorter mutates them
type Adjacency = Vec<BTreeSet<usize>>;

// ============================================================================
// Sorter
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct TopologicalSorter {
    pin_order: PinOrder,
    cycle_policy: CyclePolicy,
}

impl TopologicalSorter {
    pub fn new(pin_order: PinOrder, cycle_policy: CyclePolicy) -> Self {
        Self {
            pin_order,
            cycle_policy,
        }
    }

    /// Sort the graph into a load order
    pub fn sort(&self, graph: &ConstraintGraph) -> SortOutcome {
        let count = graph.node_count();
        let mut adjacency: Adjacency = (0..count).map(|u| graph.successors(u).clone()).collect();
        let mut diagnostics = Vec::new();

        self.detach_pinned(graph, &mut adjacency, &mut diagnostics);

        let cycles = break_cycles(&mut adjacency);
        let excluded: HashSet<usize> = match self.cycle_policy {
            CyclePolicy::Exclude => cycles.iter().flatten().copied().collect(),
            CyclePolicy::BreakEdges => HashSet::new(),
        };
        if !cycles.is_empty() {
            debug!(
                "{} cycle(s) found, {} mod(s) excluded from the order",
                cycles.len(),
                excluded.len()
            );
        }

        let mut order = Vec::with_capacity(count);
        for group in [Some(PinSide::Top), None, Some(PinSide::Bottom)] {
            let members: Vec<usize> = (0..count)
                .filter(|&u| graph.pin(u) == group && !excluded.contains(&u))
                .collect();
            order.extend(kahn(&members, &adjacency));
        }

        SortOutcome {
            order: order.into_iter().map(|u| graph.id(u).clone()).collect(),
            cycles: cycles
                .into_iter()
                .map(|cycle| cycle.into_iter().map(|u| graph.id(u).clone()).collect())
                .collect(),
            diagnostics,
        }
    }

    /// Remove every edge that pin placement overrides.
    ///
    /// Edges inside one pinned group survive only under `RespectRules`.
    fn detach_pinned(
        &self,
        graph: &ConstraintGraph,
        adjacency: &mut Adjacency,
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        for (u, successors) in adjacency.iter_mut().enumerate() {
            let from = graph.pin(u);
            successors.retain(|&v| {
                let to = graph.pin(v);
                if from.is_none() && to.is_none() {
                    return true;
                }
                let same_group = group_rank(from) == group_rank(to);
                if same_group && self.pin_order == PinOrder::RespectRules {
                    return true;
                }

                let violated = group_rank(from) > group_rank(to) || (same_group && u > v);
                if violated {
                    diagnostics.push(Diagnostic::PinnedEdgeDropped {
                        before: graph.id(u).clone(),
                        after: graph.id(v).clone(),
                    });
                }
                false
            });
        }
    }
}

/// Position of a pin group in the final order
fn group_rank(pin: Option<PinSide>) -> u8 {
    match pin {
        Some(PinSide::Top) => 0,
        None => 1,
        Some(PinSide::Bottom) => 2,
    }
}

// ============================================================================
// Cycle Detection
// ============================================================================

/// Find edge-disjoint cycles in one depth-first pass over nodes in index
/// order. Cycles are returned as node paths starting at the repeated node.
pub fn find_cycles(adjacency: &[BTreeSet<usize>]) -> Vec<Vec<usize>> {
    let successors: Vec<Vec<usize>> = adjacency
        .iter()
        .map(|s| s.iter().copied().collect())
        .collect();
    let mut state = vec![VisitState::Unvisited; successors.len()];
    let mut consumed: HashSet<(usize, usize)> = HashSet::new();
    let mut cycles = Vec::new();

    for root in 0..successors.len() {
        if state[root] != VisitState::Unvisited {
            continue;
        }
        state[root] = VisitState::InProgress;
        // (node, index of the next successor to visit)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let Some(&next) = successors[node].get(frame.1) else {
                state[node] = VisitState::Done;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            match state[next] {
                VisitState::Unvisited => {
                    state[next] = VisitState::InProgress;
                    stack.push((next, 0));
                }
                VisitState::InProgress => {
                    let Some(start) = stack.iter().position(|&(n, _)| n == next) else {
                        continue;
                    };
                    let cycle: Vec<usize> = stack[start..].iter().map(|&(n, _)| n).collect();
                    let edges = cycle_edges(&cycle);
                    if edges.iter().any(|edge| consumed.contains(edge)) {
                        continue;
                    }
                    consumed.extend(edges);
                    cycles.push(cycle);
                }
                VisitState::Done => {}
            }
        }
    }

    cycles
}

/// Edges of a cycle path, including the closing edge back to the start
fn cycle_edges(cycle: &[usize]) -> Vec<(usize, usize)> {
    cycle
        .iter()
        .zip(cycle.iter().cycle().skip(1))
        .map(|(&u, &v)| (u, v))
        .collect()
}

/// Report and remove cycles until the adjacency is acyclic
pub fn break_cycles(adjacency: &mut [BTreeSet<usize>]) -> Vec<Vec<usize>> {
    let mut all = Vec::new();
    loop {
        let found = find_cycles(adjacency);
        if found.is_empty() {
            return all;
        }
        for cycle in &found {
            for (u, v) in cycle_edges(cycle) {
                adjacency[u].remove(&v);
            }
        }
        all.extend(found);
    }
}

// ============================================================================
// Kahn's Algorithm
// ============================================================================

/// Topologically sort `members` using only edges between members.
/// Ready nodes are taken lowest index first.
fn kahn(members: &[usize], adjacency: &[BTreeSet<usize>]) -> Vec<usize> {
    let mut indegree: HashMap<usize, usize> = members.iter().map(|&u| (u, 0)).collect();
    for &u in members {
        for v in &adjacency[u] {
            if let Some(degree) = indegree.get_mut(v) {
                *degree += 1;
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .filter(|&(_, &degree)| degree == 0)
        .map(|(&u, _)| Reverse(u))
        .collect();
    let mut order = Vec::with_capacity(members.len());

    while let Some(Reverse(u)) = ready.pop() {
        order.push(u);
        for v in &adjacency[u] {
            if let Some(degree) = indegree.get_mut(v) {
                *degree -= 1;
                if *degree == 0 {
                    ready.push(Reverse(*v));
                }
            }
        }
    }

    debug_assert_eq!(
        order.len(),
        members.len(),
        "kahn called on a subgraph that still has cycles"
    );
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, Mod};
    use crate::logic::aggregate::RuleAggregator;
    use crate::logic::version::VersionTagResolver;
    use crate::rules::RuleSources;
    use crate::types::RuleKind;

    fn graph_for(mods: Vec<Mod>) -> ConstraintGraph {
        let catalog = Catalog::new(mods).unwrap();
        let sources = RuleSources::from_catalog(&catalog);
        let mut diags = Vec::new();
        let sets = RuleAggregator::new(&sources, VersionTagResolver::new("1.5"))
            .aggregate(&catalog, &mut diags);
        ConstraintGraph::build(&catalog, &sets, None, &mut diags)
    }

    fn ids(order: &[PackageId]) -> Vec<&str> {
        order.iter().map(PackageId::as_str).collect()
    }

    fn adjacency(count: usize, edges: &[(usize, usize)]) -> Adjacency {
        let mut adj = vec![BTreeSet::new(); count];
        for &(u, v) in edges {
            adj[u].insert(v);
        }
        adj
    }

    #[test]
    fn test_chain_sorted() {
        let graph = graph_for(vec![
            Mod::new("a"),
            Mod::new("b").with_rule(RuleKind::LoadAfter, "a"),
            Mod::new("c").with_rule(RuleKind::LoadAfter, "b"),
        ]);
        let outcome = TopologicalSorter::default().sort(&graph);
        assert_eq!(ids(&outcome.order), vec!["a", "b", "c"]);
        assert!(outcome.cycles.is_empty());
    }

    #[test]
    fn test_ties_follow_catalog_order() {
        let graph = graph_for(vec![
            Mod::new("zeta"),
            Mod::new("alpha"),
            Mod::new("mid").with_rule(RuleKind::LoadBefore, "zeta"),
        ]);
        let outcome = TopologicalSorter::default().sort(&graph);
        assert_eq!(ids(&outcome.order), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_find_two_disjoint_cycles() {
        // 0→1→2→0, 3→4→3
        let adj = adjacency(5, &[(0, 1), (1, 2), (2, 0), (3, 4), (4, 3)]);
        let cycles = find_cycles(&adj);
        assert_eq!(cycles, vec![vec![0, 1, 2], vec![3, 4]]);
    }

    #[test]
    fn test_cycles_share_no_edges() {
        // 0→1→0 and 0→1→2→0 share edge 0→1
        let adj = adjacency(3, &[(0, 1), (1, 0), (1, 2), (2, 0)]);
        let cycles = find_cycles(&adj);
        assert_eq!(cycles, vec![vec![0, 1]]);
    }

    #[test]
    fn test_break_cycles_repeats_until_acyclic() {
        // 0→2→0 is only exposed once 0→1→0 is removed
        let mut adj = adjacency(3, &[(0, 1), (0, 2), (1, 0), (1, 2), (2, 0)]);
        let cycles = break_cycles(&mut adj);

        assert_eq!(cycles, vec![vec![0, 1], vec![0, 2]]);
        assert!(find_cycles(&adj).is_empty());
        assert!(adj[1].contains(&2));
    }

    #[test]
    fn test_kahn_places_every_member_after_cycle_removal() {
        // 3 is outside the group; its edge into 0 must not hold 0 back
        let adj = adjacency(4, &[(3, 0), (1, 0), (0, 2)]);
        assert_eq!(kahn(&[0, 1, 2], &adj), vec![1, 0, 2]);

        let mut adj = adjacency(4, &[(0, 1), (1, 2), (2, 0), (2, 3)]);
        break_cycles(&mut adj);
        assert_eq!(kahn(&[0, 1, 2, 3], &adj).len(), 4);
    }

    #[test]
    fn test_cycle_members_excluded_by_default() {
        let graph = graph_for(vec![
            Mod::new("a").with_rule(RuleKind::LoadBefore, "b"),
            Mod::new("b").with_rule(RuleKind::LoadBefore, "a"),
            Mod::new("c").with_rule(RuleKind::LoadAfter, "b"),
            Mod::new("d"),
        ]);
        let outcome = TopologicalSorter::default().sort(&graph);

        assert_eq!(outcome.cycles.len(), 1);
        assert_eq!(ids(&outcome.cycles[0]), vec!["a", "b"]);
        assert_eq!(ids(&outcome.order), vec!["c", "d"]);
    }

    #[test]
    fn test_break_edges_keeps_members() {
        let graph = graph_for(vec![
            Mod::new("a").with_rule(RuleKind::LoadBefore, "b"),
            Mod::new("b").with_rule(RuleKind::LoadBefore, "a"),
            Mod::new("c").with_rule(RuleKind::LoadAfter, "b"),
        ]);
        let outcome =
            TopologicalSorter::new(PinOrder::CatalogOrder, CyclePolicy::BreakEdges).sort(&graph);

        assert_eq!(outcome.cycles.len(), 1);
        assert_eq!(ids(&outcome.order), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_pinned_bottom_goes_last() {
        let graph = graph_for(vec![
            Mod::new("a").pinned(RuleKind::ForceLoadBottom),
            Mod::new("b"),
            Mod::new("c"),
        ]);
        let outcome = TopologicalSorter::default().sort(&graph);
        assert_eq!(ids(&outcome.order), vec!["b", "c", "a"]);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_violated_pinned_edge_reported() {
        let graph = graph_for(vec![
            Mod::new("a").pinned(RuleKind::ForceLoadBottom),
            // satisfied by placement: dropped silently
            Mod::new("b").with_rule(RuleKind::LoadBefore, "a"),
            // violated: c wants to precede a top-pinned mod
            Mod::new("c").with_rule(RuleKind::LoadBefore, "top"),
            Mod::new("top").pinned(RuleKind::ForceLoadTop),
        ]);
        let outcome = TopologicalSorter::default().sort(&graph);

        assert_eq!(ids(&outcome.order), vec!["top", "b", "c", "a"]);
        assert_eq!(
            outcome.diagnostics,
            vec![Diagnostic::PinnedEdgeDropped {
                before: PackageId::new("c"),
                after: PackageId::new("top"),
            }]
        );
    }

    #[test]
    fn test_pin_order_policies() {
        let mods = vec![
            Mod::new("x").pinned(RuleKind::ForceLoadTop),
            Mod::new("y")
                .pinned(RuleKind::ForceLoadTop)
                .with_rule(RuleKind::LoadBefore, "x"),
            Mod::new("z"),
        ];
        let graph = graph_for(mods);

        let catalog_order = TopologicalSorter::default().sort(&graph);
        assert_eq!(ids(&catalog_order.order), vec!["x", "y", "z"]);
        assert_eq!(catalog_order.diagnostics.len(), 1);

        let respect = TopologicalSorter::new(PinOrder::RespectRules, CyclePolicy::Exclude).sort(&graph);
        assert_eq!(ids(&respect.order), vec!["y", "x", "z"]);
        assert!(respect.diagnostics.is_empty());
    }

    #[test]
    fn test_sort_is_deterministic() {
        let graph = graph_for(vec![
            Mod::new("d").with_rule(RuleKind::LoadAfter, "a"),
            Mod::new("c"),
            Mod::new("b").with_rule(RuleKind::LoadBefore, "c"),
            Mod::new("a"),
        ]);
        let sorter = TopologicalSorter::default();
        let first = sorter.sort(&graph);
        assert_eq!(first, sorter.sort(&graph));
        assert_eq!(ids(&first.order), vec!["b", "c", "a", "d"]);
    }
}
