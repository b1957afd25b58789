//! Dijkstra's shortest path over one floor of the plan
//!
//! Edge costs come from an [`EdgePolicy`] so the same search serves plain
//! shortest-distance requests, crowd-avoiding requests and wheelchair
//! requests. The walked distance is tracked separately from the cost so a
//! crowd-weighted route still reports its real length.

use alloc::collections::BinaryHeap;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;

use super::graph::{Edge, FloorPlan, NodeIndex};
use crate::constants::routing::CROWDED_EDGE_MULTIPLIER;

/// How walkways are filtered and priced
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EdgePolicy {
    /// Skip walkways that are not step-free
    pub step_free_only: bool,
    /// Price walkways by `distance × (1 + crowd/100)`
    pub avoid_crowded: bool,
}

impl EdgePolicy {
    /// Cost of traversing `edge`, `None` if it may not be used
    pub fn cost(&self, edge: &Edge) -> Option<f64> {
        if self.step_free_only && !edge.accessible {
            return None;
        }
        if self.avoid_crowded {
            let crowd = f64::from(edge.crowd_level) / 100.0;
            Some(edge.distance * (1.0 + crowd * CROWDED_EDGE_MULTIPLIER))
        } else {
            Some(edge.distance)
        }
    }
}

/// State for Dijkstra's algorithm priority queue
#[derive(Clone, Copy, Debug)]
struct DijkstraState {
    cost: f64,
    node: NodeIndex,
}

impl PartialEq for DijkstraState {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DijkstraState {}

impl Ord for DijkstraState {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; equal costs pop the lower index first
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for DijkstraState {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Result of a Dijkstra search
#[derive(Clone, Debug, PartialEq)]
pub struct PathResult {
    /// Node indices from start to goal, inclusive
    pub path: Vec<NodeIndex>,
    /// Sum of policy costs
    pub cost: f64,
    /// Sum of walkway lengths, metres
    pub distance: f64,
}

/// Cheapest path from `start` to `goal`, `None` if unreachable
pub fn shortest_path(plan: &FloorPlan, start: NodeIndex, goal: NodeIndex, policy: EdgePolicy) -> Option<PathResult> {
    let n = plan.node_count();
    if start >= n || goal >= n {
        return None;
    }

    if start == goal {
        return Some(PathResult {
            path: vec![start],
            cost: 0.0,
            distance: 0.0,
        });
    }

    let mut cost: Vec<f64> = vec![f64::INFINITY; n];
    let mut walked: Vec<f64> = vec![0.0; n];
    let mut prev: Vec<Option<NodeIndex>> = vec![None; n];
    cost[start] = 0.0;

    let mut heap = BinaryHeap::new();
    heap.push(DijkstraState { cost: 0.0, node: start });

    while let Some(DijkstraState { cost: node_cost, node }) = heap.pop() {
        // Skip if we've found a better path
        if node_cost > cost[node] {
            continue;
        }

        if node == goal {
            break;
        }

        for edge in plan.edges_from(node) {
            let edge_cost = match policy.cost(edge) {
                Some(c) => c,
                None => continue,
            };
            let next_cost = node_cost + edge_cost;
            if next_cost < cost[edge.to] {
                cost[edge.to] = next_cost;
                walked[edge.to] = walked[node] + edge.distance;
                prev[edge.to] = Some(node);
                heap.push(DijkstraState {
                    cost: next_cost,
                    node: edge.to,
                });
            }
        }
    }

    if prev[goal].is_none() {
        return None;
    }

    let mut path = Vec::new();
    let mut current = goal;
    while current != start {
        path.push(current);
        current = prev[current]?;
    }
    path.push(start);
    path.reverse();

    Some(PathResult {
        path,
        cost: cost[goal],
        distance: walked[goal],
    })
}
