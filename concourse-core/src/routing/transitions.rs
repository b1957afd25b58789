//! Vertical transition status, scoring and chain enumeration
//!
//! ## Scoring
//!
//! ```text
//! score = 1.0
//!       − crowd/100 × (0.6 if avoiding crowds else 0.3)
//!       + 0.2 if the kind is preferred (elevator / escalator)
//!       + 0.1 if the transition has accessibility features
//!       − 0.5 for stairs when avoiding stairs
//! clamped to [0, 1]; a chain scores the mean of its transitions
//! ```
//!
//! ## Chains
//!
//! A chain is the ordered list of transitions a route rides, e.g.
//! `L0 ─escalator→ L1 ─elevator→ L3`. Chains are enumerated depth-first over
//! the floor graph, never revisiting a floor, in transition index order so
//! that enumeration (and with it tie-breaking) is deterministic.

use alloc::vec::Vec;

use super::graph::{FloorPlan, OperationalStatus, TransitionIndex, TransitionKind, VerticalTransition};
use super::RoutePreferences;
use crate::constants::routing::{
    ACCESSIBILITY_BONUS, AVOID_CROWD_PENALTY_WEIGHT, BASE_TRANSITION_SCORE, CROWD_PENALTY_WEIGHT,
    MAX_CHAIN_TRANSITIONS, MAX_ENUMERATED_CHAINS, PREFERRED_KIND_BONUS, STAIRS_AVOIDANCE_PENALTY,
};
use crate::geometry::FloorId;

/// Live view of transition status and crowding
///
/// Routing asks again at every stage, so an implementation backed by live
/// data may answer differently between calls.
pub trait TransitionStatusSource {
    fn status(&self, transition: &VerticalTransition) -> OperationalStatus;

    fn crowd_level(&self, transition: &VerticalTransition) -> Option<u8>;
}

/// Status exactly as recorded in the floor plan
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanStatus;

impl TransitionStatusSource for PlanStatus {
    fn status(&self, transition: &VerticalTransition) -> OperationalStatus {
        transition.status
    }

    fn crowd_level(&self, transition: &VerticalTransition) -> Option<u8> {
        transition.crowd_level
    }
}

/// One ride in a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hop {
    pub transition: TransitionIndex,
    pub from: FloorId,
    pub to: FloorId,
}

/// Transitions ridden in order
pub type Chain = heapless::Vec<Hop, MAX_CHAIN_TRANSITIONS>;

/// Score of one transition for a request
pub fn score_transition(
    transition: &VerticalTransition,
    crowd_level: Option<u8>,
    preferences: &RoutePreferences,
) -> f64 {
    let mut score = BASE_TRANSITION_SCORE;

    if let Some(crowd) = crowd_level {
        let weight = if preferences.avoid_crowded {
            AVOID_CROWD_PENALTY_WEIGHT
        } else {
            CROWD_PENALTY_WEIGHT
        };
        score -= f64::from(crowd.min(100)) / 100.0 * weight;
    }

    let preferred = match transition.kind {
        TransitionKind::Elevator => preferences.prefer_elevators,
        TransitionKind::Escalator => preferences.prefer_escalators,
        TransitionKind::Stairs => false,
    };
    if preferred {
        score += PREFERRED_KIND_BONUS;
    }

    if transition.accessibility.map_or(false, |a| a.any()) {
        score += ACCESSIBILITY_BONUS;
    }

    if preferences.avoid_stairs && transition.kind == TransitionKind::Stairs {
        score -= STAIRS_AVOIDANCE_PENALTY;
    }

    score.max(0.0).min(1.0)
}

/// Mean score of a chain's transitions
pub fn score_chain<S: TransitionStatusSource + ?Sized>(
    plan: &FloorPlan,
    chain: &Chain,
    status: &S,
    preferences: &RoutePreferences,
) -> f64 {
    if chain.is_empty() {
        return BASE_TRANSITION_SCORE;
    }
    let total: f64 = chain
        .iter()
        .filter_map(|hop| plan.transition(hop.transition))
        .map(|t| score_transition(t, status.crowd_level(t), preferences))
        .sum();
    total / chain.len() as f64
}

/// All loop-free chains from `from` to `to` of at most `max_hops` transitions
///
/// `usable` filters individual transitions (status, accessibility).
pub fn enumerate_chains<F>(plan: &FloorPlan, from: FloorId, to: FloorId, max_hops: usize, usable: F) -> Vec<Chain>
where
    F: Fn(&VerticalTransition) -> bool,
{
    let mut chains = Vec::new();
    let mut current = Chain::new();
    let mut visited: heapless::Vec<FloorId, { MAX_CHAIN_TRANSITIONS + 1 }> = heapless::Vec::new();
    // Capacity is MAX_CHAIN_TRANSITIONS + 1, the first push cannot fail
    let _ = visited.push(from);

    let max_hops = max_hops.min(MAX_CHAIN_TRANSITIONS);
    extend(plan, from, to, max_hops, &usable, &mut current, &mut visited, &mut chains);
    chains
}

#[allow(clippy::too_many_arguments)]
fn extend<F>(
    plan: &FloorPlan,
    floor: FloorId,
    target: FloorId,
    max_hops: usize,
    usable: &F,
    current: &mut Chain,
    visited: &mut heapless::Vec<FloorId, { MAX_CHAIN_TRANSITIONS + 1 }>,
    chains: &mut Vec<Chain>,
) where
    F: Fn(&VerticalTransition) -> bool,
{
    if floor == target {
        chains.push(current.clone());
        return;
    }
    if current.len() >= max_hops {
        return;
    }

    for (index, transition) in plan.transitions().iter().enumerate() {
        if chains.len() >= MAX_ENUMERATED_CHAINS {
            return;
        }
        let next = match transition.destination_from(floor) {
            Some(next) => next,
            None => continue,
        };
        if visited.contains(&next) || !usable(transition) {
            continue;
        }

        let hop = Hop {
            transition: index,
            from: floor,
            to: next,
        };
        if current.push(hop).is_err() || visited.push(next).is_err() {
            continue;
        }
        extend(plan, next, target, max_hops, usable, current, visited, chains);
        current.pop();
        visited.pop();
    }
}
