//! Route queries against live transition status
//!
//! The floor plan is fixed once loaded, but elevators go into maintenance
//! and escalators get crowded during the day. Operators post those changes
//! to a [`TransitionStatusBoard`]; every route query reads the board as it
//! is at that moment, and transitions without an entry keep the status and
//! crowd level recorded in the plan.

use std::collections::BTreeMap;
use std::sync::Arc;

use concourse_core::routing::graph::VerticalTransition;
use concourse_core::routing::{
    FloorPlan, MultiFloorRouteEngine, OperationalStatus, Route, RouteConfig, RouteRequest, TransitionStatusSource,
};
use log::{debug, info};

use crate::error::{RuntimeError, RuntimeResult};
use crate::store::Shared;

/// Status overrides keyed by transition id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionStatusBoard {
    status: BTreeMap<String, OperationalStatus>,
    crowd: BTreeMap<String, u8>,
}

impl TransitionStatusBoard {
    pub fn status_of(&self, id: &str) -> Option<OperationalStatus> {
        self.status.get(id).copied()
    }

    pub fn crowd_level_of(&self, id: &str) -> Option<u8> {
        self.crowd.get(id).copied()
    }
}

impl TransitionStatusSource for TransitionStatusBoard {
    fn status(&self, transition: &VerticalTransition) -> OperationalStatus {
        self.status_of(&transition.id).unwrap_or(transition.status)
    }

    fn crowd_level(&self, transition: &VerticalTransition) -> Option<u8> {
        self.crowd_level_of(&transition.id).or(transition.crowd_level)
    }
}

/// Reads whatever board is current at each lookup
impl TransitionStatusSource for Shared<TransitionStatusBoard> {
    fn status(&self, transition: &VerticalTransition) -> OperationalStatus {
        self.load().status(transition)
    }

    fn crowd_level(&self, transition: &VerticalTransition) -> Option<u8> {
        self.load().crowd_level(transition)
    }
}

/// Computes routes over one floor plan
pub struct RouteService {
    engine: Arc<MultiFloorRouteEngine>,
    board: Arc<Shared<TransitionStatusBoard>>,
}

impl RouteService {
    pub fn new(plan: FloorPlan, config: RouteConfig) -> RuntimeResult<Self> {
        let engine = MultiFloorRouteEngine::new(plan, config)?;
        info!(
            "route service loaded {} nodes, {} transitions",
            engine.plan().node_count(),
            engine.plan().transitions().len()
        );
        Ok(Self {
            engine: Arc::new(engine),
            board: Arc::new(Shared::new(TransitionStatusBoard::default())),
        })
    }

    pub fn plan(&self) -> &FloorPlan {
        self.engine.plan()
    }

    pub fn compute_route(&self, request: &RouteRequest) -> RuntimeResult<Route> {
        Ok(self.engine.compute_route_with_status(request, self.board.as_ref())?)
    }

    /// Posts a status change; affects every later query
    pub fn set_status(&self, transition_id: &str, status: OperationalStatus) -> RuntimeResult<()> {
        self.check_known(transition_id)?;
        self.board.update(|board| board.status.insert(transition_id.to_owned(), status));
        info!("transition {} now {:?}", transition_id, status);
        Ok(())
    }

    /// Posts a crowd level, 0 (empty) to 100 (packed)
    pub fn set_crowd_level(&self, transition_id: &str, level: u8) -> RuntimeResult<()> {
        self.check_known(transition_id)?;
        let level = level.min(100);
        self.board.update(|board| board.crowd.insert(transition_id.to_owned(), level));
        debug!("transition {} crowd level {}", transition_id, level);
        Ok(())
    }

    /// Drops every posted override
    pub fn clear_overrides(&self) {
        self.board.store(TransitionStatusBoard::default());
    }

    /// Current board snapshot
    pub fn status_board(&self) -> Arc<TransitionStatusBoard> {
        self.board.load()
    }

    fn check_known(&self, transition_id: &str) -> RuntimeResult<()> {
        match self.engine.plan().transition_index(transition_id) {
            Some(_) => Ok(()),
            None => Err(RuntimeError::UnknownTransition(transition_id.to_owned())),
        }
    }
}
