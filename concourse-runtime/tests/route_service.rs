//! Route service against the live status board

mod common;

use concourse_core::errors::RouteError;
use concourse_core::routing::{OperationalStatus, Route, RouteConfig, RoutePreferences, RouteRequest};
use concourse_runtime::{RouteService, RuntimeError};

use common::{at, two_floor_plan};

fn service() -> RouteService {
    RouteService::new(two_floor_plan(), RouteConfig::default()).unwrap()
}

fn transitions_used(route: &Route) -> Vec<String> {
    let mut ids: Vec<String> = route
        .points
        .iter()
        .filter_map(|p| p.metadata.transition.as_ref().map(|t| t.id.clone()))
        .collect();
    ids.dedup();
    ids
}

#[test]
fn test_closing_lift_blocks_wheelchair_route() {
    let routes = service();
    let request = RouteRequest::new(at(0.0, 0), at(0.0, 1)).with_preferences(RoutePreferences::wheelchair());

    let route = routes.compute_route(&request).unwrap();
    assert_eq!(transitions_used(&route), vec!["lift"]);
    assert_eq!(route.floor_changes, 1);
    assert!((route.total_distance - 80.0).abs() < 1e-9);

    routes.set_status("lift", OperationalStatus::Maintenance).unwrap();
    assert!(matches!(
        routes.compute_route(&request),
        Err(RuntimeError::Route(RouteError::NoPathFound))
    ));

    // walkers still have the stairs
    let walking = RouteRequest::new(at(0.0, 0), at(0.0, 1));
    assert_eq!(transitions_used(&routes.compute_route(&walking).unwrap()), vec!["stairs"]);

    routes.set_status("lift", OperationalStatus::Operational).unwrap();
    assert!(routes.compute_route(&request).is_ok());
}

#[test]
fn test_crowd_level_steers_crowd_averse_requests() {
    let routes = service();
    let preferences = RoutePreferences {
        avoid_crowded: true,
        ..RoutePreferences::default()
    };
    // both transitions are 40 m of walking away
    let request = RouteRequest::new(at(20.0, 0), at(20.0, 1)).with_preferences(preferences);

    assert_eq!(transitions_used(&routes.compute_route(&request).unwrap()), vec!["stairs"]);

    routes.set_crowd_level("stairs", 100).unwrap();
    assert_eq!(transitions_used(&routes.compute_route(&request).unwrap()), vec!["lift"]);
    assert_eq!(routes.status_board().crowd_level_of("stairs"), Some(100));

    routes.clear_overrides();
    assert_eq!(transitions_used(&routes.compute_route(&request).unwrap()), vec!["stairs"]);
}

#[test]
fn test_unknown_transition_rejected() {
    let routes = service();
    assert!(matches!(
        routes.set_status("lift-z", OperationalStatus::Closed),
        Err(RuntimeError::UnknownTransition(id)) if id == "lift-z"
    ));
    assert!(routes.status_board().status_of("lift-z").is_none());
}

#[test]
fn test_invalid_route_config_rejected() {
    let config = RouteConfig::default().with_max_candidates(0);
    assert!(matches!(
        RouteService::new(two_floor_plan(), config),
        Err(RuntimeError::InvalidConfig(_))
    ));
}
