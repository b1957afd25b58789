//! Tokio services around the Concourse positioning core
//!
//! ## Overview
//!
//! `concourse-core` holds the engines as plain synchronous state machines.
//! This crate schedules them:
//!
//! | Service | Runs | Exposes |
//! |---------|------|---------|
//! | [`TrackingService`] | one fusion tick task per subject | `watch` stream of fused positions |
//! | [`CalibrationService`] | sample intake, calibration pass, drift check | pass reports, drift diagnostics |
//! | [`RouteService`] | synchronous, on the caller's thread | routes against live transition status |
//!
//! ```text
//!  beacon scans ─┐
//!  poses ────────┼─▶ TrackingService ──▶ watch<FusedPosition> per subject
//!                │         │ samples (mpsc)
//!                │         ▼
//!                │   CalibrationService ──▶ Shared<BeaconRegistry> ──▶ writer task
//!                │         ▲                       │
//!                └─────────┴──── registry refresh ◀┘
//! ```
//!
//! Every loop runs under a child of one [`CancellationToken`]; stopping a
//! subject cancels its tick task only, and [`ConcourseRuntime::shutdown`]
//! cancels everything.
//!
//! ## Example
//!
//! ```rust,no_run
//! use concourse_core::beacon::BeaconRegistry;
//! use concourse_core::fusion::SubjectId;
//! use concourse_core::routing::FloorPlan;
//! use concourse_runtime::{ConcourseRuntime, ServiceConfig, TokioClock};
//!
//! # async fn run(registry: BeaconRegistry, plan: FloorPlan) -> concourse_runtime::RuntimeResult<()> {
//! let config = ServiceConfig::from_json(r#"{ "tick_interval_ms": 200 }"#)?;
//! let runtime = ConcourseRuntime::new(config, TokioClock::from_system(), registry, plan, None)?;
//! runtime.start();
//!
//! let subject = SubjectId::new("phone-17");
//! let mut positions = runtime.tracking().start_tracking(&subject)?;
//! runtime.tracking().ingest_beacon(&subject, "gate-a-1", -62.0, 4.2);
//!
//! positions.changed().await.ok();
//! println!("{:?}", *positions.borrow());
//!
//! runtime.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod clock;
pub mod config;
pub mod error;
pub mod persistence;
pub mod routing;
pub mod store;
pub mod tracking;

use std::sync::Arc;

use concourse_core::beacon::BeaconRegistry;
use concourse_core::routing::FloorPlan;
use concourse_core::time::TimeSource;
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use calibration::{CalibrationSchedule, CalibrationService};
pub use clock::TokioClock;
pub use config::ServiceConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use persistence::{spawn_writer, BeaconPersistence, PersistenceHandle, PersistenceStats};
pub use routing::{RouteService, TransitionStatusBoard};
pub use store::Shared;
pub use tracking::{PositionReceiver, TrackingService};

/// All services over one beacon registry and floor plan
pub struct ConcourseRuntime<C: TimeSource + Clone + 'static> {
    registry: Arc<Shared<BeaconRegistry>>,
    tracking: TrackingService<C>,
    calibration: CalibrationService<C>,
    routes: RouteService,
    persistence: Option<(PersistenceHandle, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl<C: TimeSource + Clone + 'static> ConcourseRuntime<C> {
    /// Wires the services; call [`start`](Self::start) inside a tokio runtime
    /// to begin the calibration loops.
    ///
    /// With a `store`, the persistence writer task is spawned immediately,
    /// so this must also be called within a tokio runtime.
    pub fn new(
        config: ServiceConfig,
        clock: C,
        registry: BeaconRegistry,
        plan: FloorPlan,
        store: Option<Arc<dyn BeaconPersistence>>,
    ) -> RuntimeResult<Self> {
        config.validate()?;
        let shutdown = CancellationToken::new();
        let registry = Arc::new(Shared::new(registry));

        let persistence = store.map(|store| spawn_writer(store, shutdown.child_token()));

        let mut calibration = CalibrationService::new(
            clock.clone(),
            config.calibration,
            Arc::clone(&registry),
            CalibrationSchedule {
                pass_interval: config.calibration_pass_interval(),
                drift_check_interval: config.drift_check_interval(),
                sample_queue_capacity: config.sample_queue_capacity,
            },
            shutdown.child_token(),
        )?;
        if let Some((handle, _)) = &persistence {
            calibration = calibration.with_persistence(handle.clone());
        }

        let tracking = TrackingService::new(
            clock,
            config.fusion,
            Arc::clone(&registry),
            config.tick_interval(),
            shutdown.child_token(),
        )?
        .with_sample_sink(calibration.sample_sender());

        let routes = RouteService::new(plan, config.routing)?;

        Ok(Self {
            registry,
            tracking,
            calibration,
            routes,
            persistence,
            shutdown,
        })
    }

    /// Starts the calibration and drift loops
    pub fn start(&self) {
        self.calibration.start();
        info!("concourse runtime started");
    }

    pub fn tracking(&self) -> &TrackingService<C> {
        &self.tracking
    }

    pub fn calibration(&self) -> &CalibrationService<C> {
        &self.calibration
    }

    pub fn routes(&self) -> &RouteService {
        &self.routes
    }

    /// Current beacon registry snapshot
    pub fn registry(&self) -> Arc<BeaconRegistry> {
        self.registry.load()
    }

    pub fn persistence_stats(&self) -> Option<&PersistenceStats> {
        self.persistence.as_ref().map(|(handle, _)| handle.stats())
    }

    /// Cancels every task and waits for them to finish
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.tracking.shutdown().await;
        self.calibration.shutdown().await;
        if let Some((_, writer)) = self.persistence {
            let _ = writer.await;
        }
        info!("concourse runtime stopped");
    }
}
