//! Scheduled beacon recalibration
//!
//! Three loops share one [`CalibrationEngine`]:
//!
//! - **intake** moves sample batches from the tracking ticks into the engine
//! - **pass** recalibrates every eligible beacon on a fixed period
//! - **drift** prunes drift histories and logs beacons beyond the alert
//!   magnitude
//!
//! A pass estimates against a snapshot of the registry. Only the beacons it
//! moved are then written onto whatever registry is current, so edits made
//! while the pass ran survive. The result is handed to the persistence
//! writer and tracking picks it up on its next tick. Passes that move
//! nothing leave the shared registry untouched.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use concourse_core::beacon::{BeaconId, BeaconRegistry};
use concourse_core::calibration::{BeaconCalibrationStats, CalibrationConfig, CalibrationEngine, CalibrationReport, DriftAlert};
use concourse_core::fusion::SampleCandidate;
use concourse_core::geometry::Position;
use concourse_core::time::TimeSource;
use log::{debug, info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeResult;
use crate::persistence::PersistenceHandle;
use crate::store::Shared;

/// Loop periods and queue size
#[derive(Debug, Clone, Copy)]
pub struct CalibrationSchedule {
    pub pass_interval: Duration,
    pub drift_check_interval: Duration,
    pub sample_queue_capacity: usize,
}

/// Runs calibration passes and drift checks on a schedule
pub struct CalibrationService<C: TimeSource + 'static> {
    engine: Arc<Mutex<CalibrationEngine<C>>>,
    registry: Arc<Shared<BeaconRegistry>>,
    persistence: Option<PersistenceHandle>,
    schedule: CalibrationSchedule,
    samples_tx: mpsc::Sender<Vec<SampleCandidate>>,
    samples_rx: Mutex<Option<mpsc::Receiver<Vec<SampleCandidate>>>>,
    reports: Arc<watch::Sender<Option<Arc<CalibrationReport>>>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<C: TimeSource + 'static> CalibrationService<C> {
    pub fn new(
        clock: C,
        config: CalibrationConfig,
        registry: Arc<Shared<BeaconRegistry>>,
        schedule: CalibrationSchedule,
        shutdown: CancellationToken,
    ) -> RuntimeResult<Self> {
        let engine = CalibrationEngine::new(clock, config)?;
        let (samples_tx, samples_rx) = mpsc::channel(schedule.sample_queue_capacity.max(1));
        let (reports, _) = watch::channel(None);
        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            registry,
            persistence: None,
            schedule,
            samples_tx,
            samples_rx: Mutex::new(Some(samples_rx)),
            reports: Arc::new(reports),
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Hands every changed registry to `handle`
    pub fn with_persistence(mut self, handle: PersistenceHandle) -> Self {
        self.persistence = Some(handle);
        self
    }

    /// Queue the tracking ticks feed samples into
    pub fn sample_sender(&self) -> mpsc::Sender<Vec<SampleCandidate>> {
        self.samples_tx.clone()
    }

    /// Report of the latest pass; `None` before the first one
    pub fn reports(&self) -> watch::Receiver<Option<Arc<CalibrationReport>>> {
        self.reports.subscribe()
    }

    /// Spawns the three loops; later calls do nothing
    pub fn start(&self) {
        let Some(samples_rx) = self.samples_rx.lock().take() else {
            debug!("calibration loops already running");
            return;
        };

        let intake = tokio::spawn(intake_loop(
            Arc::clone(&self.engine),
            samples_rx,
            self.shutdown.clone(),
        ));
        let pass = tokio::spawn(pass_loop(
            Arc::clone(&self.engine),
            Arc::clone(&self.registry),
            self.persistence.clone(),
            Arc::clone(&self.reports),
            self.schedule.pass_interval,
            self.shutdown.clone(),
        ));
        let drift = tokio::spawn(drift_loop(
            Arc::clone(&self.engine),
            self.schedule.drift_check_interval,
            self.shutdown.clone(),
        ));

        self.tasks.lock().extend([intake, pass, drift]);
        info!(
            "calibration started, pass every {:?}, drift check every {:?}",
            self.schedule.pass_interval, self.schedule.drift_check_interval
        );
    }

    /// Records samples directly, bypassing the queue
    pub fn record_candidates(&self, candidates: &[SampleCandidate]) {
        self.engine.lock().record_candidates(candidates);
    }

    /// Runs one pass now, outside the schedule
    pub fn run_pass(&self) -> Arc<CalibrationReport> {
        run_pass(&self.engine, &self.registry, self.persistence.as_ref(), &self.reports)
    }

    pub fn check_drift(&self) -> Vec<DriftAlert> {
        self.engine.lock().check_drift()
    }

    pub fn current_drift(&self, beacon_id: &BeaconId) -> Option<Position> {
        self.engine.lock().current_drift(beacon_id)
    }

    pub fn calibration_stats(&self) -> BTreeMap<BeaconId, BeaconCalibrationStats> {
        self.engine.lock().get_calibration_stats()
    }

    pub fn excessive_drift_alerts(&self) -> u64 {
        self.engine.lock().excessive_drift_alerts()
    }

    pub fn sample_count(&self, beacon_id: &BeaconId) -> usize {
        self.engine.lock().sample_count(beacon_id)
    }

    /// Cancels the loops and waits for them to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let _ = task.await;
        }
    }
}

fn run_pass<C: TimeSource>(
    engine: &Mutex<CalibrationEngine<C>>,
    registry: &Shared<BeaconRegistry>,
    persistence: Option<&PersistenceHandle>,
    reports: &watch::Sender<Option<Arc<CalibrationReport>>>,
) -> Arc<CalibrationReport> {
    let mut snapshot = BeaconRegistry::clone(&registry.load());
    let report = Arc::new(engine.lock().run_calibration_pass(&mut snapshot));

    if !report.updates.is_empty() {
        let next = apply_updates(registry, &report);
        if let Some(persistence) = persistence {
            persistence.submit(next);
        }
        for update in report.updates.iter().filter(|u| u.excessive) {
            warn!(
                "beacon {} moved {:.2} m ({:.2} m/day)",
                update.beacon_id, update.drift, update.drift_rate
            );
        }
    }

    reports.send_replace(Some(Arc::clone(&report)));
    report
}

/// Writes the pass's new positions onto the current registry
fn apply_updates(registry: &Shared<BeaconRegistry>, report: &CalibrationReport) -> Arc<BeaconRegistry> {
    registry.update(|current| {
        for update in &report.updates {
            if current
                .update_position(&update.beacon_id, update.new_position, report.timestamp)
                .is_none()
            {
                debug!("beacon {} removed during the pass", update.beacon_id);
            }
        }
    });
    registry.load()
}

async fn intake_loop<C: TimeSource>(
    engine: Arc<Mutex<CalibrationEngine<C>>>,
    mut samples: mpsc::Receiver<Vec<SampleCandidate>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            batch = samples.recv() => match batch {
                Some(batch) => {
                    engine.lock().record_candidates(&batch);
                }
                None => break,
            },
        }
    }
    debug!("calibration intake stopped");
}

async fn pass_loop<C: TimeSource>(
    engine: Arc<Mutex<CalibrationEngine<C>>>,
    registry: Arc<Shared<BeaconRegistry>>,
    persistence: Option<PersistenceHandle>,
    reports: Arc<watch::Sender<Option<Arc<CalibrationReport>>>>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // First tick completes immediately
    interval.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = interval.tick() => {
                run_pass(&engine, &registry, persistence.as_ref(), &reports);
            }
        }
    }
    debug!("calibration pass loop stopped");
}

async fn drift_loop<C: TimeSource>(
    engine: Arc<Mutex<CalibrationEngine<C>>>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            _ = interval.tick() => {
                let alerts = engine.lock().check_drift();
                if !alerts.is_empty() {
                    info!("{} beacons drifting beyond the alert magnitude", alerts.len());
                }
            }
        }
    }
    debug!("drift check loop stopped");
}
