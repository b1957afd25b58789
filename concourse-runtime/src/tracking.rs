//! Scheduled per-subject position fusion
//!
//! ## Overview
//!
//! Every tracked subject owns its fusion state behind its own lock and gets
//! its own tick task. Each tick:
//!
//! 1. loads the current beacon registry snapshot (calibration may have
//!    swapped it)
//! 2. recomputes the subject's fused position
//! 3. publishes it on the subject's `watch` channel
//! 4. forwards pose-anchored calibration samples, if any
//!
//! ```text
//! scans/poses A ──▶ Mutex<SubjectFusion> A ◀── tick task A ──▶ watch A
//! scans/poses B ──▶ Mutex<SubjectFusion> B ◀── tick task B ──▶ watch B
//!                                   samples ──▶ calibration queue
//! ```
//!
//! Ticks of different subjects never wait on each other; the subject map is
//! only write-locked to start or stop tracking. Each tick task runs under a
//! child of the service's cancellation token: stopping a subject cancels only
//! that task and drops only that subject's state; shutting the service down
//! cancels them all.
//!
//! No `parking_lot` guard is held across an `.await`.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use concourse_core::beacon::BeaconRegistry;
use concourse_core::feed::{Feed, FeedDrain};
use concourse_core::fusion::{
    EvidenceState, FusedPosition, FusionConfig, FusionInput, PoseEstimate, SampleCandidate, SubjectFusion, SubjectId,
};
use concourse_core::time::TimeSource;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, RuntimeResult};
use crate::store::Shared;

/// Latest fused position of one subject; `None` until the first evidence
pub type PositionReceiver = watch::Receiver<Option<FusedPosition>>;

type SubjectState = Arc<Mutex<SubjectFusion>>;

struct SubjectTask {
    fusion: SubjectState,
    token: CancellationToken,
    positions: PositionReceiver,
    handle: JoinHandle<()>,
}

/// Runs fusion ticks for every tracked subject
pub struct TrackingService<C: TimeSource + 'static> {
    clock: Arc<C>,
    config: FusionConfig,
    registry: Arc<Shared<BeaconRegistry>>,
    samples: Option<mpsc::Sender<Vec<SampleCandidate>>>,
    tick_interval: Duration,
    shutdown: CancellationToken,
    subjects: RwLock<BTreeMap<SubjectId, SubjectTask>>,
}

impl<C: TimeSource + 'static> TrackingService<C> {
    pub fn new(
        clock: C,
        config: FusionConfig,
        registry: Arc<Shared<BeaconRegistry>>,
        tick_interval: Duration,
        shutdown: CancellationToken,
    ) -> RuntimeResult<Self> {
        config.validate()?;
        Ok(Self {
            clock: Arc::new(clock),
            config,
            registry,
            samples: None,
            tick_interval,
            shutdown,
            subjects: RwLock::new(BTreeMap::new()),
        })
    }

    /// Forwards calibration samples produced by ticks to `sender`
    pub fn with_sample_sink(mut self, sender: mpsc::Sender<Vec<SampleCandidate>>) -> Self {
        self.samples = Some(sender);
        self
    }

    /// Starts tracking a subject and its tick task
    pub fn start_tracking(&self, subject: &SubjectId) -> RuntimeResult<PositionReceiver> {
        if self.shutdown.is_cancelled() {
            return Err(RuntimeError::Stopped);
        }

        let mut subjects = self.subjects.write();
        if subjects.contains_key(subject) {
            return Err(RuntimeError::AlreadyTracking(subject.to_string()));
        }

        let fusion = Arc::new(Mutex::new(SubjectFusion::new(self.config)));
        let (tx, rx) = watch::channel(None);
        let token = self.shutdown.child_token();
        let handle = tokio::spawn(tick_loop(
            subject.clone(),
            Arc::clone(&fusion),
            Arc::clone(&self.clock),
            Arc::clone(&self.registry),
            self.samples.clone(),
            self.tick_interval,
            tx,
            token.clone(),
        ));

        subjects.insert(
            subject.clone(),
            SubjectTask {
                fusion,
                token,
                positions: rx.clone(),
                handle,
            },
        );
        info!("subject {} tracked", subject);
        Ok(rx)
    }

    /// Stops a subject's task and drops its fusion state
    pub fn stop_tracking(&self, subject: &SubjectId) -> RuntimeResult<()> {
        let task = self
            .subjects
            .write()
            .remove(subject)
            .ok_or_else(|| RuntimeError::UnknownSubject(subject.to_string()))?;
        task.token.cancel();
        info!("subject {} no longer tracked", subject);
        Ok(())
    }

    /// Another receiver for a tracked subject's positions
    pub fn subscribe(&self, subject: &SubjectId) -> RuntimeResult<PositionReceiver> {
        self.subjects
            .read()
            .get(subject)
            .map(|task| task.positions.clone())
            .ok_or_else(|| RuntimeError::UnknownSubject(subject.to_string()))
    }

    pub fn tracked_subjects(&self) -> Vec<SubjectId> {
        self.subjects.read().keys().cloned().collect()
    }

    pub fn ingest_beacon(&self, subject: &SubjectId, beacon_id: &str, signal_strength: f64, distance: f64) {
        match self.fusion(subject) {
            Some(fusion) => {
                let registry = self.registry.load();
                fusion
                    .lock()
                    .ingest_beacon(self.clock.now(), &registry, beacon_id, signal_strength, distance);
            }
            None => debug!("beacon for untracked subject {} dropped", subject),
        }
    }

    pub fn ingest_pose(&self, subject: &SubjectId, pose: PoseEstimate) {
        match self.fusion(subject) {
            Some(fusion) => fusion.lock().ingest_pose(pose),
            None => debug!("pose for untracked subject {} dropped", subject),
        }
    }

    /// Pulls everything ready from a subject's input feed
    ///
    /// The feed is left untouched for an untracked subject.
    pub fn drain_feed<F>(&self, subject: &SubjectId, feed: &mut F) -> FeedDrain
    where
        F: Feed<Item = FusionInput>,
    {
        match self.fusion(subject) {
            Some(fusion) => {
                let registry = self.registry.load();
                fusion.lock().drain_feed(feed, self.clock.as_ref(), &registry)
            }
            None => FeedDrain::default(),
        }
    }

    pub fn current_position(&self, subject: &SubjectId) -> Option<FusedPosition> {
        self.fusion(subject)?.lock().last().copied()
    }

    pub fn evidence_state(&self, subject: &SubjectId) -> Option<EvidenceState> {
        self.fusion(subject).map(|fusion| fusion.lock().state())
    }

    /// Cancels every tick task and waits for them to finish
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let tasks: Vec<SubjectTask> = {
            let mut subjects = self.subjects.write();
            std::mem::take(&mut *subjects).into_values().collect()
        };
        for task in tasks {
            let _ = task.handle.await;
        }
    }

    /// The subject's own state; the map lock is released before it is locked
    fn fusion(&self, subject: &SubjectId) -> Option<SubjectState> {
        self.subjects.read().get(subject).map(|task| Arc::clone(&task.fusion))
    }
}

#[allow(clippy::too_many_arguments)]
async fn tick_loop<C: TimeSource>(
    subject: SubjectId,
    fusion: SubjectState,
    clock: Arc<C>,
    registry: Arc<Shared<BeaconRegistry>>,
    samples: Option<mpsc::Sender<Vec<SampleCandidate>>>,
    period: Duration,
    positions: watch::Sender<Option<FusedPosition>>,
    token: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    debug!("tick task for {} started", subject);

    loop {
        tokio::select! {
            biased;

            _ = token.cancelled() => break,

            _ = interval.tick() => {
                let (fused, candidates) = {
                    let registry = registry.load();
                    let mut fusion = fusion.lock();
                    (fusion.tick(clock.now(), &registry), fusion.take_calibration_samples(&registry))
                };

                if let Some(fused) = fused {
                    positions.send_replace(Some(fused));
                }

                if !candidates.is_empty() {
                    if let Some(sink) = &samples {
                        if sink.try_send(candidates).is_err() {
                            debug!("calibration queue full, samples from {} dropped", subject);
                        }
                    }
                }
            }
        }
    }
    debug!("tick task for {} stopped", subject);
}
