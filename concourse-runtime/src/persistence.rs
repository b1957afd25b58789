//! Non-blocking persistence of recalibrated beacons
//!
//! ## Design
//!
//! The calibration loop must never wait on storage. After a pass it submits
//! the new registry snapshot to a `watch` channel and moves on; a writer task
//! persists whatever snapshot is newest when it gets to run.
//!
//! ```text
//! calibration pass ──submit(snapshot)──▶ watch ──▶ writer task ──▶ BeaconPersistence
//!                    (never blocks)     (keeps newest only)
//! ```
//!
//! Snapshots submitted while the writer is busy supersede each other: only
//! the last one is written (last-write-wins). Nothing is lost by this, since
//! every snapshot holds every beacon's latest position. The writer
//! remembers what it has stored per beacon and only writes records whose
//! calibration timestamp moved; failed writes are retried with the next
//! snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use concourse_core::beacon::{BeaconId, BeaconRecord, BeaconRegistry};
use concourse_core::time::Timestamp;
use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::RuntimeResult;

/// Storage for beacon positions
#[async_trait]
pub trait BeaconPersistence: Send + Sync {
    /// Stores a beacon's recalibrated record
    async fn save_beacon(&self, record: &BeaconRecord) -> RuntimeResult<()>;
}

/// Counters shared between the writer task and its handle
#[derive(Debug, Default)]
pub struct PersistenceStats {
    pub snapshots_written: AtomicU64,
    pub records_written: AtomicU64,
    pub failures: AtomicU64,
}

/// Submits snapshots to the writer task
#[derive(Debug, Clone)]
pub struct PersistenceHandle {
    tx: Arc<watch::Sender<Option<Arc<BeaconRegistry>>>>,
    stats: Arc<PersistenceStats>,
}

impl PersistenceHandle {
    /// Queues a snapshot, replacing any snapshot not yet written
    pub fn submit(&self, snapshot: Arc<BeaconRegistry>) {
        if self.tx.send_replace(Some(snapshot)).is_some() {
            debug!("pending beacon snapshot superseded");
        }
    }

    pub fn stats(&self) -> &PersistenceStats {
        &self.stats
    }
}

/// Spawns the writer task; it stops when `shutdown` is cancelled
pub fn spawn_writer(
    store: Arc<dyn BeaconPersistence>,
    shutdown: CancellationToken,
) -> (PersistenceHandle, JoinHandle<()>) {
    let (tx, rx) = watch::channel(None);
    let stats = Arc::new(PersistenceStats::default());
    let writer = Writer {
        store,
        rx,
        stats: Arc::clone(&stats),
        persisted: BTreeMap::new(),
    };
    let task = tokio::spawn(writer.run(shutdown));
    (
        PersistenceHandle {
            tx: Arc::new(tx),
            stats,
        },
        task,
    )
}

struct Writer {
    store: Arc<dyn BeaconPersistence>,
    rx: watch::Receiver<Option<Arc<BeaconRegistry>>>,
    stats: Arc<PersistenceStats>,
    /// Calibration timestamp last written per beacon
    persisted: BTreeMap<BeaconId, Timestamp>,
}

impl Writer {
    async fn run(mut self, shutdown: CancellationToken) {
        info!("beacon persistence writer started");
        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                changed = self.rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = self.rx.borrow_and_update().clone();
                    if let Some(snapshot) = snapshot {
                        self.write(&snapshot).await;
                    }
                }
            }
        }
        info!("beacon persistence writer stopped");
    }

    async fn write(&mut self, snapshot: &BeaconRegistry) {
        let mut written = 0u64;
        for record in snapshot.iter() {
            let calibrated_at = match record.last_calibration {
                Some(at) => at,
                None => continue,
            };
            if self.persisted.get(&record.beacon_id) == Some(&calibrated_at) {
                continue;
            }

            match self.store.save_beacon(record).await {
                Ok(()) => {
                    self.persisted.insert(record.beacon_id.clone(), calibrated_at);
                    written += 1;
                }
                Err(err) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!("persisting beacon {} failed: {}", record.beacon_id, err);
                }
            }
        }

        self.stats.snapshots_written.fetch_add(1, Ordering::Relaxed);
        self.stats.records_written.fetch_add(written, Ordering::Relaxed);
        debug!("beacon snapshot persisted, {} records written", written);
    }
}
