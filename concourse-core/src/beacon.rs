//! Beacon identities, observations and the shared beacon registry
//!
//! The registry is the single source of truth for where each beacon is
//! believed to be. Fusion reads it on every tick; calibration is the only
//! writer. Ordered maps keep iteration (and therefore every computation that
//! walks the registry) deterministic.

use alloc::collections::BTreeMap;
use core::fmt;

use crate::constants::calibration::{DEFAULT_PATH_LOSS_EXPONENT, DEFAULT_TX_POWER_DBM};
use crate::geometry::{FloorId, Position};
use crate::time::Timestamp;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum identifier length in bytes
pub const BEACON_ID_CAPACITY: usize = 32;

/// Beacon identifier
///
/// Up to 32 ASCII bytes from `[A-Za-z0-9-_:.]`, which covers MAC addresses
/// and iBeacon `uuid:major:minor` triples. Anything else is malformed and
/// never reaches the engines.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeaconId(heapless::String<BEACON_ID_CAPACITY>);

impl BeaconId {
    /// Validates and copies an identifier; `None` if malformed
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() || !raw.bytes().all(Self::is_valid_byte) {
            return None;
        }
        let mut id = heapless::String::new();
        id.push_str(raw).ok()?;
        Some(Self(id))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    fn is_valid_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':' | b'.')
    }
}

impl fmt::Display for BeaconId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Radio technology of a beacon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SignalType {
    /// Bluetooth Low Energy; ranges derived from RSSI
    ShortRange,
    /// Ultra-wideband; ranges from time of flight
    UltraWideband,
}

/// One range measurement to one beacon
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeaconObservation {
    pub beacon_id: BeaconId,
    pub signal_type: SignalType,
    /// Estimated distance, metres
    pub measured_distance: f64,
    /// RSSI, dBm
    pub signal_strength: f64,
    pub observed_at: Timestamp,
}

/// Raw scan as delivered by a feed, before id validation
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeaconScan {
    pub beacon_id: alloc::string::String,
    pub signal_strength: f64,
    pub distance: f64,
}

/// Log-distance path-loss model
///
/// ```text
/// rssi(d) = tx_power − 10·n·log10(d)
/// d(rssi) = 10^((tx_power − rssi) / (10·n))
/// ```
///
/// `tx_power` is the RSSI at one metre; `n` is 2.0 in free space and higher
/// in cluttered halls.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PathLossModel {
    pub tx_power_dbm: f64,
    pub exponent: f64,
}

impl PathLossModel {
    pub const fn new(tx_power_dbm: f64, exponent: f64) -> Self {
        Self { tx_power_dbm, exponent }
    }

    /// Distance in metres implied by an RSSI reading
    pub fn distance_from_rssi(&self, rssi_dbm: f64) -> f64 {
        libm::pow(10.0, (self.tx_power_dbm - rssi_dbm) / (10.0 * self.exponent))
    }

    /// RSSI expected at `distance` metres
    pub fn rssi_at(&self, distance: f64) -> f64 {
        self.tx_power_dbm - 10.0 * self.exponent * libm::log10(distance)
    }
}

impl Default for PathLossModel {
    fn default() -> Self {
        Self::new(DEFAULT_TX_POWER_DBM, DEFAULT_PATH_LOSS_EXPONENT)
    }
}

/// Installed beacon with its believed position
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeaconRecord {
    pub beacon_id: BeaconId,
    pub signal_type: SignalType,
    pub position: Position,
    pub floor: FloorId,
    pub path_loss: PathLossModel,
    /// When calibration last moved this beacon
    pub last_calibration: Option<Timestamp>,
}

impl BeaconRecord {
    pub fn new(beacon_id: BeaconId, signal_type: SignalType, position: Position, floor: FloorId) -> Self {
        Self {
            beacon_id,
            signal_type,
            position,
            floor,
            path_loss: PathLossModel::default(),
            last_calibration: None,
        }
    }

    pub fn with_path_loss(mut self, path_loss: PathLossModel) -> Self {
        self.path_loss = path_loss;
        self
    }
}

/// All installed beacons keyed by id
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BeaconRegistry {
    beacons: BTreeMap<BeaconId, BeaconRecord>,
}

impl BeaconRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a beacon
    pub fn insert(&mut self, record: BeaconRecord) -> Option<BeaconRecord> {
        self.beacons.insert(record.beacon_id.clone(), record)
    }

    pub fn get(&self, id: &BeaconId) -> Option<&BeaconRecord> {
        self.beacons.get(id)
    }

    pub fn contains(&self, id: &BeaconId) -> bool {
        self.beacons.contains_key(id)
    }

    /// Moves a beacon to a recalibrated position, returning the previous one
    pub fn update_position(
        &mut self,
        id: &BeaconId,
        position: Position,
        calibrated_at: Timestamp,
    ) -> Option<Position> {
        let record = self.beacons.get_mut(id)?;
        let previous = record.position;
        record.position = position;
        record.last_calibration = Some(calibrated_at);
        Some(previous)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BeaconRecord> {
        self.beacons.values()
    }

    pub fn len(&self) -> usize {
        self.beacons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beacons.is_empty()
    }
}

impl FromIterator<BeaconRecord> for BeaconRegistry {
    fn from_iter<I: IntoIterator<Item = BeaconRecord>>(iter: I) -> Self {
        let mut registry = Self::new();
        for record in iter {
            registry.insert(record);
        }
        registry
    }
}
