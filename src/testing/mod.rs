//! Testing utilities for CrabEye
//!
//! Mock device, manual clock and a recording peer, so the whole pin can be
//! driven offline and deterministically.

pub mod mock_device;
pub mod recording_peer;
pub mod synthetic_data;

pub use mock_device::{MockDevice, MockDeviceState};
pub use recording_peer::{DeliveredFrame, RecordingPeer};
pub use synthetic_data::{fill_synthetic_bgra, synthetic_bgra_frame};

use crate::timing::{ReferenceClock, ReferenceTime};
use std::sync::atomic::{AtomicI64, Ordering};

/// Reference clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: ReferenceTime) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, now: ReferenceTime) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: ReferenceTime) {
        self.now.fetch_add(by, Ordering::SeqCst);
    }
}

impl ReferenceClock for ManualClock {
    fn now(&self) -> ReferenceTime {
        self.now.load(Ordering::SeqCst)
    }
}
