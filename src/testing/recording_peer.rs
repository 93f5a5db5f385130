//! Downstream peer that records what it is asked and what it receives.

use crate::allocator::MediaSample;
use crate::errors::{PinError, Result};
use crate::sink::DownstreamPin;
use crate::timing::ReferenceTime;
use crate::types::MediaFormat;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Metadata of one delivered sample. The sample itself is dropped on
/// delivery so its buffer goes straight back to the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveredFrame {
    pub len: usize,
    pub times: Option<(ReferenceTime, ReferenceTime)>,
    pub sync_point: bool,
    pub all_zero: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Acceptance {
    All,
    Nothing,
}

#[derive(Default)]
struct Log {
    queried: Vec<MediaFormat>,
    connections: Vec<MediaFormat>,
    frames: Vec<DeliveredFrame>,
}

pub struct RecordingPeer {
    acceptance: Acceptance,
    only: Option<MediaFormat>,
    fail_connection: bool,
    log: Mutex<Log>,
    cv: Condvar,
}

impl Default for RecordingPeer {
    fn default() -> Self {
        Self::accepting_all()
    }
}

impl RecordingPeer {
    pub fn accepting_all() -> Self {
        Self {
            acceptance: Acceptance::All,
            only: None,
            fail_connection: false,
            log: Mutex::new(Log::default()),
            cv: Condvar::new(),
        }
    }

    pub fn rejecting_all() -> Self {
        Self {
            acceptance: Acceptance::Nothing,
            ..Self::accepting_all()
        }
    }

    /// Accept exactly one format.
    pub fn accepting_only(format: MediaFormat) -> Self {
        Self {
            only: Some(format),
            ..Self::accepting_all()
        }
    }

    /// Accept in `query_accept` but fail `receive_connection`.
    pub fn failing_connection(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    pub fn queried(&self) -> Vec<MediaFormat> {
        self.log.lock().map(|g| g.queried.clone()).unwrap_or_default()
    }

    pub fn connections(&self) -> Vec<MediaFormat> {
        self.log
            .lock()
            .map(|g| g.connections.clone())
            .unwrap_or_default()
    }

    pub fn frames(&self) -> Vec<DeliveredFrame> {
        self.log.lock().map(|g| g.frames.clone()).unwrap_or_default()
    }

    /// Wait until at least `count` frames arrived. Returns the frames seen.
    pub fn wait_for_frames(&self, count: usize, timeout: Duration) -> Vec<DeliveredFrame> {
        let deadline = Instant::now() + timeout;
        let Ok(mut g) = self.log.lock() else {
            return Vec::new();
        };
        while g.frames.len() < count {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            match self.cv.wait_timeout(g, deadline - now) {
                Ok((next, _)) => g = next,
                Err(_) => return Vec::new(),
            }
        }
        g.frames.clone()
    }
}

impl DownstreamPin for RecordingPeer {
    fn query_accept(&self, format: &MediaFormat) -> bool {
        if let Ok(mut g) = self.log.lock() {
            g.queried.push(format.clone());
        }
        match (&self.only, self.acceptance) {
            (_, Acceptance::Nothing) => false,
            (Some(only), Acceptance::All) => only == format,
            (None, Acceptance::All) => true,
        }
    }

    fn receive_connection(&self, format: &MediaFormat) -> Result<()> {
        if self.fail_connection {
            return Err(PinError::PeerRejected);
        }
        self.log.lock()?.connections.push(format.clone());
        Ok(())
    }

    fn deliver(&self, sample: MediaSample) -> Result<()> {
        let frame = DeliveredFrame {
            len: sample.actual_len(),
            times: sample.times(),
            sync_point: sample.is_sync_point(),
            all_zero: sample.data().iter().all(|b| *b == 0),
        };
        self.log.lock()?.frames.push(frame);
        self.cv.notify_all();
        Ok(())
    }
}
