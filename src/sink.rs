//! Downstream consumers of the pin's samples.

use crate::allocator::MediaSample;
use crate::errors::{PinError, Result};
use crate::types::MediaFormat;
use crossbeam_channel::{bounded, Receiver, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// The peer an output pin is connected to.
pub trait DownstreamPin: Send + Sync {
    /// Would the peer accept samples in `format`?
    fn query_accept(&self, format: &MediaFormat) -> bool;

    /// Called once a connection (or reconnection) settles on `format`.
    fn receive_connection(&self, _format: &MediaFormat) -> Result<()> {
        Ok(())
    }

    /// Hand over one produced sample. May block to apply backpressure.
    fn deliver(&self, sample: MediaSample) -> Result<()>;

    /// Samples delivered from now on may be discarded; blocked deliveries
    /// must return promptly.
    fn begin_flush(&self) {}

    fn end_flush(&self) {}
}

const FLUSH_POLL: Duration = Duration::from_millis(20);

/// Delivers samples to a consumer over a bounded channel.
///
/// A full channel blocks the producer, so a slow consumer slows the stream
/// instead of losing frames.
pub struct ChannelSink {
    tx: Sender<MediaSample>,
    accepted: Option<Vec<MediaFormat>>,
    format: Mutex<Option<MediaFormat>>,
    flushing: AtomicBool,
}

impl ChannelSink {
    /// A sink accepting any format, and the receiving end for the consumer.
    pub fn bounded(capacity: usize) -> (Self, Receiver<MediaSample>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                tx,
                accepted: None,
                format: Mutex::new(None),
                flushing: AtomicBool::new(false),
            },
            rx,
        )
    }

    /// Restrict the formats this sink accepts.
    pub fn accepting(mut self, formats: Vec<MediaFormat>) -> Self {
        self.accepted = Some(formats);
        self
    }

    /// Format of the current connection, if any.
    pub fn connection_format(&self) -> Option<MediaFormat> {
        self.format.lock().ok().and_then(|g| g.clone())
    }
}

impl DownstreamPin for ChannelSink {
    fn query_accept(&self, format: &MediaFormat) -> bool {
        match &self.accepted {
            Some(formats) => formats.contains(format),
            None => true,
        }
    }

    fn receive_connection(&self, format: &MediaFormat) -> Result<()> {
        *self.format.lock()? = Some(format.clone());
        Ok(())
    }

    fn deliver(&self, mut sample: MediaSample) -> Result<()> {
        loop {
            if self.flushing.load(Ordering::SeqCst) {
                return Ok(());
            }
            match self.tx.send_timeout(sample, FLUSH_POLL) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => sample = returned,
                Err(SendTimeoutError::Disconnected(_)) => return Err(PinError::NotConnected),
            }
        }
    }

    fn begin_flush(&self) {
        self.flushing.store(true, Ordering::SeqCst);
    }

    fn end_flush(&self) {
        self.flushing.store(false, Ordering::SeqCst);
    }
}
