//! Host-side streaming driver.
//!
//! A [`Streamer`] owns the one producer thread of a pin: it sizes and commits
//! the sample pool, starts the pin, then pulls frames one at a time and hands
//! them to the connected peer until told to stop.

use crate::allocator::Allocator;
use crate::errors::{PinError, Result};
use crate::pin::{CapturePin, FrameProducer, OutputPin};
use crate::sink::DownstreamPin;
use crate::types::AllocatorProperties;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

struct Worker {
    handle: JoinHandle<()>,
    stop_flag: Arc<AtomicBool>,
}

pub struct Streamer {
    pin: Arc<CapturePin>,
    allocator: Arc<dyn Allocator>,
    request: AllocatorProperties,
    worker: Mutex<Option<Worker>>,
    delivered: Arc<AtomicU64>,
    last_error: Arc<Mutex<Option<PinError>>>,
}

impl Streamer {
    pub fn new(pin: Arc<CapturePin>, allocator: Arc<dyn Allocator>) -> Self {
        Self {
            pin,
            allocator,
            request: AllocatorProperties::default(),
            worker: Mutex::new(None),
            delivered: Arc::new(AtomicU64::new(0)),
            last_error: Arc::new(Mutex::new(None)),
        }
    }

    /// Allocator request used by `activate`. A zero buffer count lets the
    /// pin pick its default.
    pub fn with_buffer_request(mut self, request: AllocatorProperties) -> Self {
        self.request = request;
        self
    }

    pub fn pin(&self) -> &Arc<CapturePin> {
        &self.pin
    }

    pub fn is_active(&self) -> bool {
        self.worker.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    /// Frames handed to the peer since the last `activate`.
    pub fn frames_delivered(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Error that ended the producer loop, if it ended on its own.
    pub fn last_error(&self) -> Option<PinError> {
        self.last_error.lock().ok().and_then(|g| g.clone())
    }

    /// Size and commit the pool, start the pin and spawn the producer.
    pub fn activate(&self) -> Result<AllocatorProperties> {
        let mut worker = self.worker.lock()?;
        if worker.is_some() {
            return Err(PinError::InvalidState("stream is already active".to_string()));
        }

        let peer = self.pin.peer()?.ok_or(PinError::NotConnected)?;
        self.pin.apply_pending_reconnect()?;

        let granted = self
            .pin
            .decide_buffer_size(self.allocator.as_ref(), self.request)?;
        self.allocator.commit()?;
        peer.end_flush();

        let producer = match self.pin.on_start() {
            Ok(producer) => producer,
            Err(e) => {
                self.allocator.decommit();
                return Err(e);
            }
        };

        self.delivered.store(0, Ordering::SeqCst);
        if let Ok(mut last) = self.last_error.lock() {
            *last = None;
        }

        let stop_flag = Arc::new(AtomicBool::new(false));
        let context = LoopContext {
            allocator: Arc::clone(&self.allocator),
            peer,
            stop_flag: Arc::clone(&stop_flag),
            delivered: Arc::clone(&self.delivered),
            last_error: Arc::clone(&self.last_error),
        };

        let spawned = std::thread::Builder::new()
            .name("crabeye-producer".to_string())
            .spawn(move || producer_loop(producer, context));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                let _ = self.pin.on_stop();
                self.allocator.decommit();
                return Err(PinError::InvalidState(format!("spawn failed: {e}")));
            }
        };

        *worker = Some(Worker { handle, stop_flag });
        log::info!(
            "Stream active: {} buffers of {} bytes",
            granted.buffer_count,
            granted.buffer_size
        );
        Ok(granted)
    }

    /// Stop the producer and wait for it. Returns the frames delivered
    /// during this run. A no-op when not active.
    pub fn deactivate(&self) -> Result<u64> {
        let taken = match self.worker.lock() {
            Ok(mut g) => g.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let Some(worker) = taken else {
            return Ok(0);
        };

        worker.stop_flag.store(true, Ordering::SeqCst);
        if let Some(peer) = self.pin.peer_for_stop() {
            peer.begin_flush();
        }
        // stopping the device unblocks a pending read, decommit a pending
        // get_buffer, flush a pending delivery
        let stopped = self.pin.on_stop();
        self.allocator.decommit();

        let joined = worker.handle.join();
        let frames = self.frames_delivered();
        log::info!("Stream stopped after {} frames", frames);

        // errors are reported only once the producer is gone
        stopped?;
        self.pin.apply_pending_reconnect()?;
        match joined {
            Ok(()) => Ok(frames),
            Err(_) => Err(PinError::InvalidState(
                "producer thread panicked".to_string(),
            )),
        }
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        if let Err(e) = self.deactivate() {
            log::warn!("Error stopping stream during drop: {}", e);
        }
    }
}

struct LoopContext {
    allocator: Arc<dyn Allocator>,
    peer: Arc<dyn DownstreamPin>,
    stop_flag: Arc<AtomicBool>,
    delivered: Arc<AtomicU64>,
    last_error: Arc<Mutex<Option<PinError>>>,
}

impl LoopContext {
    fn stopping(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// Errors seen after stop was requested are the expected way out of a
    /// blocked call and are not recorded.
    fn fail(&self, stage: &str, error: PinError) {
        if self.stopping() {
            log::debug!("Producer {} interrupted by stop: {}", stage, error);
            return;
        }
        log::error!("Producer {} failed: {}", stage, error);
        if let Ok(mut last) = self.last_error.lock() {
            *last = Some(error);
        }
    }
}

fn producer_loop(mut producer: FrameProducer, context: LoopContext) {
    log::debug!("Producer thread started for {}", producer.format());

    while !context.stopping() {
        let mut sample = match context.allocator.get_buffer() {
            Ok(sample) => sample,
            Err(e) => {
                context.fail("buffer request", e);
                break;
            }
        };

        if let Err(e) = producer.produce_frame(&mut sample) {
            context.fail("frame production", e);
            break;
        }
        if context.stopping() {
            break;
        }

        if let Err(e) = context.peer.deliver(sample) {
            context.fail("delivery", e);
            break;
        }
        context.delivered.fetch_add(1, Ordering::SeqCst);
    }

    log::debug!(
        "Producer thread exiting after {} frames",
        producer.frames_produced()
    );
}
