//! The capture pin: the single output endpoint of the adapter.
//!
//! `CapturePin` composes three narrow contracts instead of one wide one:
//! [`OutputPin`] for the host pull protocol, [`PropertySet`] for the pin
//! category property and [`StreamConfig`] for controllers choosing a format.
//! All control-path state lives behind one lock; the producer thread never
//! touches it after `on_start` hands it a [`FrameProducer`].

pub mod buffers;
pub mod producer;
pub mod properties;
pub mod stream_config;
pub mod traits;

pub use producer::FrameProducer;
pub use properties::{
    PinCategory, PropertySupport, PropertyValue, PIN_CATEGORY_CAPTURE, PIN_PROPERTY_GROUP,
    PROPERTY_CATEGORY,
};
pub use stream_config::{CapabilityDescriptor, Size};
pub use traits::{OutputPin, PropertySet, StreamConfig};

use crate::allocator::Allocator;
use crate::errors::{PinError, Result};
use crate::format::FormatNegotiator;
use crate::platform::{DeviceHandle, DeviceTuning};
use crate::sink::DownstreamPin;
use crate::timing::{FrameClock, ReferenceClock, ReferenceTime};
use crate::types::{AllocatorProperties, MediaFormat, PixelLayout};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Name of the one output pin.
pub const PIN_NAME: &str = "Out";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamState {
    Stopped,
    Running,
}

/// Behavior knobs fixed at pin construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PinSettings {
    /// Image controls applied after a successful device init.
    pub tuning: DeviceTuning,
    /// Keep streaming blank frames when the device refuses to initialize,
    /// instead of failing `on_start`.
    pub blank_frames_on_device_failure: bool,
}

struct Connection {
    peer: Arc<dyn DownstreamPin>,
    format: MediaFormat,
}

pub(crate) struct PinShared {
    state: StreamState,
    pub(crate) negotiator: FormatNegotiator,
    connection: Option<Connection>,
    reconnect_pending: bool,
    device_started: bool,
}

impl PinShared {
    /// Format buffer sizing and stream start work with.
    fn negotiated_format(&self) -> MediaFormat {
        match &self.connection {
            Some(connection) => connection.format.clone(),
            None => self.negotiator.current_format(),
        }
    }
}

pub struct CapturePin {
    device: Option<Arc<dyn DeviceHandle>>,
    clock: Option<Arc<dyn ReferenceClock>>,
    settings: PinSettings,
    pub(crate) shared: Mutex<PinShared>,
}

impl CapturePin {
    pub fn new(
        device: Option<Arc<dyn DeviceHandle>>,
        clock: Option<Arc<dyn ReferenceClock>>,
        settings: PinSettings,
    ) -> Self {
        Self {
            device,
            clock,
            settings,
            shared: Mutex::new(PinShared {
                state: StreamState::Stopped,
                negotiator: FormatNegotiator::new(),
                connection: None,
                reconnect_pending: false,
                device_started: false,
            }),
        }
    }

    /// A pin with no device and no clock: blank, untimed frames.
    pub fn deviceless() -> Self {
        Self::new(None, None, PinSettings::default())
    }

    pub fn name(&self) -> &'static str {
        PIN_NAME
    }

    pub fn device_name(&self) -> Option<String> {
        self.device.as_ref().map(|device| device.name())
    }

    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn has_clock(&self) -> bool {
        self.clock.is_some()
    }

    pub fn settings(&self) -> &PinSettings {
        &self.settings
    }

    pub fn state(&self) -> Result<StreamState> {
        Ok(self.shared.lock()?.state)
    }

    pub fn is_connected(&self) -> bool {
        self.shared
            .lock()
            .map(|g| g.connection.is_some())
            .unwrap_or(false)
    }

    pub fn connected_format(&self) -> Result<Option<MediaFormat>> {
        Ok(self
            .shared
            .lock()?
            .connection
            .as_ref()
            .map(|connection| connection.format.clone()))
    }

    /// The connection format when connected, the current offer otherwise.
    pub fn negotiated_format(&self) -> Result<MediaFormat> {
        Ok(self.shared.lock()?.negotiated_format())
    }

    /// Whether a forced format is waiting for the stream to stop before the
    /// peer is reconnected with it.
    pub fn reconnect_pending(&self) -> bool {
        self.shared
            .lock()
            .map(|g| g.reconnect_pending)
            .unwrap_or(false)
    }

    /// Peer lookup for the stop path, which has to work on a poisoned lock.
    pub(crate) fn peer_for_stop(&self) -> Option<Arc<dyn DownstreamPin>> {
        self.lock_for_stop()
            .connection
            .as_ref()
            .map(|connection| Arc::clone(&connection.peer))
    }

    pub(crate) fn peer(&self) -> Result<Option<Arc<dyn DownstreamPin>>> {
        Ok(self
            .shared
            .lock()?
            .connection
            .as_ref()
            .map(|connection| Arc::clone(&connection.peer)))
    }

    /// Connect to a downstream peer.
    ///
    /// Offers are walked in enumeration order and the first one both sides
    /// accept becomes the connection format. The peer is never called with
    /// the state lock held.
    pub fn connect(&self, peer: Arc<dyn DownstreamPin>) -> Result<MediaFormat> {
        let offers = {
            let g = self.shared.lock()?;
            if g.connection.is_some() {
                return Err(PinError::AlreadyConnected);
            }
            if g.state == StreamState::Running {
                return Err(PinError::NotStopped);
            }
            (0..g.negotiator.offered_count())
                .map(|index| g.negotiator.enumerate(index))
                .collect::<Result<Vec<_>>>()?
        };

        for format in offers {
            if self.check_format(&format).is_err() {
                continue;
            }
            if !peer.query_accept(&format) {
                log::debug!("Peer declined {}", format);
                continue;
            }
            peer.receive_connection(&format)?;

            let mut g = self.shared.lock()?;
            if g.connection.is_some() {
                return Err(PinError::AlreadyConnected);
            }
            g.connection = Some(Connection {
                peer,
                format: format.clone(),
            });
            log::info!("Pin {} connected at {}", PIN_NAME, format);
            return Ok(format);
        }

        log::warn!("Peer accepted none of the offered formats");
        Err(PinError::PeerRejected)
    }

    pub fn disconnect(&self) -> Result<()> {
        let mut g = self.shared.lock()?;
        if g.state == StreamState::Running {
            return Err(PinError::NotStopped);
        }
        match g.connection.take() {
            Some(connection) => {
                g.reconnect_pending = false;
                log::info!("Pin {} disconnected from {}", PIN_NAME, connection.format);
                Ok(())
            }
            None => Err(PinError::NotConnected),
        }
    }

    /// Force every future offer to `candidate`.
    ///
    /// Without a peer the override is stored as is. With one, the peer must
    /// accept the format first; on refusal nothing changes. The connection
    /// is then re-established at the new format, right away when stopped,
    /// or once the stream stops when running.
    pub fn force_format(&self, candidate: &MediaFormat) -> Result<()> {
        self.check_format(candidate)?;

        let Some(peer) = self.peer()? else {
            self.shared.lock()?.negotiator.force(candidate.clone());
            log::info!("Format forced to {}", candidate);
            return Ok(());
        };

        if !peer.query_accept(candidate) {
            log::warn!("Connected peer refused forced format {}", candidate);
            return Err(PinError::PeerRejected);
        }

        let running = {
            let mut g = self.shared.lock()?;
            g.negotiator.force(candidate.clone());
            let running = g.state == StreamState::Running;
            if running && g.connection.is_some() {
                g.reconnect_pending = true;
            }
            running
        };
        log::info!("Format forced to {}", candidate);

        if running {
            log::info!("Reconnect deferred until the stream stops");
            Ok(())
        } else {
            self.reconnect()
        }
    }

    /// Re-establish the connection at the current offer.
    fn reconnect(&self) -> Result<()> {
        let (peer, format) = {
            let g = self.shared.lock()?;
            match &g.connection {
                Some(connection) => (
                    Arc::clone(&connection.peer),
                    g.negotiator.current_format(),
                ),
                None => return Ok(()),
            }
        };

        peer.receive_connection(&format)?;

        let mut g = self.shared.lock()?;
        if let Some(connection) = g.connection.as_mut() {
            connection.format = format.clone();
        }
        g.reconnect_pending = false;
        log::info!("Pin {} reconnected at {}", PIN_NAME, format);
        Ok(())
    }

    /// Apply a reconnect deferred by `force_format` while running.
    pub(crate) fn apply_pending_reconnect(&self) -> Result<()> {
        let pending = {
            let g = self.shared.lock()?;
            g.reconnect_pending && g.state == StreamState::Stopped
        };
        if pending {
            self.reconnect()
        } else {
            Ok(())
        }
    }

    /// Quality feedback from downstream. Frames are never dropped or
    /// throttled, so there is nothing to adapt.
    pub fn notify_quality(&self, _late_by: ReferenceTime) -> Result<()> {
        Err(PinError::Unsupported(
            "quality notifications are not supported".to_string(),
        ))
    }

    // on_stop must succeed even after a panic elsewhere poisoned the lock
    fn lock_for_stop(&self) -> MutexGuard<'_, PinShared> {
        match self.shared.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn bind_device(
        &self,
        device: &Arc<dyn DeviceHandle>,
        format: &MediaFormat,
    ) -> Result<Option<Arc<dyn DeviceHandle>>> {
        let fps = format.fps();
        let width = format.width.unsigned_abs();
        let height = format.height.unsigned_abs();

        if device.init(width, height, fps, PixelLayout::Bgra32) {
            self.settings.tuning.apply(device.as_ref());
            device.start();
            log::info!("Device '{}' streaming {}", device.name(), format);
            return Ok(Some(Arc::clone(device)));
        }

        if self.settings.blank_frames_on_device_failure {
            log::warn!(
                "Device '{}' failed to initialize at {}, streaming blank frames",
                device.name(),
                format
            );
            Ok(None)
        } else {
            Err(PinError::DeviceInitFailed(format!(
                "'{}' could not be configured for {}",
                device.name(),
                format
            )))
        }
    }
}

impl OutputPin for CapturePin {
    fn check_format(&self, candidate: &MediaFormat) -> Result<()> {
        self.shared.lock()?.negotiator.validate(candidate)
    }

    fn enumerate_format(&self, index: i32) -> Result<MediaFormat> {
        self.shared.lock()?.negotiator.enumerate(index)
    }

    fn decide_buffer_size(
        &self,
        allocator: &dyn Allocator,
        request: AllocatorProperties,
    ) -> Result<AllocatorProperties> {
        let g = self.shared.lock()?;
        buffers::negotiate(&g.negotiated_format(), allocator, request)
    }

    fn on_start(&self) -> Result<FrameProducer> {
        self.apply_pending_reconnect()?;

        // held through device bring-up so concurrent starts cannot both
        // leave Stopped
        let mut g = self.shared.lock()?;
        if g.state == StreamState::Running {
            return Err(PinError::InvalidState("pin is already running".to_string()));
        }

        let format = g.negotiated_format();
        let clock = self.clock.as_ref().map(|clock| {
            let frame_clock = FrameClock::new(clock.now(), format.frame_interval);
            (Arc::clone(clock), frame_clock)
        });
        if clock.is_none() {
            log::debug!("No reference clock, samples will carry no timestamps");
        }

        let device = match &self.device {
            Some(device) => self.bind_device(device, &format)?,
            None => {
                log::info!("No capture device bound, streaming blank frames at {}", format);
                None
            }
        };

        g.device_started = device.is_some();
        g.state = StreamState::Running;
        Ok(FrameProducer::new(format, device, clock))
    }

    fn on_stop(&self) -> Result<()> {
        let mut g = self.lock_for_stop();
        if g.state == StreamState::Stopped {
            return Ok(());
        }
        if g.device_started {
            if let Some(device) = &self.device {
                device.stop();
            }
            g.device_started = false;
        }
        g.state = StreamState::Stopped;
        log::info!("Pin {} stopped", PIN_NAME);
        Ok(())
    }
}

impl std::fmt::Debug for CapturePin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapturePin")
            .field("device", &self.device_name())
            .field("has_clock", &self.clock.is_some())
            .field("settings", &self.settings)
            .field("connected", &self.is_connected())
            .finish()
    }
}
