//! Capture source: the container owning the pin.
//!
//! Binds the first discovered device (or none), applies the configured
//! settings and exposes the registration identity hosts discover it by.

use crate::allocator::Allocator;
use crate::config::AdapterConfig;
use crate::errors::Result;
use crate::pin::{CapturePin, StreamConfig, PIN_NAME};
use crate::platform::{self, DeviceHandle};
use crate::stream::Streamer;
use crate::timing::{ReferenceClock, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Name under which the source is discoverable.
pub const SOURCE_NAME: &str = "CrabEye Universal";

/// Name of the source's single output pin.
pub const OUTPUT_PIN_NAME: &str = PIN_NAME;

/// Unique identifier of this component.
pub const COMPONENT_ID: Uuid = Uuid::from_u128(0x5c1e7d3a_8f2b_4e61_9a0d_3b7c2e94f6a1);

/// Category the source registers under.
pub const VIDEO_INPUT_CATEGORY: Uuid = Uuid::from_u128(0x860bb310_5d01_11d0_bd3b_00a0c911ce86);

/// Identity a host needs to list the source. Installing it is up to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub name: String,
    pub component_id: Uuid,
    pub category: Uuid,
    pub output_pin: String,
}

pub fn registration() -> Registration {
    Registration {
        name: SOURCE_NAME.to_string(),
        component_id: COMPONENT_ID,
        category: VIDEO_INPUT_CATEGORY,
        output_pin: OUTPUT_PIN_NAME.to_string(),
    }
}

pub struct CaptureSource {
    pin: Arc<CapturePin>,
    config: AdapterConfig,
}

impl CaptureSource {
    /// Build a source over `devices`. Only the first one is ever bound.
    pub fn new(devices: Vec<Arc<dyn DeviceHandle>>, config: &AdapterConfig) -> Result<Self> {
        config.validate()?;

        let device = devices.into_iter().next();
        match &device {
            Some(device) => log::info!("Binding capture device '{}'", device.name()),
            None => log::info!("No capture device found, running deviceless"),
        }

        let clock: Option<Arc<dyn ReferenceClock>> = if config.stream.reference_clock {
            Some(Arc::new(SystemClock::new()))
        } else {
            None
        };

        let pin = Arc::new(CapturePin::new(device, clock, config.pin_settings()));
        if let Some(spec) = &config.stream.format {
            pin.set_format(&spec.to_media_format())?;
        }

        Ok(Self {
            pin,
            config: config.clone(),
        })
    }

    /// Build a source over whatever the platform discovers.
    pub fn discover(config: &AdapterConfig) -> Result<Self> {
        Self::new(platform::discover_devices(), config)
    }

    pub fn name(&self) -> &'static str {
        SOURCE_NAME
    }

    pub fn pin(&self) -> &Arc<CapturePin> {
        &self.pin
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// A streaming driver for the pin using the configured buffer request.
    pub fn streamer(&self, allocator: Arc<dyn Allocator>) -> Streamer {
        Streamer::new(Arc::clone(&self.pin), allocator)
            .with_buffer_request(self.config.buffer_request())
    }

    pub fn registration(&self) -> Registration {
        registration()
    }
}
