//! Capture device abstraction and discovery
//!
//! The pin only ever sees `dyn DeviceHandle`. Methods take `&self` so that
//! `stop` can be issued from the control thread while the producer thread is
//! blocked inside `read_frame`; implementations synchronize internally.

#[cfg(feature = "hardware")]
pub mod nokhwa_device;

use crate::errors::Result;
use crate::types::PixelLayout;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Opaque handle to one physical capture device.
pub trait DeviceHandle: Send + Sync {
    /// Human readable device name.
    fn name(&self) -> String;

    /// Configure resolution, rate and output layout. Returns false if the
    /// device cannot run in that configuration.
    fn init(&self, width: u32, height: u32, fps: u32, layout: PixelLayout) -> bool;

    fn set_flip(&self, horizontal: bool, vertical: bool);

    fn set_autogain(&self, enabled: bool);

    fn set_auto_white_balance(&self, enabled: bool);

    fn start(&self);

    /// Stop streaming. A `read_frame` blocked on another thread returns.
    fn stop(&self);

    /// Block until the next frame is available and write it into `buffer`.
    fn read_frame(&self, buffer: &mut [u8]) -> Result<()>;
}

/// Image controls applied to the device after a successful `init`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceTuning {
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
    pub autogain: bool,
    pub auto_white_balance: bool,
}

impl Default for DeviceTuning {
    fn default() -> Self {
        Self {
            flip_horizontal: false,
            flip_vertical: true,
            autogain: true,
            auto_white_balance: true,
        }
    }
}

impl DeviceTuning {
    pub fn apply(&self, device: &dyn DeviceHandle) {
        device.set_flip(self.flip_horizontal, self.flip_vertical);
        device.set_autogain(self.autogain);
        device.set_auto_white_balance(self.auto_white_balance);
    }
}

/// Capture devices currently attached, in discovery order.
///
/// Without the `hardware` feature no devices are ever found and the adapter
/// runs in blank-frame mode.
pub fn discover_devices() -> Vec<Arc<dyn DeviceHandle>> {
    #[cfg(feature = "hardware")]
    {
        nokhwa_device::list_devices()
    }

    #[cfg(not(feature = "hardware"))]
    {
        log::info!("Built without hardware support, no capture devices available");
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockDevice;

    #[test]
    fn test_default_tuning() {
        let tuning = DeviceTuning::default();
        assert!(!tuning.flip_horizontal);
        assert!(tuning.flip_vertical);
        assert!(tuning.autogain);
        assert!(tuning.auto_white_balance);
    }

    #[test]
    fn test_tuning_applied_to_device() {
        let device = MockDevice::new();
        DeviceTuning::default().apply(&device);
        let state = device.state();
        assert_eq!(state.flip, Some((false, true)));
        assert_eq!(state.autogain, Some(true));
        assert_eq!(state.auto_white_balance, Some(true));
    }

    #[cfg(not(feature = "hardware"))]
    #[test]
    fn test_discovery_without_hardware_is_empty() {
        assert!(discover_devices().is_empty());
    }
}
