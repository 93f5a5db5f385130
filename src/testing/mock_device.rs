//! Scriptable capture device for tests without hardware.

use crate::errors::{PinError, Result};
use crate::platform::DeviceHandle;
use crate::testing::synthetic_data::fill_synthetic_bgra;
use crate::types::PixelLayout;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Everything the mock has been told so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockDeviceState {
    pub init_calls: Vec<(u32, u32, u32, PixelLayout)>,
    pub flip: Option<(bool, bool)>,
    pub autogain: Option<bool>,
    pub auto_white_balance: Option<bool>,
    pub streaming: bool,
    pub start_count: u32,
    pub stop_count: u32,
    pub frames_read: u64,
}

struct Inner {
    state: MockDeviceState,
    geometry: Option<(u32, u32)>,
    credits: u64,
}

/// In-memory [`DeviceHandle`] producing synthetic BGRA frames.
///
/// In gated mode `read_frame` blocks until [`MockDevice::release_frames`]
/// grants a frame or the device is stopped, which models a camera that has
/// not delivered its next frame yet.
pub struct MockDevice {
    name: String,
    fail_init: bool,
    gated: bool,
    frame_delay: Option<Duration>,
    inner: Mutex<Inner>,
    cv: Condvar,
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice {
    pub fn new() -> Self {
        Self {
            name: "Mock Camera".to_string(),
            fail_init: false,
            gated: false,
            frame_delay: None,
            inner: Mutex::new(Inner {
                state: MockDeviceState::default(),
                geometry: None,
                credits: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Every `init` call reports failure.
    pub fn failing_init(mut self) -> Self {
        self.fail_init = true;
        self
    }

    /// Reads block until frames are released.
    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Sleep before each frame, like a camera running at a fixed rate.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = Some(delay);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Allow `count` more reads to complete in gated mode.
    pub fn release_frames(&self, count: u64) {
        if let Ok(mut g) = self.inner.lock() {
            g.credits = g.credits.saturating_add(count);
            self.cv.notify_all();
        }
    }

    pub fn state(&self) -> MockDeviceState {
        self.inner
            .lock()
            .map(|g| g.state.clone())
            .unwrap_or_default()
    }
}

impl DeviceHandle for MockDevice {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn init(&self, width: u32, height: u32, fps: u32, layout: PixelLayout) -> bool {
        let Ok(mut g) = self.inner.lock() else {
            return false;
        };
        g.state.init_calls.push((width, height, fps, layout));
        if self.fail_init || layout != PixelLayout::Bgra32 {
            return false;
        }
        g.geometry = Some((width, height));
        true
    }

    fn set_flip(&self, horizontal: bool, vertical: bool) {
        if let Ok(mut g) = self.inner.lock() {
            g.state.flip = Some((horizontal, vertical));
        }
    }

    fn set_autogain(&self, enabled: bool) {
        if let Ok(mut g) = self.inner.lock() {
            g.state.autogain = Some(enabled);
        }
    }

    fn set_auto_white_balance(&self, enabled: bool) {
        if let Ok(mut g) = self.inner.lock() {
            g.state.auto_white_balance = Some(enabled);
        }
    }

    fn start(&self) {
        if let Ok(mut g) = self.inner.lock() {
            g.state.streaming = true;
            g.state.start_count += 1;
        }
    }

    fn stop(&self) {
        if let Ok(mut g) = self.inner.lock() {
            g.state.streaming = false;
            g.state.stop_count += 1;
            self.cv.notify_all();
        }
    }

    fn read_frame(&self, buffer: &mut [u8]) -> Result<()> {
        let (frame_number, width, height) = {
            let mut g = self.inner.lock()?;
            if self.gated {
                while g.state.streaming && g.credits == 0 {
                    g = self.cv.wait(g)?;
                }
                g.credits = g.credits.saturating_sub(1);
            }
            if !g.state.streaming {
                return Err(PinError::device("mock device is not streaming"));
            }
            let (width, height) = g
                .geometry
                .ok_or_else(|| PinError::device("mock device not initialized"))?;
            let needed = width as usize * height as usize * 4;
            if buffer.len() < needed {
                return Err(PinError::invalid_buffer(format!(
                    "{} bytes offered, frame needs {}",
                    buffer.len(),
                    needed
                )));
            }
            g.state.frames_read += 1;
            (g.state.frames_read, width, height)
        };

        if let Some(delay) = self.frame_delay {
            std::thread::sleep(delay);
        }
        fill_synthetic_bgra(buffer, frame_number, width, height);
        Ok(())
    }
}
