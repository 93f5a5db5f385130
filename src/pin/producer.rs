use crate::allocator::MediaSample;
use crate::assert_invariant;
use crate::errors::{PinError, Result};
use crate::platform::DeviceHandle;
use crate::timing::{FrameClock, ReferenceClock};
use crate::types::MediaFormat;
use std::sync::Arc;

/// Produces frames for one Running period of the pin.
///
/// Created by `on_start` with the format, device and clock start captured at
/// that moment; later format changes on the control path never reach it.
/// `produce_frame` takes `&mut self`, so frames are produced strictly one at
/// a time by whichever thread owns the producer.
pub struct FrameProducer {
    format: MediaFormat,
    byte_size: usize,
    device: Option<Arc<dyn DeviceHandle>>,
    clock: Option<(Arc<dyn ReferenceClock>, FrameClock)>,
    frames: u64,
}

impl FrameProducer {
    pub(crate) fn new(
        format: MediaFormat,
        device: Option<Arc<dyn DeviceHandle>>,
        clock: Option<(Arc<dyn ReferenceClock>, FrameClock)>,
    ) -> Self {
        Self {
            byte_size: format.byte_size(),
            format,
            device,
            clock,
            frames: 0,
        }
    }

    /// Format snapshot this producer was started with.
    pub fn format(&self) -> &MediaFormat {
        &self.format
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    /// Whether frames come from a device rather than the blank fallback.
    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    pub fn frame_clock(&self) -> Option<FrameClock> {
        self.clock.as_ref().map(|(_, frame_clock)| *frame_clock)
    }

    pub fn frames_produced(&self) -> u64 {
        self.frames
    }

    /// Fill `sample` with the next frame.
    ///
    /// With a device this blocks until the device has a frame; nothing is
    /// ever skipped or fabricated. Without one the frame is all zeros.
    pub fn produce_frame(&mut self, sample: &mut MediaSample) -> Result<()> {
        let size = self.byte_size;
        if size == 0 || sample.capacity() < size {
            return Err(PinError::invalid_buffer(format!(
                "sample holds {} bytes, frame needs {}",
                sample.capacity(),
                size
            )));
        }

        let buffer = &mut sample.buffer_mut()[..size];
        match &self.device {
            Some(device) => device.read_frame(buffer)?,
            None => buffer.fill(0),
        }
        sample.set_actual_len(size)?;

        match &self.clock {
            Some((clock, frame_clock)) => {
                let (start, end) = frame_clock.frame_times(clock.now());
                sample.set_times(start, end);
            }
            None => sample.clear_times(),
        }
        // uncompressed: every frame stands alone
        sample.set_sync_point(true);

        assert_invariant!(
            sample.actual_len() == self.byte_size,
            "Produced frames fill exactly one format-sized buffer",
            "pin::producer"
        );

        self.frames += 1;
        Ok(())
    }
}

impl std::fmt::Debug for FrameProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameProducer")
            .field("format", &self.format)
            .field("has_device", &self.device.is_some())
            .field("frame_clock", &self.frame_clock())
            .field("frames", &self.frames)
            .finish()
    }
}
