use crate::errors::Result;
use crate::format::catalog;
use crate::pin::traits::StreamConfig;
use crate::pin::CapturePin;
use crate::timing::{ReferenceTime, UNITS_PER_SECOND};
use crate::types::{MajorType, MediaFormat};
use serde::{Deserialize, Serialize};

/// Fastest frame interval a capability advertises.
pub const CAPABILITY_MIN_FRAME_INTERVAL: ReferenceTime = UNITS_PER_SECOND / 60;
/// Slowest frame interval a capability advertises.
pub const CAPABILITY_MAX_FRAME_INTERVAL: ReferenceTime = UNITS_PER_SECOND / 2;
/// Crop and output granularity and alignment, in pixels.
pub const GRANULARITY: i32 = 4;
/// Upper bit rate bound; effectively unconstrained.
pub const MAX_BITS_PER_SECOND: u64 = 1_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// What a controller may pick for one catalog entry.
///
/// Cropping and scaling are unsupported, so every size equals the native
/// resolution of the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub major_type: MajorType,
    pub input_size: Size,
    pub min_cropping: Size,
    pub max_cropping: Size,
    pub crop_granularity_x: i32,
    pub crop_granularity_y: i32,
    pub crop_align_x: i32,
    pub crop_align_y: i32,
    pub min_output: Size,
    pub max_output: Size,
    pub output_granularity_x: i32,
    pub output_granularity_y: i32,
    pub stretch_taps_x: i32,
    pub stretch_taps_y: i32,
    pub shrink_taps_x: i32,
    pub shrink_taps_y: i32,
    pub min_frame_interval: ReferenceTime,
    pub max_frame_interval: ReferenceTime,
    pub min_bits_per_second: u64,
    pub max_bits_per_second: u64,
}

impl CapabilityDescriptor {
    pub fn for_format(format: &MediaFormat) -> Self {
        let native = Size::new(format.width, format.height);
        Self {
            major_type: MajorType::Video,
            input_size: native,
            min_cropping: native,
            max_cropping: native,
            crop_granularity_x: GRANULARITY,
            crop_granularity_y: GRANULARITY,
            crop_align_x: GRANULARITY,
            crop_align_y: GRANULARITY,
            min_output: native,
            max_output: native,
            output_granularity_x: GRANULARITY,
            output_granularity_y: GRANULARITY,
            stretch_taps_x: 0,
            stretch_taps_y: 0,
            shrink_taps_x: 0,
            shrink_taps_y: 0,
            min_frame_interval: CAPABILITY_MIN_FRAME_INTERVAL,
            max_frame_interval: CAPABILITY_MAX_FRAME_INTERVAL,
            min_bits_per_second: 0,
            max_bits_per_second: MAX_BITS_PER_SECOND,
        }
    }
}

impl StreamConfig for CapturePin {
    fn get_format(&self) -> Result<MediaFormat> {
        Ok(self.shared.lock()?.negotiator.current_format())
    }

    fn set_format(&self, candidate: &MediaFormat) -> Result<()> {
        self.force_format(candidate)
    }

    fn capability_count(&self) -> (i32, usize) {
        (
            catalog::CATALOG_SIZE,
            std::mem::size_of::<CapabilityDescriptor>(),
        )
    }

    fn capability_at(&self, index: i32) -> Result<(MediaFormat, CapabilityDescriptor)> {
        let format = catalog::describe(index)?;
        let descriptor = CapabilityDescriptor::for_format(&format);
        Ok((format, descriptor))
    }
}
