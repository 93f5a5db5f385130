//! The three narrow contracts a capture pin exposes.

use crate::allocator::Allocator;
use crate::errors::Result;
use crate::pin::producer::FrameProducer;
use crate::pin::properties::{PropertySupport, PropertyValue};
use crate::pin::stream_config::CapabilityDescriptor;
use crate::types::{AllocatorProperties, MediaFormat};
use uuid::Uuid;

/// Host pipeline pull protocol.
pub trait OutputPin {
    /// Accept or reject a proposed format.
    fn check_format(&self, candidate: &MediaFormat) -> Result<()>;

    /// Format offered at `index`; `OutOfRange` past the last offer.
    fn enumerate_format(&self, index: i32) -> Result<MediaFormat>;

    /// Size the sample pool for the negotiated format.
    fn decide_buffer_size(
        &self,
        allocator: &dyn Allocator,
        request: AllocatorProperties,
    ) -> Result<AllocatorProperties>;

    /// Stopped -> Running. The returned producer owns the start-time
    /// snapshot and is driven by the single producer thread.
    fn on_start(&self) -> Result<FrameProducer>;

    /// Running -> Stopped. Best effort; always succeeds.
    fn on_stop(&self) -> Result<()>;
}

/// Get/set/query protocol over property groups.
pub trait PropertySet {
    fn get(&self, group: &Uuid, property: u32) -> Result<PropertyValue>;

    fn set(&self, group: &Uuid, property: u32, value: &PropertyValue) -> Result<()>;

    fn query_supported(&self, group: &Uuid, property: u32) -> Result<PropertySupport>;
}

/// Stream configuration surface used by controllers to pick a format.
pub trait StreamConfig {
    fn get_format(&self) -> Result<MediaFormat>;

    fn set_format(&self, candidate: &MediaFormat) -> Result<()>;

    /// Number of capabilities and the size of one descriptor.
    fn capability_count(&self) -> (i32, usize);

    fn capability_at(&self, index: i32) -> Result<(MediaFormat, CapabilityDescriptor)>;
}
