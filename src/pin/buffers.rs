//! Sample pool sizing.

use crate::allocator::Allocator;
use crate::errors::{PinError, Result};
use crate::types::{AllocatorProperties, MediaFormat};

/// Buffer count used when the downstream request leaves it at zero.
pub const DEFAULT_BUFFER_COUNT: u32 = 2;

/// What the pin asks the allocator for, given the downstream request.
pub fn required_properties(
    format: &MediaFormat,
    request: AllocatorProperties,
) -> AllocatorProperties {
    let buffer_count = if request.buffer_count == 0 {
        DEFAULT_BUFFER_COUNT
    } else {
        request.buffer_count
    };
    AllocatorProperties {
        buffer_count,
        buffer_size: format.byte_size(),
        ..request
    }
}

/// Request a pool that can hold one frame of `format` per buffer.
///
/// The grant may differ from the request; only a grant whose buffers are
/// too small for a frame is refused.
pub fn negotiate(
    format: &MediaFormat,
    allocator: &dyn Allocator,
    request: AllocatorProperties,
) -> Result<AllocatorProperties> {
    let wanted = required_properties(format, request);
    let granted = allocator.set_properties(&wanted)?;
    if granted.buffer_size < wanted.buffer_size {
        log::warn!(
            "Allocator granted {} byte buffers, {} needs {}",
            granted.buffer_size,
            format,
            wanted.buffer_size
        );
        return Err(PinError::AllocatorUnsuitable {
            required: wanted.buffer_size,
            granted: granted.buffer_size,
        });
    }
    log::debug!(
        "Sample pool: {} x {} bytes for {}",
        granted.buffer_count,
        granted.buffer_size,
        format
    );
    Ok(granted)
}
