//! The fixed catalog of advertised formats and the validity predicate.
//!
//! The predicate is wider than the catalog: the catalog only advertises
//! 30, 60 and 15 fps, while a forced format may use any rate in [2, 70].

use crate::assert_invariant;
use crate::errors::{PinError, Result};
use crate::timing::{ReferenceTime, UNITS_PER_SECOND};
use crate::types::{Compression, MajorType, MediaFormat, PixelLayout};

/// Number of advertised formats.
pub const CATALOG_SIZE: i32 = 6;

/// Resolutions the device can deliver.
pub const SUPPORTED_RESOLUTIONS: [(i32, i32); 2] = [(640, 480), (320, 240)];

/// Shortest accepted frame interval (70 fps).
pub const MIN_FRAME_INTERVAL: ReferenceTime = UNITS_PER_SECOND / 70;

/// Longest accepted frame interval (2 fps).
pub const MAX_FRAME_INTERVAL: ReferenceTime = UNITS_PER_SECOND / 2;

/// Why a candidate failed the validity predicate, if it did.
pub fn rejection_reason(candidate: &MediaFormat) -> Option<String> {
    if candidate.major_type != MajorType::Video {
        return Some(format!("major type {:?} is not video", candidate.major_type));
    }
    if candidate.layout != PixelLayout::Bgra32 {
        return Some(format!("pixel layout {} is not BGRA32", candidate.layout.as_str()));
    }
    if !SUPPORTED_RESOLUTIONS.contains(&candidate.resolution()) {
        return Some(format!(
            "resolution {}x{} is not supported",
            candidate.width, candidate.height
        ));
    }
    if candidate.bit_count != 32 {
        return Some(format!("bit count {} is not 32", candidate.bit_count));
    }
    if candidate.compression != Compression::Rgb {
        return Some(format!("compression {:?} is not uncompressed RGB", candidate.compression));
    }
    if candidate.planes != 1 {
        return Some(format!("plane count {} is not 1", candidate.planes));
    }
    if !(MIN_FRAME_INTERVAL..=MAX_FRAME_INTERVAL).contains(&candidate.frame_interval) {
        return Some(format!(
            "frame interval {} outside [{}, {}]",
            candidate.frame_interval, MIN_FRAME_INTERVAL, MAX_FRAME_INTERVAL
        ));
    }
    None
}

/// The sole gate for any externally proposed format.
pub fn is_valid(candidate: &MediaFormat) -> bool {
    rejection_reason(candidate).is_none()
}

/// Like [`is_valid`], but reports the reason as a `FormatRejected` error.
pub fn check(candidate: &MediaFormat) -> Result<()> {
    match rejection_reason(candidate) {
        Some(reason) => Err(PinError::FormatRejected(reason)),
        None => Ok(()),
    }
}

/// Frame rate advertised at a catalog index.
///
/// The mapping is not monotonic (30, 60, 15 per resolution); consumers may
/// depend on the index-to-rate assignment, so it stays as is.
fn catalog_fps(index: i32) -> u32 {
    if index < 3 {
        if index == 2 {
            15
        } else {
            30 * (index as u32 + 1)
        }
    } else if index == 5 {
        15
    } else {
        30 * (index as u32 - 2)
    }
}

/// Catalog entry at `index`.
pub fn describe(index: i32) -> Result<MediaFormat> {
    if !(0..CATALOG_SIZE).contains(&index) {
        return Err(PinError::OutOfRange(index));
    }

    let (width, height) = SUPPORTED_RESOLUTIONS[(index / 3) as usize];
    let entry = MediaFormat::bgra32(width, height, catalog_fps(index));

    assert_invariant!(
        is_valid(&entry),
        "Catalog entries satisfy the validity predicate",
        "format::catalog"
    );
    Ok(entry)
}

/// All catalog entries in index order.
pub fn entries() -> Vec<MediaFormat> {
    (0..CATALOG_SIZE).filter_map(|index| describe(index).ok()).collect()
}
