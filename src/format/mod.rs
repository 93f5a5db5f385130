//! Format catalog and negotiation
//!
//! The catalog is the fixed list of six advertised formats; the negotiator
//! layers an optional forced format on top of it.

pub mod catalog;
pub mod negotiator;

pub use catalog::{
    describe, is_valid, CATALOG_SIZE, MAX_FRAME_INTERVAL, MIN_FRAME_INTERVAL,
    SUPPORTED_RESOLUTIONS,
};
pub use negotiator::FormatNegotiator;
