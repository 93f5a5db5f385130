//! CrabEye: a capture-device streaming adapter
//!
//! Presents a camera to a host media pipeline as a single output pin that
//! streams timestamped, uncompressed BGRA frames at a negotiated format.
//!
//! # Features
//! - Fixed catalog of six formats plus forced-format overrides
//! - Pull-model negotiation, buffer sizing and peer reconnection
//! - One producer thread per stream, blocking on the device (no drops)
//! - Blank-frame fallback when no device is present
//! - Pin category property and stream configuration queries
//!
//! # Usage
//! ```rust,no_run
//! use crabeye::{AdapterConfig, CaptureSource, ChannelSink, MemoryAllocator};
//! use std::sync::Arc;
//!
//! let config = AdapterConfig::load_or_default();
//! let source = CaptureSource::discover(&config)?;
//! let (sink, frames) = ChannelSink::bounded(4);
//! source.pin().connect(Arc::new(sink))?;
//!
//! let streamer = source.streamer(Arc::new(MemoryAllocator::new()));
//! streamer.activate()?;
//! let frame = frames.recv()?;
//! println!("{} bytes", frame.actual_len());
//! streamer.deactivate()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod allocator;
pub mod config;
pub mod errors;
pub mod format;
pub mod invariant_ppt;
pub mod pin;
pub mod platform;
pub mod sink;
pub mod source;
pub mod stream;
pub mod timing;
pub mod types;

// Testing utilities - mock device, manual clock, recording peer
pub mod testing;

// Re-exports for convenience
pub use allocator::{Allocator, MediaSample, MemoryAllocator};
pub use config::AdapterConfig;
pub use errors::{PinError, Result};
pub use pin::{
    CapabilityDescriptor, CapturePin, FrameProducer, OutputPin, PinSettings, PropertySet,
    StreamConfig, StreamState,
};
pub use platform::{DeviceHandle, DeviceTuning};
pub use sink::{ChannelSink, DownstreamPin};
pub use source::CaptureSource;
pub use stream::Streamer;
pub use timing::{ReferenceClock, ReferenceTime, SystemClock};
pub use types::{AllocatorProperties, FormatSpec, MediaFormat, PixelLayout};

/// Initialize logging with the default filter
pub fn init_logging() {
    init_logging_with_level("crabeye=info");
}

/// Initialize logging; `RUST_LOG` still wins when set
pub fn init_logging_with_level(level: &str) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", level);
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        hardware_support: cfg!(feature = "hardware"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub hardware_support: bool,
}
