use thiserror::Error;

/// Result alias used across the adapter.
pub type Result<T> = std::result::Result<T, PinError>;

/// Every failure the pin reports to its callers.
///
/// None of these are fatal to the process: negotiation, sizing and property
/// errors are returned synchronously and never retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinError {
    #[error("Format rejected: {0}")]
    FormatRejected(String),
    #[error("Connected peer rejected format change")]
    PeerRejected,
    #[error("Allocator unsuitable: granted {granted} bytes per buffer, need {required}")]
    AllocatorUnsuitable { required: usize, granted: usize },
    #[error("Device initialization failed: {0}")]
    DeviceInitFailed(String),
    #[error("Invalid buffer: {0}")]
    InvalidBuffer(String),
    #[error("Property not supported in this property group")]
    PropertyUnsupported,
    #[error("Property group not supported")]
    PropertyGroupUnsupported,
    #[error("Format index {0} out of range")]
    OutOfRange(i32),
    #[error("Pin is already connected")]
    AlreadyConnected,
    #[error("Pin is not connected")]
    NotConnected,
    #[error("Pin must be stopped for this operation")]
    NotStopped,
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    #[error("Allocator error: {0}")]
    Allocator(String),
    #[error("Device error: {0}")]
    Device(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Lock poisoned by previous panic")]
    PoisonedLock,
}

impl PinError {
    pub fn format_rejected(reason: impl Into<String>) -> Self {
        Self::FormatRejected(reason.into())
    }

    pub fn invalid_buffer(reason: impl Into<String>) -> Self {
        Self::InvalidBuffer(reason.into())
    }

    pub fn device(reason: impl Into<String>) -> Self {
        Self::Device(reason.into())
    }

    /// Whether the error came from the control path (negotiation, sizing,
    /// property protocol) rather than from the device or producer thread.
    pub fn is_negotiation_error(&self) -> bool {
        matches!(
            self,
            Self::FormatRejected(_)
                | Self::PeerRejected
                | Self::AllocatorUnsuitable { .. }
                | Self::OutOfRange(_)
                | Self::PropertyUnsupported
                | Self::PropertyGroupUnsupported
        )
    }
}

impl<T> From<std::sync::PoisonError<T>> for PinError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Self::PoisonedLock
    }
}
