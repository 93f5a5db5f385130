//! Pull-model format negotiation state.
//!
//! The negotiator itself is plain data; the pin keeps it behind its state
//! lock and drives peer notification around it.

use crate::errors::{PinError, Result};
use crate::format::catalog;
use crate::types::MediaFormat;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatNegotiator {
    forced: Option<MediaFormat>,
}

impl FormatNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format offered at `index`.
    ///
    /// Once a format has been forced it is the only one offered.
    pub fn enumerate(&self, index: i32) -> Result<MediaFormat> {
        match &self.forced {
            Some(forced) if index == 0 => Ok(forced.clone()),
            Some(_) => Err(PinError::OutOfRange(index)),
            None => catalog::describe(index),
        }
    }

    /// Number of formats `enumerate` will currently answer.
    pub fn offered_count(&self) -> i32 {
        if self.forced.is_some() {
            1
        } else {
            catalog::CATALOG_SIZE
        }
    }

    pub fn validate(&self, candidate: &MediaFormat) -> Result<()> {
        catalog::check(candidate)
    }

    /// Forced format if set, else the first catalog entry.
    pub fn current_format(&self) -> MediaFormat {
        match &self.forced {
            Some(forced) => forced.clone(),
            None => catalog::describe(0).unwrap_or_else(|_| MediaFormat::bgra32(640, 480, 30)),
        }
    }

    pub fn forced_format(&self) -> Option<&MediaFormat> {
        self.forced.as_ref()
    }

    /// Replace the forced format. It is never cleared afterwards.
    pub(crate) fn force(&mut self, format: MediaFormat) {
        self.forced = Some(format);
    }
}
