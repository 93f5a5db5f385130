//! Pin property group: answers "what category is this pin".

use crate::errors::{PinError, Result};
use crate::pin::traits::PropertySet;
use crate::pin::CapturePin;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property group holding pin-level properties.
pub const PIN_PROPERTY_GROUP: Uuid = Uuid::from_u128(0x9b00f101_1567_11d1_b3f1_00aa003761c5);

/// Property id of the pin category within [`PIN_PROPERTY_GROUP`].
pub const PROPERTY_CATEGORY: u32 = 0;

/// Category identifier of a capture pin.
pub const PIN_CATEGORY_CAPTURE: Uuid = Uuid::from_u128(0xfb6c4281_0353_11d1_905f_0000c0cc16ba);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PinCategory {
    Capture,
}

impl PinCategory {
    pub fn id(&self) -> Uuid {
        match self {
            PinCategory::Capture => PIN_CATEGORY_CAPTURE,
        }
    }
}

/// Value carried by a property get or set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyValue {
    Category(PinCategory),
}

/// Which directions a property supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PropertySupport {
    pub get: bool,
    pub set: bool,
}

impl PropertySupport {
    pub const READ_ONLY: Self = Self {
        get: true,
        set: false,
    };
}

/// Human readable name for the property groups this adapter knows.
pub fn group_name(group: &Uuid) -> &'static str {
    if *group == PIN_PROPERTY_GROUP {
        "pin"
    } else {
        "unknown"
    }
}

impl PropertySet for CapturePin {
    fn get(&self, group: &Uuid, property: u32) -> Result<PropertyValue> {
        if *group != PIN_PROPERTY_GROUP {
            return Err(PinError::PropertyGroupUnsupported);
        }
        match property {
            PROPERTY_CATEGORY => Ok(PropertyValue::Category(PinCategory::Capture)),
            _ => Err(PinError::PropertyUnsupported),
        }
    }

    // read-only group
    fn set(&self, group: &Uuid, _property: u32, _value: &PropertyValue) -> Result<()> {
        if *group == PIN_PROPERTY_GROUP {
            Err(PinError::PropertyUnsupported)
        } else {
            Err(PinError::PropertyGroupUnsupported)
        }
    }

    fn query_supported(&self, group: &Uuid, property: u32) -> Result<PropertySupport> {
        if *group != PIN_PROPERTY_GROUP {
            return Err(PinError::PropertyGroupUnsupported);
        }
        match property {
            PROPERTY_CATEGORY => Ok(PropertySupport::READ_ONLY),
            _ => Err(PinError::PropertyUnsupported),
        }
    }
}
