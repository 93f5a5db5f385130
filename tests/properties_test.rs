//! Pin category property protocol

use crabeye::pin::properties::{
    PinCategory, PropertySupport, PropertyValue, PIN_CATEGORY_CAPTURE, PIN_PROPERTY_GROUP,
    PROPERTY_CATEGORY,
};
use crabeye::{CapturePin, PinError, PropertySet};
use uuid::Uuid;

#[test]
fn test_category_reads_capture() {
    let pin = CapturePin::deviceless();
    assert_eq!(
        pin.get(&PIN_PROPERTY_GROUP, PROPERTY_CATEGORY),
        Ok(PropertyValue::Category(PinCategory::Capture))
    );
    assert_eq!(PinCategory::Capture.id(), PIN_CATEGORY_CAPTURE);
}

#[test]
fn test_query_supported_is_read_only() {
    let pin = CapturePin::deviceless();
    assert_eq!(
        pin.query_supported(&PIN_PROPERTY_GROUP, PROPERTY_CATEGORY),
        Ok(PropertySupport {
            get: true,
            set: false
        })
    );
}

#[test]
fn test_other_properties_unsupported() {
    let pin = CapturePin::deviceless();
    for property in [1, 2, 42, u32::MAX] {
        assert_eq!(
            pin.get(&PIN_PROPERTY_GROUP, property),
            Err(PinError::PropertyUnsupported)
        );
        assert_eq!(
            pin.query_supported(&PIN_PROPERTY_GROUP, property),
            Err(PinError::PropertyUnsupported)
        );
    }
}

#[test]
fn test_other_groups_unsupported() {
    let pin = CapturePin::deviceless();
    let group = Uuid::from_u128(0x1234);
    assert_eq!(
        pin.get(&group, PROPERTY_CATEGORY),
        Err(PinError::PropertyGroupUnsupported)
    );
    assert_eq!(
        pin.query_supported(&group, PROPERTY_CATEGORY),
        Err(PinError::PropertyGroupUnsupported)
    );
    assert_eq!(
        pin.set(&group, 0, &PropertyValue::Category(PinCategory::Capture)),
        Err(PinError::PropertyGroupUnsupported)
    );
}

#[test]
fn test_set_never_succeeds() {
    let pin = CapturePin::deviceless();
    let value = PropertyValue::Category(PinCategory::Capture);
    assert!(pin.set(&PIN_PROPERTY_GROUP, PROPERTY_CATEGORY, &value).is_err());
    assert_eq!(
        pin.get(&PIN_PROPERTY_GROUP, PROPERTY_CATEGORY),
        Ok(PropertyValue::Category(PinCategory::Capture))
    );
}
