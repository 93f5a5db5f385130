//! Fuzz-style tests using proptest
//!
//! Run with: cargo test --test fuzz_tests

use crabeye::format::{catalog, is_valid};
use crabeye::timing::FrameClock;
use crabeye::types::{Compression, MajorType, MediaFormat, PixelLayout};
use crabeye::{CapturePin, FormatSpec, OutputPin, StreamConfig};
use proptest::prelude::*;

fn layout() -> impl Strategy<Value = PixelLayout> {
    prop_oneof![
        Just(PixelLayout::Bgra32),
        Just(PixelLayout::Rgb24),
        Just(PixelLayout::Yuy2),
        Just(PixelLayout::Mjpeg),
    ]
}

fn compression() -> impl Strategy<Value = Compression> {
    prop_oneof![
        Just(Compression::Rgb),
        Just(Compression::Bitfields),
        any::<[u8; 4]>().prop_map(Compression::FourCc),
    ]
}

prop_compose! {
    fn any_format()(
        layout in layout(),
        width in prop_oneof![Just(640), Just(320), -1000i32..4000],
        height in prop_oneof![Just(480), Just(240), -1000i32..4000],
        bit_count in prop_oneof![Just(32u16), any::<u16>()],
        compression in compression(),
        planes in prop_oneof![Just(1u16), any::<u16>()],
        frame_interval in prop_oneof![100_000i64..6_000_000, any::<i64>()],
    ) -> MediaFormat {
        MediaFormat {
            major_type: MajorType::Video,
            layout,
            width,
            height,
            bit_count,
            compression,
            planes,
            frame_interval,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// The predicate is exactly the documented conjunction.
    #[test]
    fn predicate_matches_definition(format in any_format()) {
        let expected = format.layout == PixelLayout::Bgra32
            && catalog::SUPPORTED_RESOLUTIONS.contains(&(format.width, format.height))
            && format.bit_count == 32
            && format.compression == Compression::Rgb
            && format.planes == 1
            && (10_000_000 / 70..=10_000_000 / 2).contains(&format.frame_interval);
        prop_assert_eq!(is_valid(&format), expected);
    }

    /// check_format never panics and agrees with the predicate.
    #[test]
    fn check_format_agrees_with_predicate(format in any_format()) {
        let pin = CapturePin::deviceless();
        prop_assert_eq!(pin.check_format(&format).is_ok(), is_valid(&format));
    }

    /// Any accepted format can be forced and read back.
    #[test]
    fn forced_valid_formats_read_back(
        large in any::<bool>(),
        interval in (10_000_000i64 / 70)..=(10_000_000i64 / 2),
    ) {
        let (width, height) = if large { (640, 480) } else { (320, 240) };
        let format = MediaFormat::bgra32(width, height, 30).with_frame_interval(interval);
        let pin = CapturePin::deviceless();
        pin.set_format(&format).unwrap();
        prop_assert_eq!(pin.get_format().unwrap(), format);
    }

    /// Every frame spans exactly one interval and starts one interval
    /// before its delivery offset.
    #[test]
    fn frame_times_span_one_interval(
        start in -1_000_000_000_000i64..1_000_000_000_000,
        elapsed in 0i64..1_000_000_000_000,
        interval in (10_000_000i64 / 70)..=(10_000_000i64 / 2),
    ) {
        let clock = FrameClock::new(start, interval);
        let (frame_start, frame_end) = clock.frame_times(start + elapsed);
        prop_assert_eq!(frame_end - frame_start, interval);
        prop_assert_eq!(frame_start, elapsed - interval);
    }

    /// Format specs print and parse back to the same value.
    #[test]
    fn format_spec_text_is_stable(width in 1u32..10_000, height in 1u32..10_000, fps in 1u32..1000) {
        let spec = FormatSpec::new(width, height, fps);
        prop_assert_eq!(spec.to_string().parse::<FormatSpec>(), Ok(spec));
    }

    /// Arbitrary text never panics the parser.
    #[test]
    fn format_spec_parser_never_panics(text in ".{0,32}") {
        let _ = text.parse::<FormatSpec>();
    }
}
