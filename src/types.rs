use crate::timing::{fps_for_interval, interval_for_fps, ReferenceTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Major media type of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MajorType {
    Video,
    Audio,
    Other,
}

/// Pixel layout of an uncompressed or compressed video frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelLayout {
    /// 32-bit packed B, G, R, A. The only layout this adapter emits.
    Bgra32,
    Rgb24,
    Yuy2,
    Mjpeg,
}

impl PixelLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            PixelLayout::Bgra32 => "BGRA32",
            PixelLayout::Rgb24 => "RGB24",
            PixelLayout::Yuy2 => "YUY2",
            PixelLayout::Mjpeg => "MJPEG",
        }
    }
}

/// Bitmap compression of a video format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compression {
    /// Uncompressed RGB.
    Rgb,
    Bitfields,
    FourCc([u8; 4]),
}

/// A concrete media format, either proposed by a peer or negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaFormat {
    pub major_type: MajorType,
    pub layout: PixelLayout,
    pub width: i32,
    pub height: i32,
    pub bit_count: u16,
    pub compression: Compression,
    pub planes: u16,
    /// Average time per frame in 100 ns units.
    pub frame_interval: ReferenceTime,
}

impl MediaFormat {
    /// An uncompressed BGRA 32-bit video format at an integer frame rate.
    pub fn bgra32(width: i32, height: i32, fps: u32) -> Self {
        Self {
            major_type: MajorType::Video,
            layout: PixelLayout::Bgra32,
            width,
            height,
            bit_count: 32,
            compression: Compression::Rgb,
            planes: 1,
            frame_interval: interval_for_fps(fps),
        }
    }

    pub fn with_frame_interval(mut self, frame_interval: ReferenceTime) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    /// Bytes needed for one frame in this format.
    pub fn byte_size(&self) -> usize {
        let pixels = u64::from(self.width.unsigned_abs()) * u64::from(self.height.unsigned_abs());
        let bytes = pixels * u64::from(self.bit_count) / 8;
        usize::try_from(bytes).unwrap_or(usize::MAX)
    }

    /// Integer frame rate derived from the frame interval.
    pub fn fps(&self) -> u32 {
        fps_for_interval(self.frame_interval)
    }

    pub fn resolution(&self) -> (i32, i32) {
        (self.width, self.height)
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}@{} {}",
            self.width,
            self.height,
            self.fps(),
            self.layout.as_str()
        )
    }
}

/// Textual `WIDTHxHEIGHT@FPS` description of a BGRA format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormatSpec {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl FormatSpec {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self { width, height, fps }
    }

    pub fn to_media_format(&self) -> MediaFormat {
        let width = i32::try_from(self.width).unwrap_or(i32::MAX);
        let height = i32::try_from(self.height).unwrap_or(i32::MAX);
        MediaFormat::bgra32(width, height, self.fps)
    }
}

impl FromStr for FormatSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (size, fps) = s
            .trim()
            .split_once('@')
            .ok_or_else(|| format!("expected WIDTHxHEIGHT@FPS, got '{s}'"))?;
        let (width, height) = size
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{size}'"))?;

        let parse = |field: &str, what: &str| -> Result<u32, String> {
            field
                .trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid {what} '{field}': {e}"))
        };

        let fps = parse(fps, "frame rate")?;
        if fps == 0 {
            return Err("frame rate must be positive".to_string());
        }

        Ok(Self {
            width: parse(width, "width")?,
            height: parse(height, "height")?,
            fps,
        })
    }
}

impl TryFrom<String> for FormatSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FormatSpec> for String {
    fn from(spec: FormatSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}@{}", self.width, self.height, self.fps)
    }
}

/// Buffer pool request or grant exchanged with an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AllocatorProperties {
    pub buffer_count: u32,
    pub buffer_size: usize,
    pub alignment: usize,
    pub prefix: usize,
}

impl AllocatorProperties {
    pub fn new(buffer_count: u32, buffer_size: usize) -> Self {
        Self {
            buffer_count,
            buffer_size,
            alignment: 1,
            prefix: 0,
        }
    }
}
