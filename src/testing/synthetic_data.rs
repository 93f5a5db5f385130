//! Synthetic BGRA frames for offline testing
//!
//! Frames carry a gradient that shifts with the frame number, with alpha
//! forced opaque, so a synthetic frame is never mistaken for the all-zero
//! placeholder the pin emits without a device.

/// Write a synthetic BGRA frame into `buffer`.
///
/// Only the first `width * height * 4` bytes are touched.
pub fn fill_synthetic_bgra(buffer: &mut [u8], frame_number: u64, width: u32, height: u32) {
    let base = (frame_number % 256) as u8;
    let width = width as usize;
    let stride = width * 4;

    for (y, row) in buffer
        .chunks_exact_mut(stride)
        .take(height as usize)
        .enumerate()
    {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            px[0] = base.wrapping_add(((x + y) % 256) as u8); // B
            px[1] = base.wrapping_add((y % 256) as u8); // G
            px[2] = base.wrapping_add((x % 256) as u8); // R
            px[3] = 0xFF; // A
        }
    }
}

/// A freshly allocated synthetic BGRA frame.
pub fn synthetic_bgra_frame(frame_number: u64, width: u32, height: u32) -> Vec<u8> {
    let mut data = vec![0u8; width as usize * height as usize * 4];
    fill_synthetic_bgra(&mut data, frame_number, width, height);
    data
}
