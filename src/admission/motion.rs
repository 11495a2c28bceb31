//! Cheap brightness-based motion proxy.

/// Borrowed view of a camera frame's luma plane.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    /// Monotonic frame counter, starting at 1.
    pub counter: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes per row of `luma`.
    pub stride: usize,
    /// 8-bit luma (Y) plane.
    pub luma: &'a [u8],
}

impl<'a> FrameView<'a> {
    /// A tightly packed luma plane (`stride == width`).
    pub fn packed(counter: u64, width: u32, height: u32, luma: &'a [u8]) -> Self {
        Self {
            counter,
            width,
            height,
            stride: width as usize,
            luma,
        }
    }
}

/// Mean luma over a fixed `grid x grid` sample of the frame.
///
/// Returns `None` for malformed frames (empty, or buffer shorter than
/// the declared geometry); callers treat that as motion.
pub fn luma_proxy(frame: &FrameView<'_>, grid: usize) -> Option<f32> {
    let width = frame.width as usize;
    let height = frame.height as usize;
    if width == 0 || height == 0 || grid == 0 || frame.stride < width {
        return None;
    }
    let required = frame.stride.checked_mul(height - 1)?.checked_add(width)?;
    if frame.luma.len() < required {
        return None;
    }

    let mut sum: u64 = 0;
    let mut count: u64 = 0;
    for gy in 0..grid {
        let y = (gy * 2 + 1) * height / (grid * 2);
        for gx in 0..grid {
            let x = (gx * 2 + 1) * width / (grid * 2);
            sum += u64::from(frame.luma[y * frame.stride + x]);
            count += 1;
        }
    }
    Some(sum as f32 / count as f32)
}
