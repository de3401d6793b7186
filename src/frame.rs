use thiserror::Error;

/// width of a CHIP-8 frame, in pixels
pub const FRAME_WIDTH: usize = 64;
/// height of a CHIP-8 frame, in pixels
pub const FRAME_HEIGHT: usize = 32;
/// one byte per pixel, row-major
pub const FRAME_LEN: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// a frame byte with this value is lit; everything else is dark
pub const PIXEL_ON: u8 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame buffer at {offset:#x} (+{len} bytes) lies outside {memory_len} bytes of linear memory")]
    OutOfBounds {
        offset: usize,
        len: usize,
        memory_len: usize,
    },
}

// store useful metadata about the drawing area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

impl Resolution {
    pub const CHIP8: Resolution = Resolution {
        width: FRAME_WIDTH,
        height: FRAME_HEIGHT,
    };

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    /// size of an RGBA buffer covering every pixel
    pub fn rgba_len(&self) -> usize {
        self.pixel_count() * 4
    }

    pub fn x_bounds(&self) -> [f64; 2] {
        [0.0, (self.width - 1) as f64]
    }

    pub fn y_bounds(&self) -> [f64; 2] {
        [-1.0 * (self.height - 1) as f64, 0.0]
    }

    /// canvas coordinates for a row-major pixel index; y grows downward so
    /// row 0 sits at the top of the canvas
    pub fn point(&self, index: usize) -> (f64, f64) {
        (
            (index % self.width) as f64,        // x
            -1.0 * (index / self.width) as f64, // y
        )
    }
}

/// A window onto a frame buffer that lives in somebody else's memory.
///
/// The view never holds a pointer: it remembers where the frame is and
/// borrows the bytes again on every [`FrameView::read`]. It also remembers how
/// big the memory was when the offset was handed out. If the memory has grown
/// (or shrunk) since, the offset may no longer mean what it did, and the owner
/// must ask the module for a fresh one before reading; see
/// [`FrameView::is_stale`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameView {
    offset: usize,
    len: usize,
    memory_len: usize,
}

impl FrameView {
    pub fn new(offset: usize, len: usize, memory: &[u8]) -> Result<FrameView, FrameError> {
        let view = FrameView {
            offset,
            len,
            memory_len: memory.len(),
        };
        view.bounds(memory)?;
        Ok(view)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// true if the memory has changed size since the view was acquired
    pub fn is_stale(&self, memory: &[u8]) -> bool {
        memory.len() != self.memory_len
    }

    /// borrow the frame bytes out of `memory`
    pub fn read<'m>(&self, memory: &'m [u8]) -> Result<&'m [u8], FrameError> {
        let range = self.bounds(memory)?;
        Ok(&memory[range])
    }

    fn bounds(&self, memory: &[u8]) -> Result<std::ops::Range<usize>, FrameError> {
        let out_of_bounds = || FrameError::OutOfBounds {
            offset: self.offset,
            len: self.len,
            memory_len: memory.len(),
        };
        let end = self.offset.checked_add(self.len).ok_or_else(out_of_bounds)?;
        if end > memory.len() {
            return Err(out_of_bounds());
        }
        Ok(self.offset..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Resolution tests
    #[test]
    fn test_pixel_count() {
        let r = Resolution::CHIP8;
        assert_eq!(r.pixel_count(), 2048)
    }

    #[test]
    fn test_rgba_len() {
        let r = Resolution::CHIP8;
        assert_eq!(r.rgba_len(), 8192)
    }

    #[test]
    fn test_x_bounds() {
        assert_eq!(Resolution::CHIP8.x_bounds(), [0.0, 63.0]);
    }

    #[test]
    fn test_y_bounds() {
        assert_eq!(Resolution::CHIP8.y_bounds(), [-31.0, 0.0]);
    }

    #[test]
    fn test_point_is_row_major() {
        let r = Resolution::CHIP8;
        assert_eq!(r.point(0), (0.0, 0.0));
        assert_eq!(r.point(63), (63.0, 0.0));
        assert_eq!(r.point(64), (0.0, -1.0));
        assert_eq!(r.point(2047), (63.0, -31.0));
    }

    // FrameView tests
    #[test]
    fn test_view_reads_window() -> Result<(), FrameError> {
        let mut memory = vec![0u8; 4096];
        memory[100..100 + FRAME_LEN].fill(1);
        let view = FrameView::new(100, FRAME_LEN, &memory)?;
        assert_eq!(view.offset(), 100);
        let frame = view.read(&memory)?;
        assert_eq!(frame.len(), FRAME_LEN);
        assert!(frame.iter().all(|&b| b == 1));
        Ok(())
    }

    #[test]
    fn test_view_sees_live_memory() -> Result<(), FrameError> {
        let mut memory = vec![0u8; FRAME_LEN];
        let view = FrameView::new(0, FRAME_LEN, &memory)?;
        memory[7] = 1;
        assert_eq!(view.read(&memory)?[7], 1);
        Ok(())
    }

    #[test]
    fn test_view_rejects_out_of_bounds() {
        let memory = vec![0u8; 4096];
        assert_eq!(
            FrameView::new(4000, FRAME_LEN, &memory),
            Err(FrameError::OutOfBounds {
                offset: 4000,
                len: FRAME_LEN,
                memory_len: 4096,
            })
        );
    }

    #[test]
    fn test_view_rejects_overflowing_offset() {
        let memory = vec![0u8; 16];
        assert!(FrameView::new(usize::MAX, 2, &memory).is_err());
    }

    #[test]
    fn test_view_exactly_fills_memory() {
        let memory = vec![0u8; FRAME_LEN];
        assert!(FrameView::new(0, FRAME_LEN, &memory).is_ok());
        assert!(FrameView::new(1, FRAME_LEN, &memory).is_err());
    }

    #[test]
    fn test_view_goes_stale_on_resize() -> Result<(), FrameError> {
        let mut memory = vec![0u8; 4096];
        let view = FrameView::new(0, FRAME_LEN, &memory)?;
        assert!(!view.is_stale(&memory));
        memory.resize(8192, 0);
        assert!(view.is_stale(&memory));
        Ok(())
    }

    #[test]
    fn test_read_rechecks_bounds_after_shrink() -> Result<(), FrameError> {
        let mut memory = vec![0u8; 4096];
        let view = FrameView::new(1024, FRAME_LEN, &memory)?;
        memory.truncate(2048);
        assert!(view.read(&memory).is_err());
        Ok(())
    }
}
