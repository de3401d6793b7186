use crate::config::{AlphaPolicy, Rgb};
use crate::frame::{Resolution, PIXEL_ON};

/// alpha given to a lit pixel, letting the backdrop through
pub const TRANSPARENT: u8 = 0;

/// The RGBA pixels behind the drawing area.
///
/// Every pixel starts out as the baseline colour and alpha. The colour never
/// changes; each render pass only touches the alpha channel.
pub struct Surface {
    resolution: Resolution,
    data: Box<[u8]>,
    baseline_alpha: u8,
    policy: AlphaPolicy,
}

impl Surface {
    pub fn new(resolution: Resolution, baseline: Rgb, baseline_alpha: u8, policy: AlphaPolicy) -> Self {
        let pixel = [baseline.0, baseline.1, baseline.2, baseline_alpha];
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(resolution.rgba_len())
            .collect();
        Surface {
            resolution,
            data,
            baseline_alpha,
            policy,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// raw RGBA bytes, row-major
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn alpha(&self, index: usize) -> u8 {
        self.data[index * 4 + 3]
    }

    /// Render one frame into the surface and return how many alpha bytes
    /// changed. Lit pixels go transparent; what happens to the rest depends on
    /// the [`AlphaPolicy`].
    pub fn apply(&mut self, frame: &[u8]) -> usize {
        // make sure we're given exactly the right amount of data to draw
        assert_eq!(
            frame.len(),
            self.resolution.pixel_count(),
            "Surface must have correct-sized frame to render"
        );

        let mut changed = 0;
        for (index, &px) in frame.iter().enumerate() {
            let target = if px == PIXEL_ON {
                TRANSPARENT
            } else {
                match self.policy {
                    AlphaPolicy::Reset => self.baseline_alpha,
                    AlphaPolicy::Trail => continue,
                }
            };
            let alpha = &mut self.data[index * 4 + 3];
            if *alpha != target {
                *alpha = target;
                changed += 1;
            }
        }
        changed
    }

    /// the colour each pixel shows once laid over `backdrop`, row-major
    pub fn composite(&self, backdrop: Rgb) -> impl Iterator<Item = Rgb> + '_ {
        self.data
            .chunks_exact(4)
            .map(move |px| Rgb(px[0], px[1], px[2]).over(backdrop, px[3]))
    }
}
