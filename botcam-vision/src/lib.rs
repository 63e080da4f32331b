/*!
Frame analysis for line-following and color-sensing robot behaviors.

The analyzer consumes frames decoded by [`botcam_jpeg`] and produces
small, fixed-size measurements suitable for a control loop running at
camera rate: detected line segments along a scanline, the average color
of a rectangle, or a scalar contrast estimate.

An [`Analyzer`] is configured with the camera geometry it expects; a
frame of any other size is rejected as a configuration error rather
than silently clamped, since it means the camera and the control code
disagree about the capture format.

# Example
```rust,no_run
use botcam_vision::{Analyzer, Region};

let data = std::fs::read("frame.jpg").unwrap();
let frame = botcam_jpeg::decode(&data).unwrap();

let analyzer = Analyzer::new(320, 240);
let color = analyzer
    .average_color(&frame, Region::new(140, 100, 180, 140))
    .unwrap();
println!("{color:?}");
```
*/

#![forbid(unsafe_code)]

mod line;
mod region;

use core::fmt;

use botcam_jpeg::Frame;

pub use line::{LineScan, LineSegment};

/// Hard cap on reported line segments per scan.
pub const MAX_LINES: usize = 5;

/// Hard cap on the scanline window width, bounding the detector's
/// scratch allocation.
pub const MAX_WINDOW: u32 = 4096;

/// The closed set of analysis failures.
///
/// All of these indicate caller configuration bugs, not frame content;
/// retrying with the next frame cannot fix them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisError {
    /// The frame's dimensions differ from the configured camera
    /// geometry.
    GeometryMismatch,
    /// The operation needs an interleaved RGB frame.
    NotRgb,
    /// A region or scan window reaches outside the frame.
    OutOfBounds,
    /// The scan window exceeds [`MAX_WINDOW`] pixels.
    WindowTooLarge,
}

impl fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GeometryMismatch => {
                write!(f, "frame size does not match the configured camera geometry")
            }
            Self::NotRgb => write!(f, "frame is not interleaved RGB"),
            Self::OutOfBounds => write!(f, "region or window extends outside the frame"),
            Self::WindowTooLarge => write!(f, "scan window exceeds the supported width"),
        }
    }
}

impl core::error::Error for AnalysisError {}

/// Result type for frame analysis operations.
pub type Result<T> = core::result::Result<T, AnalysisError>;

/// An averaged RGB measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

/// A half-open pixel rectangle: `[left, right) x [top, bottom)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Region {
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Width in pixels; inverted rectangles count as empty.
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    /// Height in pixels; inverted rectangles count as empty.
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// Frame analyzer bound to one camera geometry.
///
/// The analyzer itself is stateless between calls; it only remembers
/// the frame size it was configured for. One analyzer must not be
/// shared between threads working on the same frame.
#[derive(Debug, Clone, Copy)]
pub struct Analyzer {
    width: u32,
    height: u32,
}

impl Analyzer {
    /// Create an analyzer for frames of the given size.
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// The frame width this analyzer expects.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// The frame height this analyzer expects.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Detect high-contrast transition segments along one scanline.
    ///
    /// See [`LineScan`] for the parameters. When `reference` is given it
    /// must match the frame geometry; the scanline is normalized against
    /// it before detection to cancel vignetting and uneven lighting.
    /// Segments are reported left to right, at most
    /// `scan.max_lines.min(MAX_LINES)` of them.
    pub fn detect_lines(
        &self,
        frame: &mut Frame,
        scan: &LineScan,
        reference: Option<&Frame>,
    ) -> Result<Vec<LineSegment>> {
        self.check_frame(frame)?;
        if let Some(reference) = reference {
            self.check_frame(reference)?;
        }
        line::detect_lines(frame, scan, reference)
    }

    /// Normalize a whole frame against a reference image, the same
    /// correction [`detect_lines`](Self::detect_lines) applies to its
    /// scanline. Useful for displaying what the detector actually sees.
    pub fn normalize_frame(
        &self,
        frame: &mut Frame,
        reference: &Frame,
        brightness: u32,
    ) -> Result<()> {
        self.check_frame(frame)?;
        self.check_frame(reference)?;
        line::normalize_frame(frame, reference, brightness);
        Ok(())
    }

    /// Average R, G and B over a rectangle.
    ///
    /// Returns `Ok(None)` for an empty rectangle.
    pub fn average_color(&self, frame: &Frame, region: Region) -> Result<Option<Color>> {
        self.check_frame(frame)?;
        region::average_color(frame, region)
    }

    /// Estimate the contrast inside a rectangle.
    ///
    /// Sums the absolute differences of each pixel against its right,
    /// lower and diagonal neighbors, normalized by the rectangle size.
    /// Flat regions measure 0. Returns `Ok(None)` when the rectangle has
    /// no neighbor pairs (under 2x2 pixels).
    pub fn contrast(&self, frame: &Frame, region: Region) -> Result<Option<u32>> {
        self.check_frame(frame)?;
        region::contrast(frame, region)
    }

    fn check_frame(&self, frame: &Frame) -> Result<()> {
        if !frame.is_color() {
            return Err(AnalysisError::NotRgb);
        }
        if frame.width != self.width || frame.height != self.height {
            return Err(AnalysisError::GeometryMismatch);
        }
        Ok(())
    }
}
