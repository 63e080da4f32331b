/*!
A memory-safe, pure-Rust baseline JPEG decoder for embedded camera feeds.

`botcam-jpeg` decodes the baseline DCT subset of ITU-T T.81 (ISO/IEC
10918-1): 8-bit samples, grayscale or YCbCr color with power-of-two
chroma subsampling, sequential scans and restart markers. This covers
the MJPEG frames produced by the USB cameras typically attached to
small robot controllers; progressive and arithmetic-coded images are
rejected as unsupported.

# Example
```rust,no_run
let data = std::fs::read("frame.jpg").unwrap();
let frame = botcam_jpeg::decode(&data).unwrap();

println!("{}x{} frame", frame.width, frame.height);
```

Frames captured from a live camera are occasionally truncated or
corrupted. Those fail with [`Error::NoJpeg`] or [`Error::Syntax`],
which a caller should treat as "drop this frame and retry with the
next one"; the decoder never panics on malformed input.

# Safety
This crate forbids unsafe code via a crate-level attribute.
*/

#![forbid(unsafe_code)]

mod bits;
mod block;
mod error;
mod huffman;
mod idct;
mod plane;
mod reader;
mod scan;
mod segment;
mod upsample;

pub use error::{Error, Result};

use error::bail;
use huffman::HuffmanTable;
use log::debug;
use segment::Context;

/// How subsampled chroma planes are brought up to frame resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Upsampling {
    /// Pixel replication by integer doubling; the cheapest option and
    /// the default.
    #[default]
    Nearest,
    /// Four-tap filtered interpolation. Smoother chroma edges at roughly
    /// twice the upsampling cost.
    Filtered,
}

/// The pixel layout of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// One byte per pixel.
    Gray,
    /// Three bytes per pixel, interleaved R, G, B.
    Rgb,
}

/// A decoded camera frame.
///
/// The pixel buffer is tightly packed and exclusively owned by the
/// caller; the decoder keeps no alias to it after returning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// The layout of `data`.
    pub format: PixelFormat,
    /// Row-major pixel data, `width * height * channels` bytes.
    pub data: Vec<u8>,
}

impl Frame {
    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        match self.format {
            PixelFormat::Gray => 1,
            PixelFormat::Rgb => 3,
        }
    }

    /// Whether the frame carries color information.
    pub fn is_color(&self) -> bool {
        self.format == PixelFormat::Rgb
    }

    /// One row of pixel data.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        let row_len = self.width as usize * self.channels();
        let start = (y as usize).checked_mul(row_len)?;
        self.data.get(start..start + row_len)
    }

    /// One row of pixel data, mutably.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        let row_len = self.width as usize * self.channels();
        let start = (y as usize).checked_mul(row_len)?;
        self.data.get_mut(start..start + row_len)
    }

    /// The channel values of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width {
            return None;
        }
        let channels = self.channels();
        let offset = x as usize * channels;
        self.row(y)?.get(offset..offset + channels)
    }

    /// Convert the frame into an [`image`] buffer.
    ///
    /// Returns `None` if the buffer size does not match the frame
    /// dimensions, which would indicate a decoder bug.
    #[cfg(feature = "image")]
    pub fn into_image(self) -> Option<image::DynamicImage> {
        match self.format {
            PixelFormat::Gray => image::GrayImage::from_raw(self.width, self.height, self.data)
                .map(image::DynamicImage::ImageLuma8),
            PixelFormat::Rgb => image::RgbImage::from_raw(self.width, self.height, self.data)
                .map(image::DynamicImage::ImageRgb8),
        }
    }
}

/// A reusable JPEG decoder.
///
/// The decoder owns four 65536-entry Huffman lookup tables (the
/// memory-for-speed trade that makes symbol decode a single lookup) and
/// reuses them across frames. All per-frame state lives and dies inside
/// one [`decode`](Self::decode) call, so decoding the same bytes twice
/// yields byte-identical frames.
///
/// A decoder instance is single-threaded; concurrent callers each need
/// their own instance.
pub struct Decoder {
    upsampling: Upsampling,
    tables: [HuffmanTable; 4],
}

impl Decoder {
    /// Create a decoder with [`Upsampling::Nearest`].
    pub fn new() -> Self {
        Self::with_upsampling(Upsampling::Nearest)
    }

    /// Create a decoder with the given chroma upsampling mode.
    pub fn with_upsampling(upsampling: Upsampling) -> Self {
        Self {
            upsampling,
            tables: core::array::from_fn(|_| HuffmanTable::empty()),
        }
    }

    /// Decode one complete baseline JPEG stream into a frame.
    pub fn decode(&mut self, data: &[u8]) -> Result<Frame> {
        if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
            bail!(Error::NoJpeg);
        }
        let mut ctx = Context::new();
        let mut pos = 2;
        loop {
            if data.len() < pos + 2 || data[pos] != 0xFF {
                bail!(Error::Syntax);
            }
            let marker = data[pos + 1];
            pos += 2;
            match marker {
                segment::SOF0 => {
                    let seg = segment::read_segment(data, &mut pos)?;
                    segment::parse_sof(seg, &mut ctx)?;
                }
                segment::DHT => {
                    let seg = segment::read_segment(data, &mut pos)?;
                    segment::parse_dht(seg, &mut ctx, &mut self.tables)?;
                }
                segment::DQT => {
                    let seg = segment::read_segment(data, &mut pos)?;
                    segment::parse_dqt(seg, &mut ctx)?;
                }
                segment::DRI => {
                    let seg = segment::read_segment(data, &mut pos)?;
                    segment::parse_dri(seg, &mut ctx)?;
                }
                segment::SOS => {
                    let seg = segment::read_segment(data, &mut pos)?;
                    segment::parse_sos(seg, &mut ctx)?;
                    scan::decode_scan(&data[pos..], &mut ctx, &self.tables)?;
                    break;
                }
                segment::COM => {
                    let seg = segment::read_segment(data, &mut pos)?;
                    debug!("skipping {} byte comment segment", seg.len());
                }
                m if m & 0xF0 == 0xE0 => {
                    let seg = segment::read_segment(data, &mut pos)?;
                    debug!("skipping APP{} segment ({} bytes)", m & 0x0F, seg.len());
                }
                _ => bail!(Error::Unsupported),
            }
        }
        upsample::finish(ctx, self.upsampling)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a single baseline JPEG frame with a fresh [`Decoder`].
///
/// When decoding a stream of frames, keep a [`Decoder`] around instead
/// to reuse its lookup tables.
pub fn decode(data: &[u8]) -> Result<Frame> {
    Decoder::new().decode(data)
}
