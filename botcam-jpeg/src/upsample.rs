//! Chroma upsampling and color conversion.

use log::trace;

use crate::error::{Error, Result, bail};
use crate::idct::clip;
use crate::plane::Plane;
use crate::segment::{Component, Context};
use crate::{Frame, PixelFormat, Upsampling};

// Four-tap interpolation kernel for the filtered mode; each tap set sums
// to 128 so a flat plane stays flat.
const CF4A: i32 = -9;
const CF4B: i32 = 111;
const CF4C: i32 = 29;
const CF4D: i32 = -3;
const CF3A: i32 = 28;
const CF3B: i32 = 109;
const CF3C: i32 = -9;
const CF3X: i32 = 104;
const CF3Y: i32 = 27;
const CF3Z: i32 = -3;
const CF2A: i32 = 139;
const CF2B: i32 = -11;

#[inline]
fn cf(x: i32) -> u8 {
    clip((x + 64) >> 7)
}

/// Double a component's width with the four-tap filter.
fn upsample_filtered_h(comp: &mut Component) -> Result<()> {
    let (w, h, stride) = (comp.width, comp.height, comp.plane.stride);
    // Guaranteed by the frame-header checks for any subsampled component.
    debug_assert!(w >= 3 && stride >= w);
    let new_w = w * 2;
    let mut out = Plane::alloc(new_w, h)?;
    for y in 0..h {
        let row = &comp.plane.data[y * stride..(y + 1) * stride];
        let out_row = &mut out.data[y * new_w..(y + 1) * new_w];
        let p = |i: usize| i32::from(row[i]);
        out_row[0] = cf(CF2A * p(0) + CF2B * p(1));
        out_row[1] = cf(CF3X * p(0) + CF3Y * p(1) + CF3Z * p(2));
        out_row[2] = cf(CF3A * p(0) + CF3B * p(1) + CF3C * p(2));
        for x in 0..w - 3 {
            out_row[(x << 1) + 3] =
                cf(CF4A * p(x) + CF4B * p(x + 1) + CF4C * p(x + 2) + CF4D * p(x + 3));
            out_row[(x << 1) + 4] =
                cf(CF4D * p(x) + CF4C * p(x + 1) + CF4B * p(x + 2) + CF4A * p(x + 3));
        }
        // The right-edge taps mirror in from the end of the stored row
        // (block padding included when the stride exceeds the width).
        out_row[new_w - 3] = cf(CF3A * p(stride - 1) + CF3B * p(stride - 2) + CF3C * p(stride - 3));
        out_row[new_w - 2] = cf(CF3X * p(stride - 1) + CF3Y * p(stride - 2) + CF3Z * p(stride - 3));
        out_row[new_w - 1] = cf(CF2A * p(stride - 1) + CF2B * p(stride - 2));
    }
    comp.width = new_w;
    comp.plane = out;
    Ok(())
}

/// Double a component's height with the four-tap filter.
fn upsample_filtered_v(comp: &mut Component) -> Result<()> {
    let (w, h) = (comp.width, comp.height);
    // Guaranteed by the frame-header checks for any subsampled component.
    debug_assert!(h >= 3);
    let new_h = h * 2;
    let mut out = Plane::alloc(w, new_h)?;
    for x in 0..w {
        let p = |row: usize| i32::from(comp.plane.get(x, row));
        let column = |row: usize| row * w + x;
        out.data[column(0)] = cf(CF2A * p(0) + CF2B * p(1));
        out.data[column(1)] = cf(CF3X * p(0) + CF3Y * p(1) + CF3Z * p(2));
        out.data[column(2)] = cf(CF3A * p(0) + CF3B * p(1) + CF3C * p(2));
        for y in 0..h - 3 {
            out.data[column(3 + 2 * y)] =
                cf(CF4A * p(y) + CF4B * p(y + 1) + CF4C * p(y + 2) + CF4D * p(y + 3));
            out.data[column(4 + 2 * y)] =
                cf(CF4D * p(y) + CF4C * p(y + 1) + CF4B * p(y + 2) + CF4A * p(y + 3));
        }
        out.data[column(new_h - 3)] =
            cf(CF3A * p(h - 1) + CF3B * p(h - 2) + CF3C * p(h - 3));
        out.data[column(new_h - 2)] =
            cf(CF3X * p(h - 1) + CF3Y * p(h - 2) + CF3Z * p(h - 3));
        out.data[column(new_h - 1)] = cf(CF2A * p(h - 1) + CF2B * p(h - 2));
    }
    comp.height = new_h;
    comp.plane = out;
    Ok(())
}

/// Bring a component to at least frame resolution by pixel replication.
fn upsample_nearest(comp: &mut Component, frame_w: usize, frame_h: usize) -> Result<()> {
    let mut w = comp.width;
    let mut h = comp.height;
    let mut x_shift = 0_u32;
    let mut y_shift = 0_u32;
    while w < frame_w {
        w <<= 1;
        x_shift += 1;
    }
    while h < frame_h {
        h <<= 1;
        y_shift += 1;
    }
    let mut out = Plane::alloc(w, h)?;
    let stride = comp.plane.stride;
    for y in 0..h {
        let src_row = &comp.plane.data[(y >> y_shift) * stride..];
        let out_row = &mut out.data[y * w..(y + 1) * w];
        for (x, pixel) in out_row.iter_mut().enumerate() {
            *pixel = src_row[x >> x_shift];
        }
    }
    comp.width = w;
    comp.height = h;
    comp.plane = out;
    Ok(())
}

/// Upsample all components to frame resolution and produce the final
/// frame: interleaved RGB for color streams, a tightly packed plane for
/// grayscale.
pub(crate) fn finish(mut ctx: Context, mode: Upsampling) -> Result<Frame> {
    let (frame_w, frame_h) = (ctx.width, ctx.height);
    for comp in &mut ctx.components {
        match mode {
            Upsampling::Nearest => {
                if comp.width < frame_w || comp.height < frame_h {
                    trace!("replicating component {} to {frame_w}x{frame_h}", comp.id);
                    upsample_nearest(comp, frame_w, frame_h)?;
                }
            }
            Upsampling::Filtered => {
                while comp.width < frame_w || comp.height < frame_h {
                    if comp.width < frame_w {
                        upsample_filtered_h(comp)?;
                    }
                    if comp.height < frame_h {
                        upsample_filtered_v(comp)?;
                    }
                }
            }
        }
        if comp.width < frame_w || comp.height < frame_h {
            bail!(Error::Internal);
        }
    }

    if ctx.components.len() == 3 {
        let size = frame_w * frame_h * 3;
        let mut data = Vec::new();
        data.try_reserve_exact(size).map_err(|_| Error::OutOfMemory)?;
        for row_index in 0..frame_h {
            let luma = ctx.components[0].plane.row(row_index).ok_or(Error::Internal)?;
            let cb = ctx.components[1].plane.row(row_index).ok_or(Error::Internal)?;
            let cr = ctx.components[2].plane.row(row_index).ok_or(Error::Internal)?;
            for x in 0..frame_w {
                // Fixed-point YCbCr to RGB with an 8-bit fraction:
                // 359/256 = 1.402, 88/256 = 0.344, 183/256 = 0.714,
                // 454/256 = 1.772.
                let y = i32::from(luma[x]) << 8;
                let cb = i32::from(cb[x]) - 128;
                let cr = i32::from(cr[x]) - 128;
                data.push(clip((y + 359 * cr + 128) >> 8));
                data.push(clip((y - 88 * cb - 183 * cr + 128) >> 8));
                data.push(clip((y + 454 * cb + 128) >> 8));
            }
        }
        Ok(Frame {
            width: frame_w as u32,
            height: frame_h as u32,
            format: PixelFormat::Rgb,
            data,
        })
    } else {
        let comp = ctx.components.pop().ok_or(Error::Internal)?;
        let stride = comp.plane.stride;
        let data = if stride == frame_w {
            let mut data = comp.plane.data;
            data.truncate(frame_w * frame_h);
            data
        } else {
            // Remove the block-padding stride.
            let mut data = Vec::new();
            data.try_reserve_exact(frame_w * frame_h)
                .map_err(|_| Error::OutOfMemory)?;
            for row_index in 0..frame_h {
                let row = comp.plane.row(row_index).ok_or(Error::Internal)?;
                data.extend_from_slice(&row[..frame_w]);
            }
            data
        };
        Ok(Frame {
            width: frame_w as u32,
            height: frame_h as u32,
            format: PixelFormat::Gray,
            data,
        })
    }
}
