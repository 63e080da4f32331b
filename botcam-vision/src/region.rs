//! Rectangular region statistics: color averaging and contrast.

use botcam_jpeg::Frame;

use crate::{AnalysisError, Color, Region, Result};

fn check_bounds(frame: &Frame, region: Region) -> Result<()> {
    if region.right > frame.width || region.bottom > frame.height {
        return Err(AnalysisError::OutOfBounds);
    }
    Ok(())
}

/// Average R, G and B over every pixel of the rectangle.
pub(crate) fn average_color(frame: &Frame, region: Region) -> Result<Option<Color>> {
    check_bounds(frame, region)?;
    if region.is_empty() {
        return Ok(None);
    }
    let mut sums = [0_u64; 3];
    for y in region.top..region.bottom {
        let row = frame.row(y).ok_or(AnalysisError::OutOfBounds)?;
        for x in region.left..region.right {
            let offset = x as usize * 3;
            sums[0] += u64::from(row[offset]);
            sums[1] += u64::from(row[offset + 1]);
            sums[2] += u64::from(row[offset + 2]);
        }
    }
    let count = u64::from(region.width()) * u64::from(region.height());
    Ok(Some(Color {
        red: (sums[0] / count) as u8,
        green: (sums[1] / count) as u8,
        blue: (sums[2] / count) as u8,
    }))
}

/// Estimate contrast as the average absolute difference of each pixel
/// against its right, lower and diagonal neighbors, summed over the
/// channels and scaled by four.
pub(crate) fn contrast(frame: &Frame, region: Region) -> Result<Option<u32>> {
    check_bounds(frame, region)?;
    if region.width() < 2 || region.height() < 2 {
        // No neighbor pairs to compare.
        return Ok(None);
    }
    let mut sum = 0_u64;
    for y in region.top..region.bottom - 1 {
        let row = frame.row(y).ok_or(AnalysisError::OutOfBounds)?;
        let below = frame.row(y + 1).ok_or(AnalysisError::OutOfBounds)?;
        for x in region.left..region.right - 1 {
            let offset = x as usize * 3;
            for channel in 0..3 {
                let here = row[offset + channel];
                sum += u64::from(here.abs_diff(row[offset + 3 + channel]));
                sum += u64::from(here.abs_diff(below[offset + channel]));
                sum += u64::from(here.abs_diff(below[offset + 3 + channel]));
            }
        }
    }
    let count = u64::from(region.width() - 1) * u64::from(region.height() - 1);
    Ok(Some((4 * sum / count) as u32))
}
