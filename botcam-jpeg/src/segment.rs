//! Marker segment parsing for baseline JPEG headers (Annex B of
//! ITU-T T.81).
//!
//! A JPEG stream is a sequence of marker segments (0xFF followed by a
//! marker byte and, for the segments handled here, a 16-bit length).
//! Parsing them configures the decode context; the entropy-coded scan
//! data follows the start-of-scan segment.

use crate::error::{Error, Result, bail};
use crate::huffman::HuffmanTable;
use crate::plane::Plane;
use crate::reader::Reader;

/// Baseline start-of-frame.
pub(crate) const SOF0: u8 = 0xC0;
/// Define Huffman table.
pub(crate) const DHT: u8 = 0xC4;
/// Start of scan.
pub(crate) const SOS: u8 = 0xDA;
/// Define quantization table.
pub(crate) const DQT: u8 = 0xDB;
/// Define restart interval.
pub(crate) const DRI: u8 = 0xDD;
/// Comment.
pub(crate) const COM: u8 = 0xFE;

/// Upper bound on the decoded frame, in pixels.
///
/// Camera frames are a few hundred kilopixels; anything beyond this is
/// either corruption or an input this decoder was never meant for, and
/// refusing it bounds every allocation below.
pub(crate) const MAX_PIXELS: u64 = 1 << 26;

/// One color component of the frame being decoded.
pub(crate) struct Component {
    /// Component identifier from the frame header.
    pub id: u8,
    /// Horizontal sampling factor (1, 2 or 4).
    pub ssx: usize,
    /// Vertical sampling factor (1, 2 or 4).
    pub ssy: usize,
    /// Logical plane width in pixels.
    pub width: usize,
    /// Logical plane height in pixels.
    pub height: usize,
    /// Quantization table slot.
    pub qt_sel: usize,
    /// DC Huffman table slot (0..=1).
    pub dc_sel: usize,
    /// AC Huffman table slot (2..=3).
    pub ac_sel: usize,
    /// Running DC predictor; reset at scan start and at restart markers.
    pub dc_pred: i32,
    /// Decoded pixel storage.
    pub plane: Plane,
}

/// Everything one decode call accumulates from the header segments.
///
/// A context is created fresh per decode call and dropped at its end, so
/// no table or plane state can leak between frames.
pub(crate) struct Context {
    pub width: usize,
    pub height: usize,
    /// Frame size in minimum coded units.
    pub mcu_width: usize,
    pub mcu_height: usize,
    pub components: Vec<Component>,
    /// Quantization tables, 64 coefficients per slot.
    pub quant: [[u8; 64]; 4],
    pub quant_avail: [bool; 4],
    /// Which Huffman table slots have been defined in this stream.
    pub huff_avail: [bool; 4],
    /// MCUs between restart markers; 0 disables restarts.
    pub restart_interval: usize,
}

impl Context {
    pub(crate) fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            mcu_width: 0,
            mcu_height: 0,
            components: Vec::new(),
            quant: [[0; 64]; 4],
            quant_avail: [false; 4],
            huff_avail: [false; 4],
            restart_interval: 0,
        }
    }
}

/// Slice out one marker segment's payload and advance `pos` past it.
///
/// The 16-bit length field counts itself, so the payload is `length - 2`
/// bytes.
pub(crate) fn read_segment<'a>(data: &'a [u8], pos: &mut usize) -> Result<&'a [u8]> {
    let Some(len_bytes) = data.get(*pos..*pos + 2) else {
        bail!(Error::Syntax);
    };
    let length = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
    if length < 2 {
        bail!(Error::Syntax);
    }
    let Some(payload) = data.get(*pos + 2..*pos + length) else {
        bail!(Error::Syntax);
    };
    *pos += length;
    Ok(payload)
}

/// Parse a baseline start-of-frame segment (B.2.2) and allocate the
/// component planes.
pub(crate) fn parse_sof(seg: &[u8], ctx: &mut Context) -> Result<()> {
    if !ctx.components.is_empty() {
        // A second frame header in one stream.
        bail!(Error::Syntax);
    }
    let mut r = Reader::new(seg);
    let precision = r.read_byte().ok_or(Error::Syntax)?;
    if precision != 8 {
        bail!(Error::Unsupported);
    }
    let height = usize::from(r.read_u16().ok_or(Error::Syntax)?);
    let width = usize::from(r.read_u16().ok_or(Error::Syntax)?);
    if width == 0 || height == 0 {
        bail!(Error::Syntax);
    }
    if (width as u64) * (height as u64) > MAX_PIXELS {
        bail!(Error::OutOfMemory);
    }
    let ncomp = usize::from(r.read_byte().ok_or(Error::Syntax)?);
    if ncomp != 1 && ncomp != 3 {
        bail!(Error::Unsupported);
    }

    struct RawComponent {
        id: u8,
        ssx: usize,
        ssy: usize,
        qt_sel: usize,
    }

    let mut raw = Vec::with_capacity(ncomp);
    for _ in 0..ncomp {
        let id = r.read_byte().ok_or(Error::Syntax)?;
        let sampling = r.read_byte().ok_or(Error::Syntax)?;
        let ssx = usize::from(sampling >> 4);
        let ssy = usize::from(sampling & 0x0F);
        if ssx == 0 || ssy == 0 {
            bail!(Error::Syntax);
        }
        if !ssx.is_power_of_two() || !ssy.is_power_of_two() || ssx > 4 || ssy > 4 {
            bail!(Error::Unsupported);
        }
        let qt_sel = r.read_byte().ok_or(Error::Syntax)?;
        if qt_sel & 0xFC != 0 {
            bail!(Error::Syntax);
        }
        raw.push(RawComponent {
            id,
            ssx,
            ssy,
            qt_sel: usize::from(qt_sel),
        });
    }

    if ncomp == 1 {
        // A single-component frame always decodes at full resolution.
        raw[0].ssx = 1;
        raw[0].ssy = 1;
    }
    let ssx_max = raw.iter().map(|c| c.ssx).max().unwrap_or(1);
    let ssy_max = raw.iter().map(|c| c.ssy).max().unwrap_or(1);

    ctx.width = width;
    ctx.height = height;
    ctx.mcu_width = width.div_ceil(ssx_max * 8);
    ctx.mcu_height = height.div_ceil(ssy_max * 8);

    for c in raw {
        let comp_width = (width * c.ssx).div_ceil(ssx_max);
        let comp_height = (height * c.ssy).div_ceil(ssy_max);
        // The filtered upsampler needs at least three samples along any
        // axis it interpolates.
        if (comp_width < 3 && c.ssx != ssx_max) || (comp_height < 3 && c.ssy != ssy_max) {
            bail!(Error::Unsupported);
        }
        let stride = ctx.mcu_width * c.ssx * 8;
        let rows = ctx.mcu_height * c.ssy * 8;
        if (stride as u64) * (rows as u64) > 4 * MAX_PIXELS {
            bail!(Error::OutOfMemory);
        }
        ctx.components.push(Component {
            id: c.id,
            ssx: c.ssx,
            ssy: c.ssy,
            width: comp_width,
            height: comp_height,
            qt_sel: c.qt_sel,
            dc_sel: 0,
            ac_sel: 0,
            dc_pred: 0,
            plane: Plane::alloc(stride, rows)?,
        });
    }
    Ok(())
}

/// Parse a define-Huffman-table segment (B.2.4.2). One segment may
/// carry several tables.
pub(crate) fn parse_dht(
    seg: &[u8],
    ctx: &mut Context,
    tables: &mut [HuffmanTable; 4],
) -> Result<()> {
    let mut r = Reader::new(seg);
    while r.remaining() >= 17 {
        let id = r.read_byte().ok_or(Error::Syntax)?;
        if id & 0xEC != 0 {
            bail!(Error::Syntax);
        }
        if id & 0x02 != 0 {
            // Table identifiers 2 and 3 only occur in extended codings.
            bail!(Error::Unsupported);
        }
        // Fold class (DC/AC) and identifier into one slot index: DC
        // tables land in slots 0-1, AC tables in slots 2-3.
        let slot = usize::from((id | (id >> 3)) & 3);
        let counts: &[u8; 16] = r
            .read_bytes(16)
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or(Error::Syntax)?;
        let total = counts.iter().map(|&c| usize::from(c)).sum();
        let symbols = r.read_bytes(total).ok_or(Error::Syntax)?;
        tables[slot].build(counts, symbols)?;
        ctx.huff_avail[slot] = true;
    }
    if !r.is_empty() {
        bail!(Error::Syntax);
    }
    Ok(())
}

/// Parse a define-quantization-table segment. One segment may carry
/// several tables.
pub(crate) fn parse_dqt(seg: &[u8], ctx: &mut Context) -> Result<()> {
    let mut r = Reader::new(seg);
    while r.remaining() >= 65 {
        let id = r.read_byte().ok_or(Error::Syntax)?;
        if id & 0xFC != 0 {
            bail!(Error::Syntax);
        }
        let coefficients = r.read_bytes(64).ok_or(Error::Syntax)?;
        ctx.quant[usize::from(id)].copy_from_slice(coefficients);
        ctx.quant_avail[usize::from(id)] = true;
    }
    if !r.is_empty() {
        bail!(Error::Syntax);
    }
    Ok(())
}

/// Parse a define-restart-interval segment.
pub(crate) fn parse_dri(seg: &[u8], ctx: &mut Context) -> Result<()> {
    let interval = Reader::new(seg).read_u16().ok_or(Error::Syntax)?;
    ctx.restart_interval = usize::from(interval);
    Ok(())
}

/// Parse a start-of-scan segment (B.2.3) and bind table selectors.
pub(crate) fn parse_sos(seg: &[u8], ctx: &mut Context) -> Result<()> {
    if ctx.components.is_empty() {
        // Scan before frame header.
        bail!(Error::Syntax);
    }
    let mut r = Reader::new(seg);
    let scan_comps = usize::from(r.read_byte().ok_or(Error::Syntax)?);
    if scan_comps != ctx.components.len() {
        bail!(Error::Unsupported);
    }
    for comp in &mut ctx.components {
        let id = r.read_byte().ok_or(Error::Syntax)?;
        if id != comp.id {
            bail!(Error::Syntax);
        }
        let selectors = r.read_byte().ok_or(Error::Syntax)?;
        if selectors & 0xEE != 0 {
            bail!(Error::Syntax);
        }
        comp.dc_sel = usize::from(selectors >> 4);
        comp.ac_sel = usize::from(selectors & 1) | 2;
    }
    // Spectral selection must cover the full 0..=63 range with no
    // successive approximation; anything else is a progressive scan.
    let ss = r.read_byte().ok_or(Error::Syntax)?;
    let se = r.read_byte().ok_or(Error::Syntax)?;
    let ah_al = r.read_byte().ok_or(Error::Syntax)?;
    if ss != 0 || se != 63 || ah_al != 0 {
        bail!(Error::Unsupported);
    }
    // Every table slot the scan references must have been defined.
    for comp in &ctx.components {
        if !ctx.huff_avail[comp.dc_sel]
            || !ctx.huff_avail[comp.ac_sel]
            || !ctx.quant_avail[comp.qt_sel]
        {
            bail!(Error::Syntax);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segment_lengths_are_validated() {
        // Length includes its own two bytes.
        let data = [0x00, 0x04, 0xAA, 0xBB, 0xCC];
        let mut pos = 0;
        assert_eq!(read_segment(&data, &mut pos), Ok(&[0xAA, 0xBB][..]));
        assert_eq!(pos, 4);

        // Length pointing past the end of the buffer.
        let data = [0x00, 0x09, 0xAA];
        let mut pos = 0;
        assert_eq!(read_segment(&data, &mut pos), Err(Error::Syntax));

        // Length smaller than the field itself.
        let data = [0x00, 0x01];
        let mut pos = 0;
        assert_eq!(read_segment(&data, &mut pos), Err(Error::Syntax));
    }

    #[test]
    fn sof_rejects_unsupported_shapes() {
        let mut ctx = Context::new();
        // 12-bit precision.
        let seg = [12, 0, 8, 0, 8, 1, 1, 0x11, 0];
        assert_eq!(parse_sof(&seg, &mut ctx), Err(Error::Unsupported));

        // Two components.
        let seg = [8, 0, 8, 0, 8, 2, 1, 0x11, 0, 2, 0x11, 0];
        assert_eq!(parse_sof(&seg, &mut ctx), Err(Error::Unsupported));

        // Non-power-of-two sampling factor.
        let seg = [8, 0, 8, 0, 8, 1, 1, 0x31, 0];
        assert_eq!(parse_sof(&seg, &mut ctx), Err(Error::Unsupported));

        // Zero width.
        let seg = [8, 0, 8, 0, 0, 1, 1, 0x11, 0];
        assert_eq!(parse_sof(&seg, &mut ctx), Err(Error::Syntax));
    }

    #[test]
    fn sof_geometry_covers_partial_mcus() {
        let mut ctx = Context::new();
        // 20x11, 2x2 luma against 1x1 chroma: 2 x 1 MCUs of 16x16.
        let seg = [
            8, 0, 11, 0, 20, 3, 1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1,
        ];
        parse_sof(&seg, &mut ctx).unwrap();
        assert_eq!((ctx.mcu_width, ctx.mcu_height), (2, 1));
        let luma = &ctx.components[0];
        assert_eq!((luma.width, luma.height), (20, 11));
        assert_eq!((luma.plane.stride, luma.plane.rows), (32, 16));
        let chroma = &ctx.components[1];
        assert_eq!((chroma.width, chroma.height), (10, 6));
        assert_eq!((chroma.plane.stride, chroma.plane.rows), (16, 8));
    }

    #[test]
    fn grayscale_sampling_is_forced_to_one() {
        let mut ctx = Context::new();
        let seg = [8, 0, 16, 0, 16, 1, 1, 0x44, 0];
        parse_sof(&seg, &mut ctx).unwrap();
        let comp = &ctx.components[0];
        assert_eq!((comp.ssx, comp.ssy), (1, 1));
        assert_eq!((ctx.mcu_width, ctx.mcu_height), (2, 2));
    }

    #[test]
    fn oversized_frames_are_refused() {
        let mut ctx = Context::new();
        let seg = [8, 0xFF, 0xFF, 0xFF, 0xFF, 1, 1, 0x11, 0];
        assert_eq!(parse_sof(&seg, &mut ctx), Err(Error::OutOfMemory));
    }

    #[test]
    fn sos_requires_populated_tables() {
        let mut ctx = Context::new();
        let seg = [8, 0, 8, 0, 8, 1, 1, 0x11, 0];
        parse_sof(&seg, &mut ctx).unwrap();

        // Tables referenced by the scan were never defined.
        let sos = [1, 1, 0x00, 0, 63, 0];
        assert_eq!(parse_sos(&sos, &mut ctx), Err(Error::Syntax));
    }

    #[test]
    fn sos_rejects_progressive_parameters() {
        let mut ctx = Context::new();
        let seg = [8, 0, 8, 0, 8, 1, 1, 0x11, 0];
        parse_sof(&seg, &mut ctx).unwrap();
        ctx.quant_avail = [true; 4];
        ctx.huff_avail = [true; 4];

        // Spectral selection 1..=5 marks a progressive AC scan.
        let sos = [1, 1, 0x00, 1, 5, 0];
        assert_eq!(parse_sos(&sos, &mut ctx), Err(Error::Unsupported));

        let sos = [1, 1, 0x00, 0, 63, 0];
        assert_eq!(parse_sos(&sos, &mut ctx), Ok(()));
        assert_eq!(ctx.components[0].ac_sel, 2);
    }

    #[test]
    fn dqt_accepts_multiple_tables_per_segment() {
        let mut ctx = Context::new();
        let mut seg = vec![0x00];
        seg.extend_from_slice(&[7; 64]);
        seg.push(0x01);
        seg.extend_from_slice(&[9; 64]);
        parse_dqt(&seg, &mut ctx).unwrap();
        assert!(ctx.quant_avail[0] && ctx.quant_avail[1]);
        assert_eq!(ctx.quant[0][63], 7);
        assert_eq!(ctx.quant[1][0], 9);

        // Trailing garbage is a syntax error.
        let seg = [0u8; 70];
        assert_eq!(parse_dqt(&seg, &mut ctx), Err(Error::Syntax));
    }
}
