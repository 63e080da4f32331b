//! Entropy decoding of one 8x8 coefficient block.

use crate::bits::BitReader;
use crate::error::{Error, Result, bail};
use crate::huffman::HuffmanTable;
use crate::idct;
use crate::plane::Plane;

/// Zig-zag order (ITU-T T.81 figure A.6): serialized coefficient index
/// to 2D frequency position.
pub(crate) const ZIGZAG: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

/// Decode, dequantize and inverse-transform a single block, writing its
/// 8x8 pixel output at (x, y) in the component plane.
pub(crate) fn decode_block(
    bits: &mut BitReader<'_>,
    dc_table: &HuffmanTable,
    ac_table: &HuffmanTable,
    quant: &[u8; 64],
    dc_pred: &mut i32,
    out: &mut Plane,
    x: usize,
    y: usize,
) -> Result<()> {
    let mut block = [0_i32; 64];

    // The DC value is coded as a difference against the previous block
    // of the same component.
    let (_, diff) = dc_table.get_vlc(bits)?;
    *dc_pred = dc_pred.wrapping_add(diff);
    block[0] = dc_pred.wrapping_mul(i32::from(quant[0]));

    // AC coefficients follow in zig-zag order. Each symbol packs a run
    // length of zeros (high nibble) and a magnitude size (low nibble);
    // 0xF0 skips sixteen zeros, 0x00 ends the block.
    let mut coef = 0_usize;
    loop {
        let (code, value) = ac_table.get_vlc(bits)?;
        if code == 0 {
            break;
        }
        if code & 0x0F == 0 && code != 0xF0 {
            bail!(Error::Syntax);
        }
        coef += usize::from(code >> 4) + 1;
        if coef > 63 {
            bail!(Error::Syntax);
        }
        block[ZIGZAG[coef]] = value.wrapping_mul(i32::from(quant[coef]));
        if coef >= 63 {
            break;
        }
    }

    idct::idct_block(&mut block, out, x, y);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dc_cat6_tables() -> (HuffmanTable, HuffmanTable) {
        // DC: one 1-bit code "0" for category 6. AC: one 1-bit code "0"
        // for end-of-block.
        let mut counts = [0_u8; 16];
        counts[0] = 1;
        let mut dc = HuffmanTable::empty();
        dc.build(&counts, &[0x06]).unwrap();
        let mut ac = HuffmanTable::empty();
        ac.build(&counts, &[0x00]).unwrap();
        (dc, ac)
    }

    #[test]
    fn flat_block_fills_its_region_with_one_level() {
        let (dc, ac) = dc_cat6_tables();
        let quant = {
            let mut q = [0_u8; 64];
            q[0] = 8;
            q
        };
        // DC code "0", difference bits 100000 (= +32), then end-of-block:
        // 0 100000 0 -> 0x40. With q0 = 8 the block level is 256, which
        // the flat-block path spreads as pixel value 160.
        let mut bits = BitReader::new(&[0x40]);
        let mut plane = Plane::alloc(8, 8).unwrap();
        let mut dc_pred = 0;
        decode_block(&mut bits, &dc, &ac, &quant, &mut dc_pred, &mut plane, 0, 0).unwrap();

        assert_eq!(dc_pred, 32);
        assert!(plane.data.iter().all(|&p| p == 160));
    }

    #[test]
    fn dc_differences_accumulate_across_blocks() {
        let (dc, ac) = dc_cat6_tables();
        let quant = {
            let mut q = [0_u8; 64];
            q[0] = 1;
            q
        };
        // Two blocks, each coding a difference of +32.
        let mut bits = BitReader::new(&[0x40, 0x40]);
        let mut plane = Plane::alloc(16, 8).unwrap();
        let mut dc_pred = 0;
        decode_block(&mut bits, &dc, &ac, &quant, &mut dc_pred, &mut plane, 0, 0).unwrap();
        assert_eq!(dc_pred, 32);
        decode_block(&mut bits, &dc, &ac, &quant, &mut dc_pred, &mut plane, 8, 0).unwrap();
        assert_eq!(dc_pred, 64);
    }

    #[test]
    fn run_length_overflow_is_a_syntax_error() {
        // DC: code "0" for category 0 (no difference bits). AC: code "0"
        // for 0xF0, which skips sixteen zero coefficients. The fourth
        // skip pushes the counter to 64.
        let mut counts = [0_u8; 16];
        counts[0] = 1;
        let mut dc = HuffmanTable::empty();
        dc.build(&counts, &[0x00]).unwrap();
        let mut ac = HuffmanTable::empty();
        ac.build(&counts, &[0xF0]).unwrap();
        let quant = [1_u8; 64];

        let mut bits = BitReader::new(&[0x00]);
        let mut plane = Plane::alloc(8, 8).unwrap();
        let mut dc_pred = 0;
        assert_eq!(
            decode_block(&mut bits, &dc, &ac, &quant, &mut dc_pred, &mut plane, 0, 0),
            Err(Error::Syntax)
        );
    }

    #[test]
    fn invalid_run_size_combination_is_a_syntax_error() {
        // An AC symbol with magnitude 0 and a run other than 15 is not a
        // valid code assignment.
        let mut counts = [0_u8; 16];
        counts[0] = 1;
        let mut dc = HuffmanTable::empty();
        dc.build(&counts, &[0x00]).unwrap();
        let mut ac = HuffmanTable::empty();
        ac.build(&counts, &[0x30]).unwrap();
        let quant = [1_u8; 64];

        let mut bits = BitReader::new(&[0x00]);
        let mut plane = Plane::alloc(8, 8).unwrap();
        let mut dc_pred = 0;
        assert_eq!(
            decode_block(&mut bits, &dc, &ac, &quant, &mut dc_pred, &mut plane, 0, 0),
            Err(Error::Syntax)
        );
    }
}
