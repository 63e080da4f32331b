//! The scan driver: iterates minimum coded units across the frame.

use log::trace;

use crate::bits::BitReader;
use crate::block::decode_block;
use crate::error::{Error, Result, bail};
use crate::huffman::HuffmanTable;
use crate::segment::Context;

/// Decode the entropy-coded scan data into the component planes.
///
/// MCUs are traversed row-major; within each MCU every component
/// contributes `ssx * ssy` blocks at its own sampling resolution. When a
/// restart interval is configured, the driver re-synchronizes on the
/// byte-aligned restart markers and resets every DC predictor. Reaching
/// the last MCU is the normal termination.
pub(crate) fn decode_scan(
    entropy: &[u8],
    ctx: &mut Context,
    tables: &[HuffmanTable; 4],
) -> Result<()> {
    let mut bits = BitReader::new(entropy);
    let Context {
        mcu_width,
        mcu_height,
        components,
        quant,
        restart_interval,
        ..
    } = ctx;
    let (mcu_width, mcu_height) = (*mcu_width, *mcu_height);
    let restart_interval = *restart_interval;

    let mut restart_countdown = restart_interval;
    let mut next_restart = 0_u16;
    let mut mcu_x = 0_usize;
    let mut mcu_y = 0_usize;
    loop {
        for comp in components.iter_mut() {
            for sub_y in 0..comp.ssy {
                for sub_x in 0..comp.ssx {
                    let x = (mcu_x * comp.ssx + sub_x) * 8;
                    let y = (mcu_y * comp.ssy + sub_y) * 8;
                    decode_block(
                        &mut bits,
                        &tables[comp.dc_sel],
                        &tables[comp.ac_sel],
                        &quant[comp.qt_sel],
                        &mut comp.dc_pred,
                        &mut comp.plane,
                        x,
                        y,
                    )?;
                }
            }
        }
        mcu_x += 1;
        if mcu_x >= mcu_width {
            mcu_x = 0;
            mcu_y += 1;
            if mcu_y >= mcu_height {
                break;
            }
        }
        if restart_interval > 0 {
            restart_countdown -= 1;
            if restart_countdown == 0 {
                bits.byte_align();
                let marker = bits.get_bits(16)?;
                if marker & 0xFFF8 != 0xFFD0 || marker & 7 != next_restart {
                    bail!(Error::Syntax);
                }
                trace!("restart {:#06x}, DC predictors reset", marker);
                next_restart = (next_restart + 1) & 7;
                restart_countdown = restart_interval;
                for comp in components.iter_mut() {
                    comp.dc_pred = 0;
                }
            }
        }
    }
    Ok(())
}
