use crate::video::{TILESET_0_OFFSET, TILESET_1_OFFSET};

pub const TILE_SIZE: usize = 16;

pub struct Tile;

impl Tile {
    /// VRAM offset of tile `index`. The $8000 table is indexed unsigned; the $8800
    /// table is indexed signed around $9000.
    pub fn offset(index: u8, unsigned: bool) -> usize {
        if unsigned {
            TILESET_0_OFFSET + index as usize * TILE_SIZE
        } else {
            (TILESET_1_OFFSET as isize + index as i8 as isize * TILE_SIZE as isize) as usize
        }
    }

    /// The eight 2-bit colour indices of one tile row, leftmost pixel first.
    pub fn row(vram: &[u8], offset: usize, line: usize) -> [u8; 8] {
        let lsb = vram[offset + line * 2];
        let msb = vram[offset + line * 2 + 1];

        let mut pixels = [0u8; 8];
        for (x, pixel) in pixels.iter_mut().enumerate() {
            let lsb_bit = (lsb >> (7 - x)) & 0b0000_0001;
            let msb_bit = (msb >> (7 - x)) & 0b0000_0001;
            *pixel = (msb_bit << 1) | lsb_bit;
        }
        pixels
    }
}
