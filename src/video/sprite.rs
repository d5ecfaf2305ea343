use crate::memory::registers::SpriteAttributes;

pub const MAX_SPRITES: usize = 40;
pub const MAX_SPRITES_PER_LINE: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct Sprite {
    pub x: u8,
    pub y: u8,
    pub tile_index: u8,
    pub attributes: SpriteAttributes,
}

impl Sprite {
    pub fn from_oam(oam: &[u8], index: usize) -> Sprite {
        let entry = &oam[index * 4..index * 4 + 4];

        Sprite {
            y: entry[0],
            x: entry[1],
            tile_index: entry[2],
            attributes: SpriteAttributes::from(entry[3]),
        }
    }

    /// Row of the sprite that lands on `scanline`, before flipping.
    pub fn line_on(&self, scanline: usize, height: usize) -> Option<usize> {
        let top = self.y as isize - 16;
        let line = scanline as isize - top;
        (0..height as isize).contains(&line).then_some(line as usize)
    }

    /// The first ten sprites in OAM order that touch `scanline`.
    pub fn visible_on(oam: &[u8], scanline: usize, height: usize) -> Vec<Sprite> {
        (0..MAX_SPRITES)
            .map(|index| Sprite::from_oam(oam, index))
            .filter(|sprite| sprite.line_on(scanline, height).is_some())
            .take(MAX_SPRITES_PER_LINE)
            .collect()
    }
}
