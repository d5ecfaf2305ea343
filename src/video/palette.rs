pub type Color = [u8; 3];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Shade {
    #[default]
    White,
    LightGray,
    DarkGray,
    Black,
}

impl From<Shade> for Color {
    fn from(shade: Shade) -> Color {
        match shade {
            Shade::White => [0xff, 0xff, 0xff],
            Shade::LightGray => [0xaa, 0xaa, 0xaa],
            Shade::DarkGray => [0x55, 0x55, 0x55],
            Shade::Black => [0x00, 0x00, 0x00],
        }
    }
}

/// BGP, OBP0 or OBP1: four 2-bit shades, colour 0 in the low bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette(pub u8);

impl Palette {
    pub fn shade(&self, color: u8) -> Shade {
        match (self.0 >> ((color & 0b11) * 2)) & 0b11 {
            0b00 => Shade::White,
            0b01 => Shade::LightGray,
            0b10 => Shade::DarkGray,
            _ => Shade::Black,
        }
    }
}
