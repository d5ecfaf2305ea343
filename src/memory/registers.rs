use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct InterruptFlags: u8 {
        const VBLANK    = 0b00001;
        const LCD_STAT  = 0b00010;
        const TIMER     = 0b00100;
        const SERIAL    = 0b01000;
        const JOYPAD    = 0b10000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LcdControl: u8 {
        const BG_DISPLAY = 0b0000_0001;
        const OBJ_DISPLAY = 0b0000_0010;
        const OBJ_SIZE = 0b0000_0100;
        const BG_TILE_MAP = 0b0000_1000;
        const BG_TILE_DATA = 0b0001_0000;
        const WINDOW_DISPLAY = 0b0010_0000;
        const WINDOW_TILE_MAP = 0b0100_0000;
        const LCD_DISPLAY = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LcdStatus: u8 {
        const MODE = 0b0000_0011;
        const COINCIDENCE = 0b0000_0100;
        const HBLANK_INTERRUPT = 0b0000_1000;
        const VBLANK_INTERRUPT = 0b0001_0000;
        const OAM_INTERRUPT = 0b0010_0000;
        const COINCIDENCE_INTERRUPT = 0b0100_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TimerControl: u8 {
        const CLOCK_SELECT = 0b0000_0011;
        const ENABLED = 0b0000_0100;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SerialControl: u8 {
        const INTERNAL_CLOCK = 0b0000_0001;
        const TRANSFER_START = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpriteAttributes: u8 {
        const PALETTE = 0b0001_0000;
        const FLIP_X = 0b0010_0000;
        const FLIP_Y = 0b0100_0000;
        const BEHIND_BG = 0b1000_0000;
    }
}

impl From<u8> for InterruptFlags {
    fn from(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }
}

impl From<u8> for LcdControl {
    fn from(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }
}

impl From<u8> for LcdStatus {
    fn from(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }
}

impl From<u8> for TimerControl {
    fn from(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }
}

impl From<u8> for SerialControl {
    fn from(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }
}

impl From<u8> for SpriteAttributes {
    fn from(byte: u8) -> Self {
        Self::from_bits_truncate(byte)
    }
}

impl TimerControl {
    /// Clock cycles per TIMA increment for the selected input clock.
    pub fn period(&self) -> usize {
        match self.bits() & TimerControl::CLOCK_SELECT.bits() {
            0b00 => 1024,
            0b01 => 16,
            0b10 => 64,
            _ => 256,
        }
    }
}
