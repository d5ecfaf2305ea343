use crate::memory::bus::{lock, Addressable, Bus, BusAddress};
use crate::memory::interrupts::InterruptController;
use crate::memory::registers::{InterruptFlags, LcdControl, LcdStatus, SpriteAttributes};
use crate::memory::{OAM_START, OPEN_BUS, VRAM_START};
use crate::video::frame::{blank_frame, Frame, FrameBuffer};
use crate::video::palette::Palette;
use crate::video::sprite::Sprite;
use crate::video::state::State;
use crate::video::tile::Tile;
use crate::video::*;
use log::debug;
use std::sync::{Arc, Mutex};

pub const OAM_SEARCH_CYCLES: usize = 80;
pub const DATA_TRANSFER_CYCLES: usize = 172;
pub const SCANLINE_CYCLES: usize = 456;
pub const VBLANK_START: u8 = 144;
pub const LAST_SCANLINE: u8 = 153;
pub const FRAME_CYCLES: usize = SCANLINE_CYCLES * (LAST_SCANLINE as usize + 1);

/// The LCD controller, mapped at $FF40-$FF4B.
///
/// VRAM and OAM are separate regions on the bus. The PPU borrows their storage
/// through [`Bus::with_block`] once per rendered line.
pub struct Ppu {
    interrupts: Arc<Mutex<InterruptController>>,
    frame_buffer: FrameBuffer,
    back: Box<Frame>,
    state: State,
    cycles: usize,
    window_line: usize,
    lcdc: LcdControl,
    stat: LcdStatus,
    scy: u8,
    scx: u8,
    ly: u8,
    lyc: u8,
    dma: u8,
    pending_dma: Option<u8>,
    bgp: Palette,
    obp0: Palette,
    obp1: Palette,
    wy: u8,
    wx: u8,
}

impl Ppu {
    pub fn new(interrupts: Arc<Mutex<InterruptController>>) -> Ppu {
        Ppu {
            interrupts,
            frame_buffer: FrameBuffer::new(),
            back: blank_frame(),
            state: State::HBlank,
            cycles: 0,
            window_line: 0,
            lcdc: LcdControl::empty(),
            stat: LcdStatus::empty(),
            scy: 0,
            scx: 0,
            ly: 0,
            lyc: 0,
            dma: 0,
            pending_dma: None,
            bgp: Palette(0),
            obp0: Palette(0),
            obp1: Palette(0),
            wy: 0,
            wx: 0,
        }
    }

    pub fn frame_buffer(&self) -> FrameBuffer {
        self.frame_buffer.clone()
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn scanline(&self) -> u8 {
        self.ly
    }

    /// The source page of a DMA written since the last call.
    pub fn take_dma_request(&mut self) -> Option<u8> {
        self.pending_dma.take()
    }

    /// Advances the line/mode state machine by `cycles` clock cycles. Every boundary
    /// crossed is handled, however large the step. Lines are rendered from the VRAM
    /// and OAM mapped on `bus`.
    pub fn tick(&mut self, cycles: usize, bus: &Bus) {
        if !self.lcdc.contains(LcdControl::LCD_DISPLAY) {
            return;
        }

        self.cycles += cycles;
        loop {
            match self.state {
                State::OamSearch if self.cycles >= OAM_SEARCH_CYCLES => self.enter(State::DataTransfer),
                State::DataTransfer if self.cycles >= OAM_SEARCH_CYCLES + DATA_TRANSFER_CYCLES => {
                    self.render_scanline(bus);
                    self.enter(State::HBlank);
                }
                State::HBlank | State::VBlank if self.cycles >= SCANLINE_CYCLES => {
                    self.cycles -= SCANLINE_CYCLES;
                    self.next_line();
                }
                _ => break,
            }
        }
    }

    fn next_line(&mut self) {
        self.ly += 1;

        if self.ly == VBLANK_START {
            self.enter(State::VBlank);
            self.request(InterruptFlags::VBLANK);
            self.frame_buffer.publish(&mut self.back);
        } else if self.ly > LAST_SCANLINE {
            self.ly = 0;
            self.window_line = 0;
            self.enter(State::OamSearch);
        } else if self.ly < VBLANK_START {
            self.enter(State::OamSearch);
        }

        self.compare_line();
    }

    fn enter(&mut self, state: State) {
        self.state = state;

        let source = match state {
            State::HBlank => LcdStatus::HBLANK_INTERRUPT,
            State::VBlank => LcdStatus::VBLANK_INTERRUPT,
            State::OamSearch => LcdStatus::OAM_INTERRUPT,
            State::DataTransfer => return,
        };

        if self.stat.contains(source) {
            self.request(InterruptFlags::LCD_STAT);
        }
    }

    fn compare_line(&mut self) {
        let coincidence = self.ly == self.lyc;
        self.stat.set(LcdStatus::COINCIDENCE, coincidence);

        if coincidence && self.stat.contains(LcdStatus::COINCIDENCE_INTERRUPT) {
            self.request(InterruptFlags::LCD_STAT);
        }
    }

    fn request(&self, interrupt: InterruptFlags) {
        lock(&self.interrupts).request(interrupt);
    }

    fn write_lcdc(&mut self, value: u8) {
        let was_on = self.lcdc.contains(LcdControl::LCD_DISPLAY);
        self.lcdc = LcdControl::from(value);

        match (was_on, self.lcdc.contains(LcdControl::LCD_DISPLAY)) {
            (true, false) => {
                debug!("LCD off");
                self.ly = 0;
                self.cycles = 0;
                self.window_line = 0;
                self.state = State::HBlank;
            }
            (false, true) => {
                debug!("LCD on");
                self.ly = 0;
                self.cycles = 0;
                self.window_line = 0;
                self.state = State::OamSearch;
                self.compare_line();
            }
            _ => {}
        }
    }

    fn render_scanline(&mut self, bus: &Bus) {
        let ly = self.ly as usize;
        let sprites = if self.lcdc.contains(LcdControl::OBJ_DISPLAY) {
            bus.with_block(OAM_START, |oam| Sprite::visible_on(oam, ly, self.sprite_height()))
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        if bus.with_block(VRAM_START, |vram| self.draw_line(vram, &sprites)).is_none() {
            debug!("No VRAM mapped, line {} left blank", ly);
        }
    }

    fn sprite_height(&self) -> usize {
        if self.lcdc.contains(LcdControl::OBJ_SIZE) {
            16
        } else {
            8
        }
    }

    fn draw_line(&mut self, vram: &[u8], sprites: &[Sprite]) {
        let ly = self.ly as usize;
        let mut colors = [0u8; SCREEN_WIDTH];

        if self.lcdc.contains(LcdControl::BG_DISPLAY) {
            self.render_background(vram, &mut colors);
            if self.lcdc.contains(LcdControl::WINDOW_DISPLAY) {
                self.render_window(vram, &mut colors);
            }
        }

        let row = &mut self.back[ly * SCREEN_WIDTH..(ly + 1) * SCREEN_WIDTH];
        for (pixel, color) in row.iter_mut().zip(colors.iter()) {
            *pixel = self.bgp.shade(*color);
        }

        self.render_sprites(vram, sprites, &colors);
    }

    fn tile_map(&self, select: LcdControl) -> usize {
        if self.lcdc.contains(select) {
            TILEMAP_1_OFFSET
        } else {
            TILEMAP_0_OFFSET
        }
    }

    /// Colour index of the pixel at (`x`, `y`) in the 256x256 map at `map`.
    fn map_pixel(&self, vram: &[u8], map: usize, x: usize, y: usize) -> u8 {
        let index = vram[map + (y / 8) * 32 + x / 8];
        let offset = Tile::offset(index, self.lcdc.contains(LcdControl::BG_TILE_DATA));
        Tile::row(vram, offset, y % 8)[x % 8]
    }

    fn render_background(&self, vram: &[u8], colors: &mut [u8; SCREEN_WIDTH]) {
        let map = self.tile_map(LcdControl::BG_TILE_MAP);
        let y = self.ly.wrapping_add(self.scy) as usize;

        for (x, color) in colors.iter_mut().enumerate() {
            let x = (x as u8).wrapping_add(self.scx) as usize;
            *color = self.map_pixel(vram, map, x, y);
        }
    }

    /// The window has its own line counter that only advances on lines it covered.
    fn render_window(&mut self, vram: &[u8], colors: &mut [u8; SCREEN_WIDTH]) {
        let left = self.wx as isize - 7;
        if self.ly < self.wy || left >= SCREEN_WIDTH as isize {
            return;
        }

        let map = self.tile_map(LcdControl::WINDOW_TILE_MAP);
        for x in left.max(0) as usize..SCREEN_WIDTH {
            let window_x = (x as isize - left) as usize;
            colors[x] = self.map_pixel(vram, map, window_x, self.window_line);
        }

        self.window_line += 1;
    }

    /// Lower OAM index wins, so sprites are drawn back to front.
    fn render_sprites(&mut self, vram: &[u8], sprites: &[Sprite], background: &[u8; SCREEN_WIDTH]) {
        let ly = self.ly as usize;
        let height = self.sprite_height();

        for sprite in sprites.iter().rev() {
            let Some(mut line) = sprite.line_on(ly, height) else {
                continue;
            };
            if sprite.attributes.contains(SpriteAttributes::FLIP_Y) {
                line = height - 1 - line;
            }

            let tile_index = if height == 16 { sprite.tile_index & 0xfe } else { sprite.tile_index };
            let pixels = Tile::row(vram, Tile::offset(tile_index, true), line);
            let palette = if sprite.attributes.contains(SpriteAttributes::PALETTE) {
                self.obp1
            } else {
                self.obp0
            };

            for column in 0..8 {
                let x = sprite.x as isize - 8 + column as isize;
                if !(0..SCREEN_WIDTH as isize).contains(&x) {
                    continue;
                }
                let x = x as usize;

                let pixel = if sprite.attributes.contains(SpriteAttributes::FLIP_X) {
                    pixels[7 - column]
                } else {
                    pixels[column]
                };

                if pixel == 0 {
                    continue;
                }
                if sprite.attributes.contains(SpriteAttributes::BEHIND_BG) && background[x] != 0 {
                    continue;
                }

                self.back[ly * SCREEN_WIDTH + x] = palette.shade(pixel);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn back_buffer(&self) -> &Frame {
        &self.back
    }
}

impl Addressable for Ppu {
    fn get(&self, addr: BusAddress) -> u8 {
        match addr.address {
            LCD_CONTROL_REGISTER => self.lcdc.bits(),
            LCD_STATUS_REGISTER => 0b1000_0000 | (self.stat.bits() & !LcdStatus::MODE.bits()) | self.state.as_u8(),
            SCROLL_Y_REGISTER => self.scy,
            SCROLL_X_REGISTER => self.scx,
            SCANLINE_Y_REGISTER => self.ly,
            SCANLINE_Y_COMPARE_REGISTER => self.lyc,
            DMA_REGISTER => self.dma,
            BG_PALETTE_REGISTER => self.bgp.0,
            OBJ0_PALETTE_REGISTER => self.obp0.0,
            OBJ1_PALETTE_REGISTER => self.obp1.0,
            WINDOW_Y_REGISTER => self.wy,
            WINDOW_X_REGISTER => self.wx,
            _ => OPEN_BUS,
        }
    }

    fn set(&mut self, addr: BusAddress, value: u8) {
        match addr.address {
            LCD_CONTROL_REGISTER => self.write_lcdc(value),
            LCD_STATUS_REGISTER => {
                // Mode and coincidence are read-only.
                let writable = LcdStatus::HBLANK_INTERRUPT
                    | LcdStatus::VBLANK_INTERRUPT
                    | LcdStatus::OAM_INTERRUPT
                    | LcdStatus::COINCIDENCE_INTERRUPT;
                self.stat = (self.stat - writable) | (LcdStatus::from(value) & writable);
            }
            SCROLL_Y_REGISTER => self.scy = value,
            SCROLL_X_REGISTER => self.scx = value,
            SCANLINE_Y_REGISTER => {}
            SCANLINE_Y_COMPARE_REGISTER => {
                self.lyc = value;
                if self.lcdc.contains(LcdControl::LCD_DISPLAY) {
                    self.compare_line();
                }
            }
            DMA_REGISTER => {
                debug!("OAM DMA from ${:02x}00", value);
                self.dma = value;
                self.pending_dma = Some(value);
            }
            BG_PALETTE_REGISTER => self.bgp = Palette(value),
            OBJ0_PALETTE_REGISTER => self.obp0 = Palette(value),
            OBJ1_PALETTE_REGISTER => self.obp1 = Palette(value),
            WINDOW_Y_REGISTER => self.wy = value,
            WINDOW_X_REGISTER => self.wx = value,
            _ => {}
        }
    }
}
