use crate::memory::mapper::{Mapper, RAM_BANK_SIZE, ROM_BANK_SIZE};
use crate::memory::{EXTERNAL_RAM_START, OPEN_BUS};
use log::{debug, warn};

// Register windows, selected by the top three address bits.
const RAM_ENABLE_WINDOW: u16 = 0;
const ROM_BANK_WINDOW: u16 = 1;
const SECONDARY_BANK_WINDOW: u16 = 2;
const BANKING_MODE_WINDOW: u16 = 3;
const EXTERNAL_RAM_WINDOW: u16 = 5;

#[derive(Clone)]
pub struct Mbc1 {
    rom: Vec<u8>,
    rom_bank: u8,
    ram: Vec<u8>,
    ram_bank: u8,
    ram_enabled: bool,
    ram_banking_mode: bool,
}

impl Mbc1 {
    pub fn new(memory: Vec<u8>, ram_size: usize) -> Mbc1 {
        Mbc1 {
            rom: memory,
            rom_bank: 1,
            ram: vec![0; ram_size],
            ram_bank: 0,
            ram_enabled: false,
            ram_banking_mode: false,
        }
    }

    /// The bank visible at $4000-$7FFF. A zero in the low five bits reads as one,
    /// so bank 0 can never appear in the upper window.
    #[inline]
    pub fn current_rom_bank(&self) -> usize {
        if self.rom_bank & 0b0001_1111 == 0 {
            self.rom_bank as usize + 1
        } else {
            self.rom_bank as usize
        }
    }

    #[inline]
    pub fn current_ram_bank(&self) -> usize {
        self.ram_bank as usize
    }

    #[inline]
    fn ram_index(&self, addr: u16) -> usize {
        (addr - EXTERNAL_RAM_START) as usize + self.current_ram_bank() * RAM_BANK_SIZE
    }
}

impl Mapper for Mbc1 {
    #[inline]
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x3fff => self.rom.get(addr as usize).copied().unwrap_or(OPEN_BUS),
            0x4000..=0x7fff => {
                let index = (addr as usize - ROM_BANK_SIZE) + self.current_rom_bank() * ROM_BANK_SIZE;
                self.rom.get(index).copied().unwrap_or(OPEN_BUS)
            }
            0xa000..=0xbfff if self.ram_enabled => self.ram.get(self.ram_index(addr)).copied().unwrap_or(OPEN_BUS),
            _ => OPEN_BUS,
        }
    }

    #[inline]
    fn write(&mut self, addr: u16, data: u8) {
        match (addr >> 13) & 0b111 {
            RAM_ENABLE_WINDOW => {
                self.ram_enabled = (data & 0x0f) == 0x0a;
                debug!("MBC1: RAM enabled: {}", self.ram_enabled);
            }
            ROM_BANK_WINDOW => {
                // Only the low five bits land here. Zero is kept as written and
                // corrected to one when the upper window is read.
                self.rom_bank = (self.rom_bank & 0b0110_0000) | (data & 0b0001_1111);
                debug!("MBC1: Switched to ROM bank {}", self.current_rom_bank());
            }
            SECONDARY_BANK_WINDOW if self.ram_banking_mode => {
                self.ram_bank = data & 0b11;
                debug!("MBC1: Switched to RAM bank {}", self.current_ram_bank());
            }
            SECONDARY_BANK_WINDOW => {
                self.rom_bank = ((data & 0b11) << 5) | (self.rom_bank & 0b0001_1111);
                debug!("MBC1: Switched to ROM bank {}", self.current_rom_bank());
            }
            BANKING_MODE_WINDOW => {
                self.ram_banking_mode = data & 0b1 == 1;
                if self.ram_banking_mode {
                    self.rom_bank &= 0b0001_1111;
                } else {
                    self.ram_bank = 0;
                }
                debug!("MBC1: RAM banking mode: {}", self.ram_banking_mode);
            }
            EXTERNAL_RAM_WINDOW => {
                if self.ram_enabled {
                    let index = self.ram_index(addr);
                    if let Some(cell) = self.ram.get_mut(index) {
                        *cell = data;
                    }
                } else {
                    warn!("MBC1: write to disabled RAM ignored: ${:04x} <- ${:02x}", addr, data);
                }
            }
            _ => {}
        }
    }

    #[inline]
    fn name(&self) -> String {
        String::from("MBC1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 128 banks, each filled with its own bank number.
    fn banked_rom() -> Vec<u8> {
        (0..128u8).flat_map(|bank| std::iter::repeat(bank).take(ROM_BANK_SIZE)).collect()
    }

    #[test]
    fn bank_zero_is_never_selectable_in_upper_window() {
        let mut mbc = Mbc1::new(banked_rom(), 0);

        mbc.write(0x2000, 0x00);
        assert_eq!(mbc.read(0x4000), 1);

        mbc.write(0x2000, 0x01);
        assert_eq!(mbc.read(0x4000), 1);

        mbc.write(0x2000, 0x07);
        assert_eq!(mbc.read(0x7fff), 7);
        assert_eq!(mbc.read(0x0000), 0);
    }

    #[test]
    fn rom_bank_register_keeps_five_bits() {
        let mut mbc = Mbc1::new(banked_rom(), 0);
        mbc.write(0x3fff, 0b1110_0011);
        assert_eq!(mbc.current_rom_bank(), 3);
    }

    #[test]
    fn upper_bits_select_high_banks_in_rom_mode() {
        let mut mbc = Mbc1::new(banked_rom(), 0);
        mbc.write(0x2000, 0x02);
        mbc.write(0x4000, 0x01);
        assert_eq!(mbc.read(0x4000), 0x22);

        // Bank $20 has zero low bits, so it reads as $21.
        mbc.write(0x2000, 0x00);
        assert_eq!(mbc.read(0x4000), 0x21);

        // Entering RAM mode drops the upper bits again.
        mbc.write(0x6000, 0x01);
        assert_eq!(mbc.read(0x4000), 0x01);
    }

    #[test]
    fn ram_requires_enable_latch() {
        let mut mbc = Mbc1::new(banked_rom(), 0x8000);
        mbc.write(0xa000, 0x55);
        assert_eq!(mbc.read(0xa000), OPEN_BUS);

        mbc.write(0x0000, 0x0a);
        mbc.write(0xa000, 0x55);
        assert_eq!(mbc.read(0xa000), 0x55);

        mbc.write(0x0000, 0x00);
        assert_eq!(mbc.read(0xa000), OPEN_BUS);
    }

    #[test]
    fn ram_banks_switch_only_in_ram_mode() {
        let mut mbc = Mbc1::new(banked_rom(), 0x8000);
        mbc.write(0x0000, 0x0a);
        mbc.write(0xa000, 0x10);

        mbc.write(0x6000, 0x01);
        mbc.write(0x4000, 0x02);
        assert_eq!(mbc.current_ram_bank(), 2);
        assert_eq!(mbc.read(0xa000), 0x00);
        mbc.write(0xa000, 0x12);

        // Back in ROM mode only bank 0 is reachable.
        mbc.write(0x6000, 0x00);
        assert_eq!(mbc.current_ram_bank(), 0);
        assert_eq!(mbc.read(0xa000), 0x10);
    }

    #[test]
    fn never_exposes_a_block() {
        let mbc = Mbc1::new(banked_rom(), 0x2000);
        assert!(mbc.block(0x0000).is_none());
        assert!(mbc.block(0xa000).is_none());
    }
}
