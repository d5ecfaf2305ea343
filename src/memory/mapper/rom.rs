use crate::memory::mapper::Mapper;
use crate::memory::{EXTERNAL_RAM_END, EXTERNAL_RAM_START, OPEN_BUS, ROM_END};
use log::warn;

/// Cartridges without a controller: 32 KiB of ROM and optionally one fixed RAM bank.
#[derive(Clone)]
pub struct Rom {
    memory: Vec<u8>,
    ram: Vec<u8>,
}

impl Rom {
    pub fn new(memory: Vec<u8>, ram_size: usize) -> Rom {
        Rom {
            memory,
            ram: vec![0; ram_size.min(0x2000)],
        }
    }
}

impl Mapper for Rom {
    #[inline]
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=ROM_END => self.memory.get(addr as usize).copied().unwrap_or(OPEN_BUS),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self
                .ram
                .get((addr - EXTERNAL_RAM_START) as usize)
                .copied()
                .unwrap_or(OPEN_BUS),
            _ => OPEN_BUS,
        }
    }

    #[inline]
    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => {
                if let Some(cell) = self.ram.get_mut((addr - EXTERNAL_RAM_START) as usize) {
                    *cell = data;
                }
            }
            // We simply only have a ROM. Writing to it does nothing.
            _ => warn!("ROM: write to read-only memory ignored: ${:04x} <- ${:02x}", addr, data),
        }
    }

    fn block(&self, addr: u16) -> Option<&[u8]> {
        match addr {
            0x0000..=ROM_END => self.memory.get(addr as usize..),
            EXTERNAL_RAM_START..=EXTERNAL_RAM_END => self.ram.get((addr - EXTERNAL_RAM_START) as usize..),
            _ => None,
        }
    }

    #[inline]
    fn name(&self) -> String {
        String::from("ROM")
    }
}
