use crate::error::{GbError, InvalidBootRomSnafu};
use crate::memory::bus::{lock, Addressable, BusAddress};
use crate::memory::{BOOTROM_SIZE, OPEN_BUS};
use log::{debug, warn};
use snafu::ensure;
use std::sync::{Arc, Mutex};

/// Plain read/write storage whose size is decided at construction.
#[derive(Clone)]
pub struct Ram {
    memory: Vec<u8>,
}

impl Ram {
    pub fn new(size: usize) -> Ram {
        Ram { memory: vec![0; size] }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.memory
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.memory
    }
}

impl Addressable for Ram {
    #[inline]
    fn get(&self, addr: BusAddress) -> u8 {
        self.memory.get(addr.offset as usize).copied().unwrap_or(OPEN_BUS)
    }

    #[inline]
    fn set(&mut self, addr: BusAddress, value: u8) {
        if let Some(cell) = self.memory.get_mut(addr.offset as usize) {
            *cell = value;
        }
    }

    fn block(&self, addr: BusAddress) -> Option<&[u8]> {
        self.memory.get(addr.offset as usize..)
    }
}

// The last instruction of the boot ROM writes to $FF50, which unmaps it.
// Execution then continues into the cartridge entrypoint at $0100.
#[derive(Clone)]
pub struct BootRom {
    rom: Vec<u8>,
    mapped: bool,
}

impl BootRom {
    pub fn new(rom: Vec<u8>) -> Result<BootRom, GbError> {
        ensure!(rom.len() == BOOTROM_SIZE, InvalidBootRomSnafu { size: rom.len() });
        Ok(BootRom { rom, mapped: true })
    }

    pub fn unmap(&mut self) {
        if self.mapped {
            debug!("Boot ROM unmapped");
        }
        self.mapped = false;
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }
}

impl Addressable for BootRom {
    fn get(&self, addr: BusAddress) -> u8 {
        self.rom.get(addr.offset as usize).copied().unwrap_or(OPEN_BUS)
    }

    fn set(&mut self, addr: BusAddress, value: u8) {
        warn!("Write to boot ROM ignored: ${:04x} <- ${:02x}", addr.address, value);
    }

    fn block(&self, addr: BusAddress) -> Option<&[u8]> {
        self.rom.get(addr.offset as usize..)
    }

    fn enabled(&self) -> bool {
        self.mapped
    }
}

/// The latch at $FF50. Any write unmaps the boot ROM for the rest of the session.
pub struct BootRomSwitch {
    bootrom: Arc<Mutex<BootRom>>,
}

impl BootRomSwitch {
    pub fn new(bootrom: Arc<Mutex<BootRom>>) -> BootRomSwitch {
        BootRomSwitch { bootrom }
    }
}

impl Addressable for BootRomSwitch {
    fn get(&self, _addr: BusAddress) -> u8 {
        OPEN_BUS
    }

    fn set(&mut self, _addr: BusAddress, _value: u8) {
        lock(&self.bootrom).unmap();
    }
}
