use crate::error::{GbError, RomReadSnafu, TruncatedRomSnafu, UnsupportedCartridgeSnafu};
use crate::memory::bus::{Addressable, BusAddress};
use crate::memory::mapper::mbc1::Mbc1;
use crate::memory::mapper::rom::Rom;
use crate::memory::mapper::Mapper;
use log::{info, warn};
use snafu::{ensure, ResultExt};
use std::fmt;
use std::fs;
use std::path::Path;

const TITLE_START: usize = 0x0134;
const TITLE_END: usize = 0x0142;
const CARTRIDGE_TYPE: usize = 0x0147;
const ROM_SIZE: usize = 0x0148;
const RAM_SIZE: usize = 0x0149;
const HEADER_CHECKSUM: usize = 0x014d;
const GLOBAL_CHECKSUM: usize = 0x014e;
const HEADER_END: usize = 0x0150;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartridgeKind {
    RomOnly,
    RomRam,
    RomRamBattery,
    Mbc1,
    Mbc1Ram,
    Mbc1RamBattery,
}

impl TryFrom<u8> for CartridgeKind {
    type Error = GbError;

    fn try_from(kind: u8) -> Result<Self, Self::Error> {
        match kind {
            0x00 => Ok(CartridgeKind::RomOnly),
            0x01 => Ok(CartridgeKind::Mbc1),
            0x02 => Ok(CartridgeKind::Mbc1Ram),
            0x03 => Ok(CartridgeKind::Mbc1RamBattery),
            0x08 => Ok(CartridgeKind::RomRam),
            0x09 => Ok(CartridgeKind::RomRamBattery),
            _ => UnsupportedCartridgeSnafu { kind }.fail(),
        }
    }
}

impl fmt::Display for CartridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartridgeKind::RomOnly => write!(f, "ROM ONLY"),
            CartridgeKind::RomRam => write!(f, "ROM+RAM"),
            CartridgeKind::RomRamBattery => write!(f, "ROM+RAM+BATTERY"),
            CartridgeKind::Mbc1 => write!(f, "MBC1"),
            CartridgeKind::Mbc1Ram => write!(f, "MBC1+RAM"),
            CartridgeKind::Mbc1RamBattery => write!(f, "MBC1+RAM+BATTERY"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CartridgeHeader {
    pub title: String,
    pub kind: CartridgeKind,
    pub rom_size: usize,
    pub ram_size: usize,
    pub header_checksum: u8,
    pub global_checksum: u16,
}

impl CartridgeHeader {
    pub fn parse(rom: &[u8]) -> Result<CartridgeHeader, GbError> {
        ensure!(rom.len() >= HEADER_END, TruncatedRomSnafu { size: rom.len() });

        let title = String::from_utf8_lossy(&rom[TITLE_START..=TITLE_END])
            .trim_end_matches('\0')
            .trim()
            .to_string();

        let kind = CartridgeKind::try_from(rom[CARTRIDGE_TYPE])?;
        let rom_size = (32 * 1024) << rom[ROM_SIZE].min(8);
        let ram_size = match rom[RAM_SIZE] {
            0x01 => 2 * 1024,
            0x02 => 8 * 1024,
            0x03 => 32 * 1024,
            0x04 => 128 * 1024,
            0x05 => 64 * 1024,
            _ => 0,
        };

        Ok(CartridgeHeader {
            title,
            kind,
            rom_size,
            ram_size,
            header_checksum: rom[HEADER_CHECKSUM],
            global_checksum: u16::from_be_bytes([rom[GLOBAL_CHECKSUM], rom[GLOBAL_CHECKSUM + 1]]),
        })
    }

    /// The value the boot ROM checks against $014D.
    pub fn compute_checksum(rom: &[u8]) -> u8 {
        rom[TITLE_START..HEADER_CHECKSUM]
            .iter()
            .fold(0u8, |x, byte| x.wrapping_sub(*byte).wrapping_sub(1))
    }
}

/// A loaded cartridge. Mapped at both $0000-$7FFF and $A000-$BFFF; the controller
/// tells the two apart by the raw address.
#[derive(Clone)]
pub struct Cartridge {
    header: CartridgeHeader,
    mapper: Box<dyn Mapper>,
}

impl Cartridge {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Cartridge, GbError> {
        let path = path.as_ref();
        let rom = fs::read(path).context(RomReadSnafu { path })?;
        Cartridge::from_bytes(rom)
    }

    pub fn from_bytes(rom: Vec<u8>) -> Result<Cartridge, GbError> {
        let header = CartridgeHeader::parse(&rom)?;

        let checksum = CartridgeHeader::compute_checksum(&rom);
        if checksum != header.header_checksum {
            warn!(
                "Header checksum mismatch: expected ${:02x}, computed ${:02x}",
                header.header_checksum, checksum
            );
        }

        if rom.len() != header.rom_size {
            warn!("ROM image is {} bytes, header declares {}", rom.len(), header.rom_size);
        }

        let mapper: Box<dyn Mapper> = match header.kind {
            CartridgeKind::RomOnly => Box::new(Rom::new(rom, 0)),
            CartridgeKind::RomRam | CartridgeKind::RomRamBattery => Box::new(Rom::new(rom, header.ram_size)),
            CartridgeKind::Mbc1 => Box::new(Mbc1::new(rom, 0)),
            CartridgeKind::Mbc1Ram | CartridgeKind::Mbc1RamBattery => Box::new(Mbc1::new(rom, header.ram_size)),
        };

        info!(
            "Loaded \"{}\": {} ({} controller), {} KiB ROM, {} KiB RAM",
            header.title,
            header.kind,
            mapper.name(),
            header.rom_size / 1024,
            header.ram_size / 1024
        );

        Ok(Cartridge { header, mapper })
    }

    pub fn header(&self) -> &CartridgeHeader {
        &self.header
    }

    pub fn mapper(&self) -> &dyn Mapper {
        self.mapper.as_ref()
    }
}

impl Addressable for Cartridge {
    #[inline]
    fn get(&self, addr: BusAddress) -> u8 {
        self.mapper.read(addr.address)
    }

    #[inline]
    fn set(&mut self, addr: BusAddress, value: u8) {
        self.mapper.write(addr.address, value);
    }

    fn block(&self, addr: BusAddress) -> Option<&[u8]> {
        self.mapper.block(addr.address)
    }
}
