pub mod bus;
pub mod interrupts;
pub mod mapper;
pub mod ram;
pub mod registers;

pub const BOOTROM_START: u16 = 0x0000;
pub const BOOTROM_END: u16 = 0x00ff;
pub const BOOTROM_SIZE: usize = 0x100;

pub const ROM_START: u16 = 0x0000;
pub const ROM_END: u16 = 0x7fff;
pub const VRAM_START: u16 = 0x8000;
pub const VRAM_END: u16 = 0x9fff;
pub const EXTERNAL_RAM_START: u16 = 0xa000;
pub const EXTERNAL_RAM_END: u16 = 0xbfff;
pub const WRAM_START: u16 = 0xc000;
pub const WRAM_END: u16 = 0xdfff;
pub const ECHO_RAM_START: u16 = 0xe000;
pub const ECHO_RAM_END: u16 = 0xfdff;
pub const OAM_START: u16 = 0xfe00;
pub const OAM_END: u16 = 0xfe9f;
pub const HRAM_START: u16 = 0xff80;
pub const HRAM_END: u16 = 0xfffe;

pub const VRAM_SIZE: usize = 0x2000;
pub const WRAM_SIZE: usize = 0x2000;
pub const OAM_SIZE: usize = 0xa0;
pub const HRAM_SIZE: usize = 0x7f;

pub const JOYPAD_REGISTER: u16 = 0xff00;
pub const SERIAL_DATA_REGISTER: u16 = 0xff01;
pub const SERIAL_CONTROL_REGISTER: u16 = 0xff02;
pub const DIV_REGISTER: u16 = 0xff04;
pub const TIMA_REGISTER: u16 = 0xff05;
pub const TMA_REGISTER: u16 = 0xff06;
pub const TAC_REGISTER: u16 = 0xff07;
pub const INTERRUPT_FLAGS_REGISTER: u16 = 0xff0f;
pub const OAM_DMA_REGISTER: u16 = 0xff46;
pub const BOOTROM_MAPPER_REGISTER: u16 = 0xff50;
pub const INTERRUPT_ENABLE_REGISTER: u16 = 0xffff;

/// Value seen on reads nobody answers.
pub const OPEN_BUS: u8 = 0xff;
