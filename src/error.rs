use crate::lr35902::sm83::{Instruction, Operand};
use snafu::prelude::*;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum GbError {
    #[snafu(display("Failed to decode instruction ({:02x}) at address: ${:04x}", opcode, address))]
    DecoderFailure { opcode: u8, address: u16 },
    #[snafu(display("Invalid instruction handler implementation: {}", instruction))]
    InvalidHandler { instruction: Instruction },
    #[snafu(display("Unresolved target: {:?}", target))]
    UnresolvedTarget { target: Operand },
    #[snafu(display("Failed to read ROM image {}", path.display()))]
    RomRead { path: PathBuf, source: std::io::Error },
    #[snafu(display("ROM image is too small to hold a cartridge header ({} bytes)", size))]
    TruncatedRom { size: usize },
    #[snafu(display("Unsupported cartridge type: ${:02x}", kind))]
    UnsupportedCartridge { kind: u8 },
    #[snafu(display("Boot ROM must be 256 bytes, got {}", size))]
    InvalidBootRom { size: usize },
    #[snafu(display("Emulation thread panicked"))]
    WorkerPanicked,
    #[snafu(display("Failed to install logger"))]
    LoggerInit { source: log::SetLoggerError },
    #[snafu(display("Display frontend failed: {}", message))]
    Frontend { message: String },
}
