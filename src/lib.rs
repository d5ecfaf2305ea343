pub mod cartridge;
pub mod error;
pub mod gameboy;
pub mod joypad;
pub mod lr35902;
pub mod memory;
pub mod scheduler;
pub mod serial;
pub mod video;

#[cfg(test)]
mod tests;
