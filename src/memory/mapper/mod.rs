use dyn_clone::DynClone;

pub mod mbc1;
pub mod rom;

pub const ROM_BANK_SIZE: usize = 0x4000;
pub const RAM_BANK_SIZE: usize = 0x2000;

/// A cartridge memory controller. Controllers see raw bus addresses because their
/// control registers are decoded from the address lines, not from an offset.
pub trait Mapper: DynClone + Send {
    fn read(&self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, data: u8);
    fn name(&self) -> String;

    /// Controllers that bank their storage cannot hand out a stable slice.
    fn block(&self, _addr: u16) -> Option<&[u8]> {
        None
    }
}

dyn_clone::clone_trait_object!(Mapper);
