use crate::memory::bus::{Addressable, BusAddress};
use crate::memory::registers::InterruptFlags;
use crate::memory::{INTERRUPT_ENABLE_REGISTER, INTERRUPT_FLAGS_REGISTER, OPEN_BUS};

/// IE and IF. Mapped twice, once at $FF0F and once at $FFFF.
///
/// Other components only ever call [`InterruptController::request`]; choosing which
/// request to service is left to the CPU.
#[derive(Debug, Default)]
pub struct InterruptController {
    enable: u8,
    flags: InterruptFlags,
}

impl InterruptController {
    pub fn new() -> InterruptController {
        InterruptController::default()
    }

    #[inline]
    pub fn request(&mut self, interrupt: InterruptFlags) {
        self.flags |= interrupt;
    }

    pub fn flags(&self) -> InterruptFlags {
        self.flags
    }
}

impl Addressable for InterruptController {
    fn get(&self, addr: BusAddress) -> u8 {
        match addr.address {
            INTERRUPT_FLAGS_REGISTER => 0b1110_0000 | self.flags.bits(),
            INTERRUPT_ENABLE_REGISTER => self.enable,
            _ => OPEN_BUS,
        }
    }

    fn set(&mut self, addr: BusAddress, value: u8) {
        match addr.address {
            INTERRUPT_FLAGS_REGISTER => self.flags = InterruptFlags::from(value),
            INTERRUPT_ENABLE_REGISTER => self.enable = value,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(address: u16) -> BusAddress {
        BusAddress { address, offset: 0 }
    }

    #[test]
    fn requests_accumulate() {
        let mut ic = InterruptController::new();
        ic.request(InterruptFlags::TIMER);
        ic.request(InterruptFlags::VBLANK);

        assert_eq!(ic.get(at(INTERRUPT_FLAGS_REGISTER)), 0b1110_0101);
        assert_eq!(ic.get(at(INTERRUPT_ENABLE_REGISTER)), 0x00);

        // The CPU clears a serviced request by writing IF back.
        ic.set(at(INTERRUPT_FLAGS_REGISTER), 0b1110_0001);
        assert_eq!(ic.flags(), InterruptFlags::VBLANK);
    }

    #[test]
    fn flag_writes_keep_only_five_bits() {
        let mut ic = InterruptController::new();
        ic.set(at(INTERRUPT_FLAGS_REGISTER), 0xff);
        assert_eq!(ic.flags().bits(), 0x1f);
        ic.set(at(INTERRUPT_ENABLE_REGISTER), 0xff);
        assert_eq!(ic.get(at(INTERRUPT_ENABLE_REGISTER)), 0xff);
    }
}
