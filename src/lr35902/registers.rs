use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u8 {
        const ZERO       = 0b1000_0000;
        const SUBTRACT   = 0b0100_0000;
        const HALF_CARRY = 0b0010_0000;
        const CARRY      = 0b0001_0000;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    pub a: u8,
    pub f: Flags,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,
    pub sp: u16,
    pub pc: u16,
}

impl Registers {
    /// The state the DMG boot ROM leaves behind when it hands over to the cartridge.
    pub fn post_boot() -> Registers {
        let mut registers = Registers::default();
        registers.set_af(0x01b0);
        registers.set_bc(0x0013);
        registers.set_de(0x00d8);
        registers.set_hl(0x014d);
        registers.sp = 0xfffe;
        registers.pc = 0x0100;
        registers
    }

    #[inline]
    pub fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f.bits()])
    }

    #[inline]
    pub fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[inline]
    pub fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[inline]
    pub fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    /// The low nibble of F does not exist in hardware and always reads back as zero.
    #[inline]
    pub fn set_af(&mut self, value: u16) {
        let [a, f] = value.to_be_bytes();
        self.a = a;
        self.f = Flags::from_bits_truncate(f);
    }

    #[inline]
    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    #[inline]
    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    #[inline]
    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "A: ${:02x}  F: ${:02x}  B: ${:02x}  C: ${:02x}  D: ${:02x}  E: ${:02x}  H: ${:02x}  L: ${:02x}  SP: ${:04x}  PC: ${:04x}",
            self.a,
            self.f.bits(),
            self.b,
            self.c,
            self.d,
            self.e,
            self.h,
            self.l,
            self.sp,
            self.pc
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_high_byte_first() {
        let mut registers = Registers::default();
        registers.set_bc(0x1234);
        assert_eq!((registers.b, registers.c), (0x12, 0x34));
        assert_eq!(registers.bc(), 0x1234);

        registers.set_hl(0xbeef);
        assert_eq!(registers.h, 0xbe);
        assert_eq!(registers.hl(), 0xbeef);
    }

    #[test]
    fn flag_low_nibble_reads_zero() {
        let mut registers = Registers::default();
        registers.set_af(0x12ff);
        assert_eq!(registers.af(), 0x12f0);
    }

    #[test]
    fn post_boot_state() {
        let registers = Registers::post_boot();
        assert_eq!(registers.af(), 0x01b0);
        assert_eq!(registers.de(), 0x00d8);
        assert_eq!(registers.pc, 0x0100);
        assert_eq!(registers.sp, 0xfffe);
    }
}
