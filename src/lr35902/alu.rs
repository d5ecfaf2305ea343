use crate::lr35902::cpu::Cpu;
use crate::lr35902::registers::Flags;

impl Cpu {
    /// ADD and ADC on A. `use_carry` selects ADC.
    pub(super) fn alu_add(&mut self, value: u8, use_carry: bool) {
        let a = self.registers.a;
        let carry_in = (use_carry && self.read_flag(Flags::CARRY)) as u8;

        let half = (a & 0x0f) + (value & 0x0f) + carry_in;
        let full = a as u16 + value as u16 + carry_in as u16;
        let result = full as u8;

        self.registers.a = result;
        self.registers.f = Flags::empty();
        self.set_flag(Flags::ZERO, result == 0);
        self.set_flag(Flags::HALF_CARRY, half > 0x0f);
        self.set_flag(Flags::CARRY, full > 0xff);
    }

    /// SUB and SBC on A. `use_carry` selects SBC.
    pub(super) fn alu_sub(&mut self, value: u8, use_carry: bool) {
        self.registers.a = self.subtract(value, use_carry);
    }

    /// CP is SUB without the write back.
    #[inline]
    pub(super) fn alu_cp(&mut self, value: u8) {
        self.subtract(value, false);
    }

    fn subtract(&mut self, value: u8, use_carry: bool) -> u8 {
        let a = self.registers.a;
        let carry_in = (use_carry && self.read_flag(Flags::CARRY)) as i16;

        let half = (a & 0x0f) as i16 - (value & 0x0f) as i16 - carry_in;
        let full = a as i16 - value as i16 - carry_in;
        let result = full as u8;

        self.registers.f = Flags::SUBTRACT;
        self.set_flag(Flags::ZERO, result == 0);
        self.set_flag(Flags::HALF_CARRY, half < 0);
        self.set_flag(Flags::CARRY, full < 0);
        result
    }

    #[inline]
    pub(super) fn alu_and(&mut self, value: u8) {
        self.registers.a &= value;
        self.registers.f = Flags::HALF_CARRY;
        self.set_flag(Flags::ZERO, self.registers.a == 0);
    }

    #[inline]
    pub(super) fn alu_or(&mut self, value: u8) {
        self.registers.a |= value;
        self.registers.f = Flags::empty();
        self.set_flag(Flags::ZERO, self.registers.a == 0);
    }

    #[inline]
    pub(super) fn alu_xor(&mut self, value: u8) {
        self.registers.a ^= value;
        self.registers.f = Flags::empty();
        self.set_flag(Flags::ZERO, self.registers.a == 0);
    }

    /// Leaves C untouched.
    #[inline]
    pub(super) fn alu_inc(&mut self, value: u8) -> u8 {
        let result = value.wrapping_add(1);
        self.set_flag(Flags::ZERO, result == 0);
        self.set_flag(Flags::SUBTRACT, false);
        self.set_flag(Flags::HALF_CARRY, value & 0x0f == 0x0f);
        result
    }

    /// Leaves C untouched.
    #[inline]
    pub(super) fn alu_dec(&mut self, value: u8) -> u8 {
        let result = value.wrapping_sub(1);
        self.set_flag(Flags::ZERO, result == 0);
        self.set_flag(Flags::SUBTRACT, true);
        self.set_flag(Flags::HALF_CARRY, value & 0x0f == 0);
        result
    }

    /// ADD HL, rr. Z is left alone, H and C come from bits 11 and 15.
    pub(super) fn alu_add16(&mut self, value: u16) {
        let hl = self.registers.hl();

        self.set_flag(Flags::SUBTRACT, false);
        self.set_flag(Flags::HALF_CARRY, (hl & 0x0fff) + (value & 0x0fff) > 0x0fff);
        self.set_flag(Flags::CARRY, hl as u32 + value as u32 > 0xffff);

        self.registers.set_hl(hl.wrapping_add(value));
    }

    /// SP plus a signed byte, shared by `add sp, e` and `ld hl, sp+e`.
    /// Flags are computed on the low byte as an unsigned addition.
    pub(super) fn alu_add_sp(&mut self, offset: i8) -> u16 {
        let sp = self.registers.sp;
        let offset = offset as i16 as u16;

        self.registers.f = Flags::empty();
        self.set_flag(Flags::HALF_CARRY, (sp & 0x000f) + (offset & 0x000f) > 0x000f);
        self.set_flag(Flags::CARRY, (sp & 0x00ff) + (offset & 0x00ff) > 0x00ff);
        sp.wrapping_add(offset)
    }

    /// Corrects A to packed BCD after an addition or subtraction. N is kept.
    pub(super) fn alu_daa(&mut self) {
        let mut a = self.registers.a;
        let mut adjust: u8 = if self.read_flag(Flags::CARRY) { 0x60 } else { 0x00 };
        if self.read_flag(Flags::HALF_CARRY) {
            adjust |= 0x06;
        }

        if !self.read_flag(Flags::SUBTRACT) {
            if a & 0x0f > 0x09 {
                adjust |= 0x06;
            }
            if a > 0x99 {
                adjust |= 0x60;
            }
            a = a.wrapping_add(adjust);
        } else {
            a = a.wrapping_sub(adjust);
        }

        self.set_flag(Flags::CARRY, adjust >= 0x60);
        self.set_flag(Flags::HALF_CARRY, false);
        self.set_flag(Flags::ZERO, a == 0);
        self.registers.a = a;
    }

    #[inline]
    fn shift_flags(&mut self, result: u8, carry: bool) -> u8 {
        self.registers.f = Flags::empty();
        self.set_flag(Flags::ZERO, result == 0);
        self.set_flag(Flags::CARRY, carry);
        result
    }

    pub(super) fn alu_rlc(&mut self, value: u8) -> u8 {
        self.shift_flags(value.rotate_left(1), value & 0x80 != 0)
    }

    pub(super) fn alu_rrc(&mut self, value: u8) -> u8 {
        self.shift_flags(value.rotate_right(1), value & 0x01 != 0)
    }

    pub(super) fn alu_rl(&mut self, value: u8) -> u8 {
        let carry = self.read_flag(Flags::CARRY) as u8;
        self.shift_flags((value << 1) | carry, value & 0x80 != 0)
    }

    pub(super) fn alu_rr(&mut self, value: u8) -> u8 {
        let carry = (self.read_flag(Flags::CARRY) as u8) << 7;
        self.shift_flags((value >> 1) | carry, value & 0x01 != 0)
    }

    pub(super) fn alu_sla(&mut self, value: u8) -> u8 {
        self.shift_flags(value << 1, value & 0x80 != 0)
    }

    /// Arithmetic shift, bit 7 is kept.
    pub(super) fn alu_sra(&mut self, value: u8) -> u8 {
        self.shift_flags((value >> 1) | (value & 0x80), value & 0x01 != 0)
    }

    pub(super) fn alu_srl(&mut self, value: u8) -> u8 {
        self.shift_flags(value >> 1, value & 0x01 != 0)
    }

    pub(super) fn alu_swap(&mut self, value: u8) -> u8 {
        self.shift_flags(value.rotate_left(4), false)
    }

    /// BIT n. C is left alone.
    pub(super) fn alu_bit(&mut self, bit: u8, value: u8) {
        self.set_flag(Flags::ZERO, value & (1 << bit) == 0);
        self.set_flag(Flags::SUBTRACT, false);
        self.set_flag(Flags::HALF_CARRY, true);
    }
}

#[cfg(test)]
mod tests {
    use crate::lr35902::cpu::Cpu;
    use crate::lr35902::registers::Flags;

    fn cpu_with(a: u8, f: Flags) -> Cpu {
        let mut cpu = Cpu::new();
        cpu.registers_mut().a = a;
        cpu.registers_mut().f = f;
        cpu
    }

    #[test]
    fn add_with_carry_sets_every_flag() {
        let mut cpu = cpu_with(0xff, Flags::CARRY);
        cpu.alu_add(0x00, true);
        assert_eq!(cpu.registers().a, 0x00);
        assert_eq!(cpu.registers().f, Flags::ZERO | Flags::HALF_CARRY | Flags::CARRY);
    }

    #[test]
    fn add_ignores_carry_without_adc() {
        let mut cpu = cpu_with(0x0f, Flags::CARRY);
        cpu.alu_add(0x01, false);
        assert_eq!(cpu.registers().a, 0x10);
        assert_eq!(cpu.registers().f, Flags::HALF_CARRY);
    }

    #[test]
    fn subtract_with_borrow() {
        let mut cpu = cpu_with(0x00, Flags::CARRY);
        cpu.alu_sub(0x00, true);
        assert_eq!(cpu.registers().a, 0xff);
        assert_eq!(cpu.registers().f, Flags::SUBTRACT | Flags::HALF_CARRY | Flags::CARRY);

        let mut cpu = cpu_with(0x3e, Flags::empty());
        cpu.alu_sub(0x3e, false);
        assert_eq!(cpu.registers().a, 0x00);
        assert_eq!(cpu.registers().f, Flags::ZERO | Flags::SUBTRACT);
    }

    #[test]
    fn compare_keeps_accumulator() {
        let mut cpu = cpu_with(0x10, Flags::empty());
        cpu.alu_cp(0x20);
        assert_eq!(cpu.registers().a, 0x10);
        assert_eq!(cpu.registers().f, Flags::SUBTRACT | Flags::CARRY);
    }

    #[test]
    fn decimal_adjust_after_add() {
        let mut cpu = cpu_with(0x45, Flags::empty());
        cpu.alu_add(0x38, false);
        cpu.alu_daa();
        assert_eq!(cpu.registers().a, 0x83);
        assert!(!cpu.read_flag(Flags::CARRY));

        let mut cpu = cpu_with(0x99, Flags::empty());
        cpu.alu_add(0x01, false);
        cpu.alu_daa();
        assert_eq!(cpu.registers().a, 0x00);
        assert_eq!(cpu.registers().f, Flags::ZERO | Flags::CARRY);
    }

    fn expected_flags(result: u8, subtract: bool, half: bool, carry: bool) -> Flags {
        let mut flags = Flags::empty();
        flags.set(Flags::ZERO, result == 0);
        flags.set(Flags::SUBTRACT, subtract);
        flags.set(Flags::HALF_CARRY, half);
        flags.set(Flags::CARRY, carry);
        flags
    }

    #[test]
    fn add_with_carry_matches_every_operand_pair() {
        for a in 0..=0xffu8 {
            for b in 0..=0xffu8 {
                for carry in [false, true] {
                    let flags = if carry { Flags::CARRY } else { Flags::empty() };
                    let mut cpu = cpu_with(a, flags);
                    cpu.alu_add(b, true);

                    let sum = a as u32 + b as u32 + carry as u32;
                    let result = sum as u8;
                    // Bit 4 of a ^ b ^ result is the carry out of the low nibble.
                    let half = (a ^ b ^ result) & 0x10 != 0;
                    assert_eq!(cpu.registers().a, result, "{:02x} + {:02x} + {}", a, b, carry);
                    assert_eq!(cpu.registers().f, expected_flags(result, false, half, sum > 0xff));
                }
            }
        }
    }

    #[test]
    fn subtract_with_carry_matches_every_operand_pair() {
        for a in 0..=0xffu8 {
            for b in 0..=0xffu8 {
                for carry in [false, true] {
                    let flags = if carry { Flags::CARRY } else { Flags::empty() };
                    let mut cpu = cpu_with(a, flags);
                    cpu.alu_sub(b, true);

                    let result = a.wrapping_sub(b).wrapping_sub(carry as u8);
                    let half = (a ^ b ^ result) & 0x10 != 0;
                    let borrow = (a as u32) < b as u32 + carry as u32;
                    assert_eq!(cpu.registers().a, result, "{:02x} - {:02x} - {}", a, b, carry);
                    assert_eq!(cpu.registers().f, expected_flags(result, true, half, borrow));
                }
            }
        }
    }

    fn bcd(value: u8) -> u8 {
        ((value / 10) << 4) | (value % 10)
    }

    #[test]
    fn decimal_adjust_round_trips_every_bcd_pair() {
        for x in 0..100u8 {
            for y in 0..100u8 {
                let mut cpu = cpu_with(bcd(x), Flags::empty());
                cpu.alu_add(bcd(y), false);
                cpu.alu_daa();
                let sum = (x as u16 + y as u16) % 100;
                assert_eq!(cpu.registers().a, bcd(sum as u8), "{} + {}", x, y);
                assert_eq!(cpu.read_flag(Flags::CARRY), x as u16 + y as u16 >= 100);
                assert_eq!(cpu.read_flag(Flags::ZERO), sum == 0);

                let mut cpu = cpu_with(bcd(x), Flags::empty());
                cpu.alu_sub(bcd(y), false);
                cpu.alu_daa();
                let difference = (x as i16 - y as i16).rem_euclid(100);
                assert_eq!(cpu.registers().a, bcd(difference as u8), "{} - {}", x, y);
                assert_eq!(cpu.read_flag(Flags::CARRY), x < y);
                assert_eq!(cpu.read_flag(Flags::ZERO), difference == 0);
            }
        }
    }

    #[test]
    fn decimal_adjust_after_subtract() {
        let mut cpu = cpu_with(0x42, Flags::empty());
        cpu.alu_sub(0x15, false);
        cpu.alu_daa();
        assert_eq!(cpu.registers().a, 0x27);
        assert!(cpu.read_flag(Flags::SUBTRACT));
    }

    #[test]
    fn increment_preserves_carry() {
        let mut cpu = cpu_with(0x00, Flags::CARRY);
        assert_eq!(cpu.alu_inc(0xff), 0x00);
        assert_eq!(cpu.registers().f, Flags::ZERO | Flags::HALF_CARRY | Flags::CARRY);
        assert_eq!(cpu.alu_dec(0x10), 0x0f);
        assert_eq!(cpu.registers().f, Flags::SUBTRACT | Flags::HALF_CARRY | Flags::CARRY);
    }

    #[test]
    fn rotates_through_carry_or_around() {
        let mut cpu = cpu_with(0x00, Flags::empty());
        assert_eq!(cpu.alu_rlc(0x85), 0x0b);
        assert!(cpu.read_flag(Flags::CARRY));
        assert_eq!(cpu.alu_rl(0x00), 0x01);
        assert!(!cpu.read_flag(Flags::CARRY));
        assert!(!cpu.read_flag(Flags::ZERO));

        assert_eq!(cpu.alu_rr(0x01), 0x00);
        assert_eq!(cpu.registers().f, Flags::ZERO | Flags::CARRY);
        assert_eq!(cpu.alu_rrc(0x01), 0x80);
        assert_eq!(cpu.alu_sra(0x81), 0xc0);
        assert_eq!(cpu.alu_srl(0x81), 0x40);
        assert_eq!(cpu.alu_swap(0xf1), 0x1f);
        assert!(!cpu.read_flag(Flags::CARRY));
    }

    #[test]
    fn stack_offset_flags_use_low_byte() {
        let mut cpu = Cpu::new();
        cpu.registers_mut().sp = 0xfff8;
        assert_eq!(cpu.alu_add_sp(0x08), 0x0000);
        assert_eq!(cpu.registers().f, Flags::HALF_CARRY | Flags::CARRY);

        cpu.registers_mut().sp = 0x0001;
        assert_eq!(cpu.alu_add_sp(-2), 0xffff);
        assert_eq!(cpu.registers().f, Flags::empty());
    }

    #[test]
    fn sixteen_bit_add_keeps_zero() {
        let mut cpu = cpu_with(0x00, Flags::ZERO);
        cpu.registers_mut().set_hl(0x0fff);
        cpu.alu_add16(0x0001);
        assert_eq!(cpu.registers().hl(), 0x1000);
        assert_eq!(cpu.registers().f, Flags::ZERO | Flags::HALF_CARRY);
    }
}
