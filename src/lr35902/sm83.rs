use crate::error::{DecoderFailureSnafu, GbError};
use crate::memory::bus::Bus;
use bitflags::bitflags;

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Register {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    AF,
    BC,
    DE,
    HL,
    SP,
}

bitflags! {
    #[derive(PartialEq, Eq, Debug, Clone, Copy)]
    pub struct AddressingMode: u8 {
        const DIRECT    = 0b0001;
        const INDIRECT  = 0b0010;
        const INCREMENT = 0b0100;
        const DECREMENT = 0b1000;
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Condition {
    None,
    NZ,
    Z,
    NC,
    C,
}

/// `Reg8(C, INDIRECT)` and `Imm8(_, INDIRECT)` address the $FF00 page.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Operand {
    Reg8(Register, AddressingMode),
    Reg16(Register, AddressingMode),
    Imm8(u8, AddressingMode),
    Imm16(u16, AddressingMode),
    Conditional(Condition),
    DisplacedReg16(Register, i8),
    Offset(i8),
    Bit(u8),
    Vector(u16),
}

#[derive(PartialEq, Eq, Debug, Copy, Clone)]
pub enum Opcode {
    Nop,
    Ld,
    Ldh,
    Inc,
    Dec,
    Add,
    Adc,
    Sub,
    Sbc,
    And,
    Xor,
    Or,
    Cp,
    Rlca,
    Rrca,
    Rla,
    Rra,
    Daa,
    Cpl,
    Scf,
    Ccf,
    Jr,
    Jp,
    Call,
    Ret,
    Reti,
    Rst,
    Push,
    Pop,
    Halt,
    Stop,
    Di,
    Ei,
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    Swap,
    Srl,
    Bit,
    Res,
    Set,
}

/// A decoded instruction. `cycles.1` is the cost when a branch condition fails.
#[derive(Debug, Clone)]
pub struct Instruction {
    pub opcode: Opcode,
    pub lhs: Option<Operand>,
    pub rhs: Option<Operand>,
    pub length: usize,
    pub cycles: (usize, Option<usize>),
}

impl Instruction {
    fn new(opcode: Opcode, lhs: Option<Operand>, rhs: Option<Operand>, length: usize, cycles: usize) -> Instruction {
        Instruction {
            opcode,
            lhs,
            rhs,
            length,
            cycles: (cycles, None),
        }
    }

    fn branch(opcode: Opcode, lhs: Operand, rhs: Option<Operand>, length: usize, taken: usize, skipped: usize) -> Instruction {
        let cycles = match lhs {
            Operand::Conditional(Condition::None) => (taken, None),
            _ => (taken, Some(skipped)),
        };

        Instruction {
            opcode,
            lhs: Some(lhs),
            rhs,
            length,
            cycles,
        }
    }
}

const A: Operand = Operand::Reg8(Register::A, AddressingMode::DIRECT);
const HL: Operand = Operand::Reg16(Register::HL, AddressingMode::DIRECT);
const SP: Operand = Operand::Reg16(Register::SP, AddressingMode::DIRECT);

pub struct Sm83;

impl Sm83 {
    /// Decodes the instruction at `pc` without side effects on the bus.
    pub fn decode(bus: &Bus, pc: u16) -> Result<Instruction, GbError> {
        let opcode = bus.get(pc);
        if opcode == 0xcb {
            return Ok(Sm83::decode_prefixed(bus.get(pc.wrapping_add(1))));
        }

        let imm8 = || bus.get(pc.wrapping_add(1));
        let imm16 = || bus.read16(pc.wrapping_add(1));

        let x = opcode >> 6;
        let y = (opcode >> 3) & 0b111;
        let z = opcode & 0b111;
        let p = y >> 1;
        let q = y & 0b1;

        let instruction = match (x, z) {
            (0, 0) => match y {
                0 => Instruction::new(Opcode::Nop, None, None, 1, 4),
                1 => Instruction::new(
                    Opcode::Ld,
                    Some(Operand::Imm16(imm16(), AddressingMode::INDIRECT)),
                    Some(SP),
                    3,
                    20,
                ),
                // STOP behaves as HALT and consumes only its opcode byte.
                2 => Instruction::new(Opcode::Stop, None, None, 1, 4),
                3 => Instruction::branch(
                    Opcode::Jr,
                    Operand::Conditional(Condition::None),
                    Some(Operand::Offset(imm8() as i8)),
                    2,
                    12,
                    8,
                ),
                _ => Instruction::branch(
                    Opcode::Jr,
                    Operand::Conditional(Sm83::lookup_condition(y - 4)),
                    Some(Operand::Offset(imm8() as i8)),
                    2,
                    12,
                    8,
                ),
            },
            (0, 1) if q == 0 => Instruction::new(
                Opcode::Ld,
                Some(Sm83::lookup_register_16(p)),
                Some(Operand::Imm16(imm16(), AddressingMode::DIRECT)),
                3,
                12,
            ),
            (0, 1) => Instruction::new(Opcode::Add, Some(HL), Some(Sm83::lookup_register_16(p)), 1, 8),
            (0, 2) => {
                let memory = match p {
                    0 => Operand::Reg16(Register::BC, AddressingMode::INDIRECT),
                    1 => Operand::Reg16(Register::DE, AddressingMode::INDIRECT),
                    2 => Operand::Reg16(Register::HL, AddressingMode::INDIRECT | AddressingMode::INCREMENT),
                    _ => Operand::Reg16(Register::HL, AddressingMode::INDIRECT | AddressingMode::DECREMENT),
                };
                if q == 0 {
                    Instruction::new(Opcode::Ld, Some(memory), Some(A), 1, 8)
                } else {
                    Instruction::new(Opcode::Ld, Some(A), Some(memory), 1, 8)
                }
            }
            (0, 3) if q == 0 => Instruction::new(Opcode::Inc, Some(Sm83::lookup_register_16(p)), None, 1, 8),
            (0, 3) => Instruction::new(Opcode::Dec, Some(Sm83::lookup_register_16(p)), None, 1, 8),
            (0, 4) => {
                let (operand, cycles) = Sm83::decode_8bit_operand(y, 4, 12);
                Instruction::new(Opcode::Inc, Some(operand), None, 1, cycles)
            }
            (0, 5) => {
                let (operand, cycles) = Sm83::decode_8bit_operand(y, 4, 12);
                Instruction::new(Opcode::Dec, Some(operand), None, 1, cycles)
            }
            (0, 6) => {
                let (operand, cycles) = Sm83::decode_8bit_operand(y, 8, 12);
                Instruction::new(
                    Opcode::Ld,
                    Some(operand),
                    Some(Operand::Imm8(imm8(), AddressingMode::DIRECT)),
                    2,
                    cycles,
                )
            }
            (0, _) => {
                let opcode = match y {
                    0 => Opcode::Rlca,
                    1 => Opcode::Rrca,
                    2 => Opcode::Rla,
                    3 => Opcode::Rra,
                    4 => Opcode::Daa,
                    5 => Opcode::Cpl,
                    6 => Opcode::Scf,
                    _ => Opcode::Ccf,
                };
                Instruction::new(opcode, None, None, 1, 4)
            }
            (1, 6) if y == 6 => Instruction::new(Opcode::Halt, None, None, 1, 4),
            (1, _) => {
                let (dst, dst_cycles) = Sm83::decode_8bit_operand(y, 4, 8);
                let (src, src_cycles) = Sm83::decode_8bit_operand(z, 4, 8);
                Instruction::new(Opcode::Ld, Some(dst), Some(src), 1, dst_cycles.max(src_cycles))
            }
            (2, _) => {
                let (src, cycles) = Sm83::decode_8bit_operand(z, 4, 8);
                Instruction::new(Sm83::lookup_alu(y), Some(A), Some(src), 1, cycles)
            }
            (3, 0) => match y {
                0..=3 => Instruction::branch(
                    Opcode::Ret,
                    Operand::Conditional(Sm83::lookup_condition(y)),
                    None,
                    1,
                    20,
                    8,
                ),
                4 => Instruction::new(
                    Opcode::Ldh,
                    Some(Operand::Imm8(imm8(), AddressingMode::INDIRECT)),
                    Some(A),
                    2,
                    12,
                ),
                5 => Instruction::new(Opcode::Add, Some(SP), Some(Operand::Offset(imm8() as i8)), 2, 16),
                6 => Instruction::new(
                    Opcode::Ldh,
                    Some(A),
                    Some(Operand::Imm8(imm8(), AddressingMode::INDIRECT)),
                    2,
                    12,
                ),
                _ => Instruction::new(
                    Opcode::Ld,
                    Some(HL),
                    Some(Operand::DisplacedReg16(Register::SP, imm8() as i8)),
                    2,
                    12,
                ),
            },
            (3, 1) if q == 0 => Instruction::new(Opcode::Pop, Some(Sm83::lookup_register_16_stack(p)), None, 1, 12),
            (3, 1) => match p {
                0 => Instruction::branch(Opcode::Ret, Operand::Conditional(Condition::None), None, 1, 16, 16),
                1 => Instruction::new(Opcode::Reti, None, None, 1, 16),
                2 => Instruction::branch(
                    Opcode::Jp,
                    Operand::Conditional(Condition::None),
                    Some(Operand::Reg16(Register::HL, AddressingMode::DIRECT)),
                    1,
                    4,
                    4,
                ),
                _ => Instruction::new(Opcode::Ld, Some(SP), Some(HL), 1, 8),
            },
            (3, 2) => match y {
                0..=3 => Instruction::branch(
                    Opcode::Jp,
                    Operand::Conditional(Sm83::lookup_condition(y)),
                    Some(Operand::Imm16(imm16(), AddressingMode::DIRECT)),
                    3,
                    16,
                    12,
                ),
                4 => Instruction::new(
                    Opcode::Ld,
                    Some(Operand::Reg8(Register::C, AddressingMode::INDIRECT)),
                    Some(A),
                    1,
                    8,
                ),
                5 => Instruction::new(
                    Opcode::Ld,
                    Some(Operand::Imm16(imm16(), AddressingMode::INDIRECT)),
                    Some(A),
                    3,
                    16,
                ),
                6 => Instruction::new(
                    Opcode::Ld,
                    Some(A),
                    Some(Operand::Reg8(Register::C, AddressingMode::INDIRECT)),
                    1,
                    8,
                ),
                _ => Instruction::new(
                    Opcode::Ld,
                    Some(A),
                    Some(Operand::Imm16(imm16(), AddressingMode::INDIRECT)),
                    3,
                    16,
                ),
            },
            (3, 3) if y == 0 => Instruction::branch(
                Opcode::Jp,
                Operand::Conditional(Condition::None),
                Some(Operand::Imm16(imm16(), AddressingMode::DIRECT)),
                3,
                16,
                16,
            ),
            (3, 3) if y == 6 => Instruction::new(Opcode::Di, None, None, 1, 4),
            (3, 3) if y == 7 => Instruction::new(Opcode::Ei, None, None, 1, 4),
            (3, 4) if y <= 3 => Instruction::branch(
                Opcode::Call,
                Operand::Conditional(Sm83::lookup_condition(y)),
                Some(Operand::Imm16(imm16(), AddressingMode::DIRECT)),
                3,
                24,
                12,
            ),
            (3, 5) if q == 0 => Instruction::new(Opcode::Push, Some(Sm83::lookup_register_16_stack(p)), None, 1, 16),
            (3, 5) if p == 0 => Instruction::branch(
                Opcode::Call,
                Operand::Conditional(Condition::None),
                Some(Operand::Imm16(imm16(), AddressingMode::DIRECT)),
                3,
                24,
                24,
            ),
            (3, 6) => Instruction::new(
                Sm83::lookup_alu(y),
                Some(A),
                Some(Operand::Imm8(imm8(), AddressingMode::DIRECT)),
                2,
                8,
            ),
            (3, 7) => Instruction::new(Opcode::Rst, Some(Operand::Vector(y as u16 * 8)), None, 1, 16),
            _ => return DecoderFailureSnafu { opcode, address: pc }.fail(),
        };

        Ok(instruction)
    }

    /// The $CB table has no holes.
    fn decode_prefixed(opcode: u8) -> Instruction {
        let x = opcode >> 6;
        let y = (opcode >> 3) & 0b111;
        let z = opcode & 0b111;

        let (target, cycles) = Sm83::decode_8bit_operand(z, 8, 16);
        match x {
            0 => {
                let opcode = match y {
                    0 => Opcode::Rlc,
                    1 => Opcode::Rrc,
                    2 => Opcode::Rl,
                    3 => Opcode::Rr,
                    4 => Opcode::Sla,
                    5 => Opcode::Sra,
                    6 => Opcode::Swap,
                    _ => Opcode::Srl,
                };
                Instruction::new(opcode, Some(target), None, 2, cycles)
            }
            1 => {
                let cycles = if z == 0b110 { 12 } else { 8 };
                Instruction::new(Opcode::Bit, Some(Operand::Bit(y)), Some(target), 2, cycles)
            }
            2 => Instruction::new(Opcode::Res, Some(Operand::Bit(y)), Some(target), 2, cycles),
            _ => Instruction::new(Opcode::Set, Some(Operand::Bit(y)), Some(target), 2, cycles),
        }
    }

    fn lookup_register(data: u8) -> Register {
        match data {
            0b000 => Register::B,
            0b001 => Register::C,
            0b010 => Register::D,
            0b011 => Register::E,
            0b100 => Register::H,
            0b101 => Register::L,
            _ => Register::A,
        }
    }

    fn lookup_register_16(data: u8) -> Operand {
        let register = match data {
            0b00 => Register::BC,
            0b01 => Register::DE,
            0b10 => Register::HL,
            _ => Register::SP,
        };
        Operand::Reg16(register, AddressingMode::DIRECT)
    }

    /// PUSH and POP swap SP for AF.
    fn lookup_register_16_stack(data: u8) -> Operand {
        match data {
            0b11 => Operand::Reg16(Register::AF, AddressingMode::DIRECT),
            _ => Sm83::lookup_register_16(data),
        }
    }

    fn lookup_condition(data: u8) -> Condition {
        match data {
            0b00 => Condition::NZ,
            0b01 => Condition::Z,
            0b10 => Condition::NC,
            _ => Condition::C,
        }
    }

    fn lookup_alu(data: u8) -> Opcode {
        match data {
            0 => Opcode::Add,
            1 => Opcode::Adc,
            2 => Opcode::Sub,
            3 => Opcode::Sbc,
            4 => Opcode::And,
            5 => Opcode::Xor,
            6 => Opcode::Or,
            _ => Opcode::Cp,
        }
    }

    fn decode_8bit_operand(value: u8, base_cycles: usize, hl_cycles: usize) -> (Operand, usize) {
        if value == 0b110 {
            (Operand::Reg16(Register::HL, AddressingMode::INDIRECT), hl_cycles)
        } else {
            (
                Operand::Reg8(Sm83::lookup_register(value), AddressingMode::DIRECT),
                base_cycles,
            )
        }
    }
}

impl std::fmt::Display for Instruction {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut output = format!("{:?}", self.opcode).to_lowercase();

        let mut ignore_destination = false;
        if let Some(destination) = &self.lhs {
            match destination {
                Operand::Conditional(Condition::None) => ignore_destination = true,
                _ => output.push_str(&format!(" {}", destination)),
            };
        }

        if let Some(source) = &self.rhs {
            if !ignore_destination {
                output.push_str(&format!(", {}", source));
            } else {
                output.push_str(&format!(" {}", source));
            }
        }

        write!(f, "{}", output)
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let output = format!("{:?}", self).to_lowercase();
        write!(f, "{}", output)
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Operand::Reg8(reg, mode) if mode.contains(AddressingMode::INDIRECT) => write!(f, "({})", reg),
            Operand::Reg8(reg, _) => write!(f, "{}", reg),
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::INCREMENT) => write!(f, "({}+)", reg),
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::DECREMENT) => write!(f, "({}-)", reg),
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::INDIRECT) => write!(f, "({})", reg),
            Operand::Reg16(reg, _) => write!(f, "{}", reg),
            Operand::Imm8(value, mode) if mode.contains(AddressingMode::INDIRECT) => write!(f, "($ff00+${:02x})", value),
            Operand::Imm8(value, _) => write!(f, "${:02x}", value),
            Operand::Imm16(value, mode) if mode.contains(AddressingMode::INDIRECT) => write!(f, "(${:04x})", value),
            Operand::Imm16(value, _) => write!(f, "${:04x}", value),
            Operand::Conditional(cond) => write!(f, "{}", cond),
            Operand::DisplacedReg16(reg, offset) => write!(f, "{}{:+}", reg, offset),
            Operand::Offset(offset) => write!(f, "{:+}", offset),
            Operand::Bit(bit) => write!(f, "{}", bit),
            Operand::Vector(vector) => write!(f, "${:02x}", vector),
        }
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let output = match self {
            Condition::None => "",
            Condition::NZ => "nz",
            Condition::Z => "z",
            Condition::NC => "nc",
            Condition::C => "c",
        };

        write!(f, "{}", output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ram::Ram;
    use std::sync::{Arc, Mutex};

    fn bus_with(program: &[u8]) -> Bus {
        let mut bus = Bus::new();
        bus.register(0x0000, 0x00ff, Arc::new(Mutex::new(Ram::new(0x100))));
        for (addr, byte) in program.iter().enumerate() {
            bus.set(addr as u16, *byte);
        }
        bus
    }

    fn decode(program: &[u8]) -> Instruction {
        Sm83::decode(&bus_with(program), 0).unwrap()
    }

    #[test]
    fn decodes_immediates_and_lengths() {
        let ld = decode(&[0x01, 0x34, 0x12]);
        assert_eq!(ld.opcode, Opcode::Ld);
        assert_eq!(ld.rhs, Some(Operand::Imm16(0x1234, AddressingMode::DIRECT)));
        assert_eq!(ld.length, 3);
        assert_eq!(ld.to_string(), "ld bc, $1234");

        let ldh = decode(&[0xe0, 0x40]);
        assert_eq!(ldh.to_string(), "ldh ($ff00+$40), a");
        assert_eq!(ldh.cycles, (12, None));
    }

    #[test]
    fn conditional_branches_carry_both_costs() {
        let jr = decode(&[0x20, 0xfe]);
        assert_eq!(jr.cycles, (12, Some(8)));
        assert_eq!(jr.to_string(), "jr nz, -2");

        let call = decode(&[0xcd, 0x00, 0x40]);
        assert_eq!(call.cycles, (24, None));
        assert_eq!(call.to_string(), "call $4000");

        assert_eq!(decode(&[0xc0]).cycles, (20, Some(8)));
        assert_eq!(decode(&[0xda, 0, 0]).cycles, (16, Some(12)));
    }

    #[test]
    fn indirect_hl_costs_more() {
        assert_eq!(decode(&[0x34]).cycles.0, 12);
        assert_eq!(decode(&[0x7e]).cycles.0, 8);
        assert_eq!(decode(&[0x86]).cycles.0, 8);
        assert_eq!(decode(&[0xcb, 0x06]).cycles.0, 16);
        assert_eq!(decode(&[0xcb, 0x46]).cycles.0, 12);
        assert_eq!(decode(&[0xcb, 0x11]).cycles.0, 8);
    }

    #[test]
    fn prefixed_table_decodes_bit_targets() {
        let bit = decode(&[0xcb, 0x7c]);
        assert_eq!(bit.opcode, Opcode::Bit);
        assert_eq!(bit.to_string(), "bit 7, h");

        let swap = decode(&[0xcb, 0x37]);
        assert_eq!(swap.opcode, Opcode::Swap);
        assert_eq!(swap.length, 2);
    }

    #[test]
    fn stack_pairs_use_af() {
        assert_eq!(decode(&[0xf5]).lhs, Some(Operand::Reg16(Register::AF, AddressingMode::DIRECT)));
        assert_eq!(decode(&[0x31, 0, 0]).lhs, Some(SP));
    }

    #[test]
    fn stop_is_a_single_byte() {
        let stop = decode(&[0x10, 0x00]);
        assert_eq!(stop.opcode, Opcode::Stop);
        assert_eq!(stop.length, 1);
    }

    #[test]
    fn holes_fail_to_decode() {
        for opcode in [0xd3, 0xdb, 0xdd, 0xe3, 0xe4, 0xeb, 0xec, 0xed, 0xf4, 0xfc, 0xfd] {
            let result = Sm83::decode(&bus_with(&[opcode]), 0);
            assert!(matches!(
                result,
                Err(GbError::DecoderFailure { opcode: o, address: 0 }) if o == opcode
            ));
        }
    }
}
