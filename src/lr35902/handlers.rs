use crate::error::{GbError, InvalidHandlerSnafu, UnresolvedTargetSnafu};
use crate::lr35902::cpu::Cpu;
use crate::lr35902::registers::Flags;
use crate::lr35902::sm83::{AddressingMode, Condition, Instruction, Opcode, Operand, Register};
use crate::memory::bus::Bus;
use snafu::OptionExt;

const HIGH_PAGE: u16 = 0xff00;

pub struct Handlers {}

impl Handlers {
    pub fn nop(_cpu: &mut Cpu, _bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        Ok(instruction.cycles.0)
    }

    pub fn load(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let dst = Handlers::lhs(instruction)?;
        let src = Handlers::rhs(instruction)?;

        // ld hl, sp+e
        if let Operand::DisplacedReg16(Register::SP, offset) = src {
            let value = cpu.alu_add_sp(offset);
            Handlers::write_operand(cpu, bus, &dst, value, true)?;
            return Ok(instruction.cycles.0);
        }

        let wide = matches!(src, Operand::Reg16(_, mode) if !mode.contains(AddressingMode::INDIRECT));
        let value = Handlers::resolve_operand(cpu, bus, &src)?;
        Handlers::write_operand(cpu, bus, &dst, value, wide)?;

        Ok(instruction.cycles.0)
    }

    pub fn increment(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        match Handlers::lhs(instruction)? {
            Operand::Reg16(reg, mode) if !mode.contains(AddressingMode::INDIRECT) => {
                let value = cpu.read_register16(reg).wrapping_add(1);
                cpu.write_register16(reg, value);
            }
            target => {
                let value = Handlers::resolve_operand(cpu, bus, &target)? as u8;
                let result = cpu.alu_inc(value);
                Handlers::write_operand(cpu, bus, &target, result as u16, false)?;
            }
        }

        Ok(instruction.cycles.0)
    }

    pub fn decrement(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        match Handlers::lhs(instruction)? {
            Operand::Reg16(reg, mode) if !mode.contains(AddressingMode::INDIRECT) => {
                let value = cpu.read_register16(reg).wrapping_sub(1);
                cpu.write_register16(reg, value);
            }
            target => {
                let value = Handlers::resolve_operand(cpu, bus, &target)? as u8;
                let result = cpu.alu_dec(value);
                Handlers::write_operand(cpu, bus, &target, result as u16, false)?;
            }
        }

        Ok(instruction.cycles.0)
    }

    pub fn add(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        match (Handlers::lhs(instruction)?, Handlers::rhs(instruction)?) {
            (Operand::Reg16(Register::HL, _), src) => {
                let value = Handlers::resolve_operand(cpu, bus, &src)?;
                cpu.alu_add16(value);
            }
            (Operand::Reg16(Register::SP, _), Operand::Offset(offset)) => {
                cpu.registers.sp = cpu.alu_add_sp(offset);
            }
            (_, src) => {
                let value = Handlers::resolve_operand(cpu, bus, &src)? as u8;
                cpu.alu_add(value, false);
            }
        }

        Ok(instruction.cycles.0)
    }

    /// adc, sub, sbc, and, xor, or and cp. All of them work on A.
    pub fn arithmetic(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let value = Handlers::resolve_operand(cpu, bus, &Handlers::rhs(instruction)?)? as u8;

        match instruction.opcode {
            Opcode::Adc => cpu.alu_add(value, true),
            Opcode::Sub => cpu.alu_sub(value, false),
            Opcode::Sbc => cpu.alu_sub(value, true),
            Opcode::And => cpu.alu_and(value),
            Opcode::Xor => cpu.alu_xor(value),
            Opcode::Or => cpu.alu_or(value),
            Opcode::Cp => cpu.alu_cp(value),
            _ => return Handlers::invalid(instruction),
        }

        Ok(instruction.cycles.0)
    }

    /// The accumulator rotates always clear Z, unlike their $CB counterparts.
    pub fn rotate_accumulator(cpu: &mut Cpu, _bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let a = cpu.registers.a;
        cpu.registers.a = match instruction.opcode {
            Opcode::Rlca => cpu.alu_rlc(a),
            Opcode::Rrca => cpu.alu_rrc(a),
            Opcode::Rla => cpu.alu_rl(a),
            Opcode::Rra => cpu.alu_rr(a),
            _ => return Handlers::invalid(instruction),
        };
        cpu.set_flag(Flags::ZERO, false);

        Ok(instruction.cycles.0)
    }

    pub fn adjust(cpu: &mut Cpu, _bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        match instruction.opcode {
            Opcode::Daa => cpu.alu_daa(),
            Opcode::Cpl => {
                cpu.registers.a = !cpu.registers.a;
                cpu.set_flag(Flags::SUBTRACT, true);
                cpu.set_flag(Flags::HALF_CARRY, true);
            }
            Opcode::Scf => {
                cpu.set_flag(Flags::SUBTRACT, false);
                cpu.set_flag(Flags::HALF_CARRY, false);
                cpu.set_flag(Flags::CARRY, true);
            }
            Opcode::Ccf => {
                let carry = cpu.read_flag(Flags::CARRY);
                cpu.set_flag(Flags::SUBTRACT, false);
                cpu.set_flag(Flags::HALF_CARRY, false);
                cpu.set_flag(Flags::CARRY, !carry);
            }
            _ => return Handlers::invalid(instruction),
        }

        Ok(instruction.cycles.0)
    }

    /// jp and jr. PC already points past the instruction.
    pub fn jump(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        if !Handlers::condition_met(cpu, instruction)? {
            return Ok(Handlers::skipped(instruction));
        }

        match (instruction.opcode, Handlers::rhs(instruction)?) {
            (Opcode::Jr, Operand::Offset(offset)) => {
                cpu.registers.pc = cpu.registers.pc.wrapping_add_signed(offset as i16);
            }
            (Opcode::Jp, target) => {
                cpu.registers.pc = Handlers::resolve_operand(cpu, bus, &target)?;
            }
            _ => return Handlers::invalid(instruction),
        }

        Ok(instruction.cycles.0)
    }

    pub fn call(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        if !Handlers::condition_met(cpu, instruction)? {
            return Ok(Handlers::skipped(instruction));
        }

        let target = Handlers::resolve_operand(cpu, bus, &Handlers::rhs(instruction)?)?;
        cpu.push_stack(bus, cpu.registers.pc);
        cpu.registers.pc = target;

        Ok(instruction.cycles.0)
    }

    pub fn ret(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        if !Handlers::condition_met(cpu, instruction)? {
            return Ok(Handlers::skipped(instruction));
        }

        cpu.registers.pc = cpu.pop_stack(bus);

        Ok(instruction.cycles.0)
    }

    /// Unlike ei, reti enables interrupts without delay.
    pub fn reti(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        cpu.registers.pc = cpu.pop_stack(bus);
        cpu.ime.enabled = true;
        cpu.ime.enable_pending = false;

        Ok(instruction.cycles.0)
    }

    pub fn restart(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let Operand::Vector(vector) = Handlers::lhs(instruction)? else {
            return Handlers::invalid(instruction);
        };

        cpu.push_stack(bus, cpu.registers.pc);
        cpu.registers.pc = vector;

        Ok(instruction.cycles.0)
    }

    pub fn push(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let Operand::Reg16(reg, _) = Handlers::lhs(instruction)? else {
            return Handlers::invalid(instruction);
        };

        let value = cpu.read_register16(reg);
        cpu.push_stack(bus, value);

        Ok(instruction.cycles.0)
    }

    pub fn pop(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let Operand::Reg16(reg, _) = Handlers::lhs(instruction)? else {
            return Handlers::invalid(instruction);
        };

        let value = cpu.pop_stack(bus);
        cpu.write_register16(reg, value);

        Ok(instruction.cycles.0)
    }

    /// halt and stop. The CPU idles until an enabled interrupt is flagged.
    pub fn halt(cpu: &mut Cpu, _bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        cpu.halted = true;
        Ok(instruction.cycles.0)
    }

    pub fn disable_interrupts(cpu: &mut Cpu, _bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        cpu.ime.enabled = false;
        cpu.ime.enable_pending = false;
        Ok(instruction.cycles.0)
    }

    pub fn enable_interrupts(cpu: &mut Cpu, _bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        cpu.ime.enable_pending = true;
        Ok(instruction.cycles.0)
    }

    /// The rotate and shift half of the $CB table.
    pub fn shift(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let target = Handlers::lhs(instruction)?;
        let value = Handlers::resolve_operand(cpu, bus, &target)? as u8;

        let result = match instruction.opcode {
            Opcode::Rlc => cpu.alu_rlc(value),
            Opcode::Rrc => cpu.alu_rrc(value),
            Opcode::Rl => cpu.alu_rl(value),
            Opcode::Rr => cpu.alu_rr(value),
            Opcode::Sla => cpu.alu_sla(value),
            Opcode::Sra => cpu.alu_sra(value),
            Opcode::Swap => cpu.alu_swap(value),
            Opcode::Srl => cpu.alu_srl(value),
            _ => return Handlers::invalid(instruction),
        };
        Handlers::write_operand(cpu, bus, &target, result as u16, false)?;

        Ok(instruction.cycles.0)
    }

    pub fn test_bit(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let Operand::Bit(bit) = Handlers::lhs(instruction)? else {
            return Handlers::invalid(instruction);
        };

        let value = Handlers::resolve_operand(cpu, bus, &Handlers::rhs(instruction)?)? as u8;
        cpu.alu_bit(bit, value);

        Ok(instruction.cycles.0)
    }

    /// res and set. No flags are touched.
    pub fn modify_bit(cpu: &mut Cpu, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        let Operand::Bit(bit) = Handlers::lhs(instruction)? else {
            return Handlers::invalid(instruction);
        };

        let target = Handlers::rhs(instruction)?;
        let value = Handlers::resolve_operand(cpu, bus, &target)? as u8;
        let result = match instruction.opcode {
            Opcode::Res => value & !(1 << bit),
            Opcode::Set => value | (1 << bit),
            _ => return Handlers::invalid(instruction),
        };
        Handlers::write_operand(cpu, bus, &target, result as u16, false)?;

        Ok(instruction.cycles.0)
    }

    fn lhs(instruction: &Instruction) -> Result<Operand, GbError> {
        instruction.lhs.with_context(|| InvalidHandlerSnafu {
            instruction: instruction.clone(),
        })
    }

    fn rhs(instruction: &Instruction) -> Result<Operand, GbError> {
        instruction.rhs.with_context(|| InvalidHandlerSnafu {
            instruction: instruction.clone(),
        })
    }

    fn invalid(instruction: &Instruction) -> Result<usize, GbError> {
        InvalidHandlerSnafu {
            instruction: instruction.clone(),
        }
        .fail()
    }

    #[inline]
    fn skipped(instruction: &Instruction) -> usize {
        instruction.cycles.1.unwrap_or(instruction.cycles.0)
    }

    fn condition_met(cpu: &Cpu, instruction: &Instruction) -> Result<bool, GbError> {
        let Operand::Conditional(condition) = Handlers::lhs(instruction)? else {
            return InvalidHandlerSnafu {
                instruction: instruction.clone(),
            }
            .fail();
        };

        Ok(match condition {
            Condition::None => true,
            Condition::NZ => !cpu.read_flag(Flags::ZERO),
            Condition::Z => cpu.read_flag(Flags::ZERO),
            Condition::NC => !cpu.read_flag(Flags::CARRY),
            Condition::C => cpu.read_flag(Flags::CARRY),
        })
    }

    /// Post-increment and post-decrement for `(hl+)` and `(hl-)`.
    fn step_pointer(cpu: &mut Cpu, reg: Register, mode: AddressingMode, addr: u16) {
        if mode.contains(AddressingMode::INCREMENT) {
            cpu.write_register16(reg, addr.wrapping_add(1));
        } else if mode.contains(AddressingMode::DECREMENT) {
            cpu.write_register16(reg, addr.wrapping_sub(1));
        }
    }

    fn resolve_operand(cpu: &mut Cpu, bus: &Bus, operand: &Operand) -> Result<u16, GbError> {
        let value = match *operand {
            Operand::Reg8(Register::C, mode) if mode.contains(AddressingMode::INDIRECT) => {
                bus.get(HIGH_PAGE | cpu.registers.c as u16) as u16
            }
            Operand::Reg8(reg, _) => cpu.read_register(reg) as u16,
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::INDIRECT) => {
                let addr = cpu.read_register16(reg);
                Handlers::step_pointer(cpu, reg, mode, addr);
                bus.get(addr) as u16
            }
            Operand::Reg16(reg, _) => cpu.read_register16(reg),
            Operand::Imm8(value, mode) if mode.contains(AddressingMode::INDIRECT) => {
                bus.get(HIGH_PAGE | value as u16) as u16
            }
            Operand::Imm8(value, _) => value as u16,
            Operand::Imm16(addr, mode) if mode.contains(AddressingMode::INDIRECT) => bus.get(addr) as u16,
            Operand::Imm16(value, _) => value,
            Operand::Offset(offset) => offset as i16 as u16,
            Operand::Bit(bit) => bit as u16,
            Operand::Vector(vector) => vector,
            Operand::Conditional(_) | Operand::DisplacedReg16(..) => {
                return UnresolvedTargetSnafu { target: *operand }.fail();
            }
        };

        Ok(value)
    }

    /// `wide` stores both bytes of `value`; only `ld (a16), sp` needs it for memory.
    fn write_operand(cpu: &mut Cpu, bus: &Bus, operand: &Operand, value: u16, wide: bool) -> Result<(), GbError> {
        match *operand {
            Operand::Reg8(Register::C, mode) if mode.contains(AddressingMode::INDIRECT) => {
                bus.set(HIGH_PAGE | cpu.registers.c as u16, value as u8)
            }
            Operand::Reg8(reg, _) => cpu.write_register(reg, value as u8),
            Operand::Reg16(reg, mode) if mode.contains(AddressingMode::INDIRECT) => {
                let addr = cpu.read_register16(reg);
                Handlers::step_pointer(cpu, reg, mode, addr);
                bus.set(addr, value as u8);
            }
            Operand::Reg16(reg, _) => cpu.write_register16(reg, value),
            Operand::Imm8(offset, mode) if mode.contains(AddressingMode::INDIRECT) => {
                bus.set(HIGH_PAGE | offset as u16, value as u8)
            }
            Operand::Imm16(addr, mode) if mode.contains(AddressingMode::INDIRECT) && wide => bus.write16(addr, value),
            Operand::Imm16(addr, mode) if mode.contains(AddressingMode::INDIRECT) => bus.set(addr, value as u8),
            _ => return UnresolvedTargetSnafu { target: *operand }.fail(),
        }

        Ok(())
    }
}
