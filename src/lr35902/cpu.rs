use crate::error::GbError;
use crate::lr35902::handlers::Handlers;
use crate::lr35902::irq::{Ime, Vector};
use crate::lr35902::registers::{Flags, Registers};
use crate::lr35902::sm83::{Instruction, Opcode, Register, Sm83};
use crate::memory::bus::Bus;
use crate::memory::registers::InterruptFlags;
use crate::memory::{INTERRUPT_ENABLE_REGISTER, INTERRUPT_FLAGS_REGISTER};
use log::{debug, trace};

pub const INTERRUPT_DISPATCH_CYCLES: usize = 20;
pub const HALT_CYCLES: usize = 4;

#[derive(Clone)]
pub struct Cpu {
    pub(super) registers: Registers,
    pub(super) ime: Ime,
    pub(super) halted: bool,
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu::new()
    }
}

impl Cpu {
    /// Power-on state, for running a boot ROM from $0000.
    pub fn new() -> Cpu {
        Cpu {
            registers: Registers::default(),
            ime: Ime::default(),
            halted: false,
        }
    }

    /// The state a finished boot ROM leaves behind.
    pub fn post_boot() -> Cpu {
        Cpu {
            registers: Registers::post_boot(),
            ..Cpu::new()
        }
    }

    /// Executes one instruction, or services one interrupt, or idles while halted.
    /// Returns the clock cycles spent.
    ///
    /// On a decode failure PC is left on the offending opcode.
    pub fn step(&mut self, bus: &Bus) -> Result<usize, GbError> {
        let pending = Cpu::pending_interrupts(bus);
        if self.halted && !pending.is_empty() {
            self.halted = false;
        }

        if self.ime.enabled {
            if let Some(vector) = Vector::from_flags(pending) {
                self.service_interrupt(bus, vector);
                return Ok(INTERRUPT_DISPATCH_CYCLES);
            }
        }

        if self.halted {
            return Ok(HALT_CYCLES);
        }

        // An ei executed by the previous instruction takes effect once this one completes.
        let enable_after = self.ime.enable_pending;

        let pc = self.registers.pc;
        let instruction = Sm83::decode(bus, pc)?;
        trace!("[${:04x}] {}", pc, instruction);

        self.registers.pc = pc.wrapping_add(instruction.length as u16);
        let cycles = match self.execute(bus, &instruction) {
            Ok(cycles) => cycles,
            Err(e) => {
                self.registers.pc = pc;
                return Err(e);
            }
        };

        if enable_after && self.ime.enable_pending {
            self.ime.enabled = true;
            self.ime.enable_pending = false;
        }

        Ok(cycles)
    }

    fn execute(&mut self, bus: &Bus, instruction: &Instruction) -> Result<usize, GbError> {
        match instruction.opcode {
            Opcode::Nop => Handlers::nop(self, bus, instruction),
            Opcode::Ld | Opcode::Ldh => Handlers::load(self, bus, instruction),
            Opcode::Inc => Handlers::increment(self, bus, instruction),
            Opcode::Dec => Handlers::decrement(self, bus, instruction),
            Opcode::Add => Handlers::add(self, bus, instruction),
            Opcode::Adc | Opcode::Sub | Opcode::Sbc | Opcode::And | Opcode::Xor | Opcode::Or | Opcode::Cp => {
                Handlers::arithmetic(self, bus, instruction)
            }
            Opcode::Rlca | Opcode::Rrca | Opcode::Rla | Opcode::Rra => {
                Handlers::rotate_accumulator(self, bus, instruction)
            }
            Opcode::Daa | Opcode::Cpl | Opcode::Scf | Opcode::Ccf => Handlers::adjust(self, bus, instruction),
            Opcode::Jp | Opcode::Jr => Handlers::jump(self, bus, instruction),
            Opcode::Call => Handlers::call(self, bus, instruction),
            Opcode::Ret => Handlers::ret(self, bus, instruction),
            Opcode::Reti => Handlers::reti(self, bus, instruction),
            Opcode::Rst => Handlers::restart(self, bus, instruction),
            Opcode::Push => Handlers::push(self, bus, instruction),
            Opcode::Pop => Handlers::pop(self, bus, instruction),
            Opcode::Halt | Opcode::Stop => Handlers::halt(self, bus, instruction),
            Opcode::Di => Handlers::disable_interrupts(self, bus, instruction),
            Opcode::Ei => Handlers::enable_interrupts(self, bus, instruction),
            Opcode::Rlc
            | Opcode::Rrc
            | Opcode::Rl
            | Opcode::Rr
            | Opcode::Sla
            | Opcode::Sra
            | Opcode::Swap
            | Opcode::Srl => Handlers::shift(self, bus, instruction),
            Opcode::Bit => Handlers::test_bit(self, bus, instruction),
            Opcode::Res | Opcode::Set => Handlers::modify_bit(self, bus, instruction),
        }
    }

    fn pending_interrupts(bus: &Bus) -> InterruptFlags {
        InterruptFlags::from(bus.get(INTERRUPT_FLAGS_REGISTER)) & InterruptFlags::from(bus.get(INTERRUPT_ENABLE_REGISTER))
    }

    fn service_interrupt(&mut self, bus: &Bus, vector: Vector) {
        debug!("Servicing {} interrupt from ${:04x}", vector, self.registers.pc);

        let flags = InterruptFlags::from(bus.get(INTERRUPT_FLAGS_REGISTER));
        bus.set(INTERRUPT_FLAGS_REGISTER, (flags - vector.to_flag()).bits());

        self.ime.enabled = false;
        self.ime.enable_pending = false;
        self.push_stack(bus, self.registers.pc);
        self.registers.pc = vector.to_address();
    }

    pub fn push_stack(&mut self, bus: &Bus, value: u16) {
        self.registers.sp = self.registers.sp.wrapping_sub(2);
        bus.write16(self.registers.sp, value);
    }

    pub fn pop_stack(&mut self, bus: &Bus) -> u16 {
        let value = bus.read16(self.registers.sp);
        self.registers.sp = self.registers.sp.wrapping_add(2);
        value
    }

    pub fn read_register(&self, register: Register) -> u8 {
        match register {
            Register::A => self.registers.a,
            Register::B => self.registers.b,
            Register::C => self.registers.c,
            Register::D => self.registers.d,
            Register::E => self.registers.e,
            Register::H => self.registers.h,
            Register::L => self.registers.l,
            _ => (self.read_register16(register) & 0xff) as u8,
        }
    }

    pub fn write_register(&mut self, register: Register, data: u8) {
        match register {
            Register::A => self.registers.a = data,
            Register::B => self.registers.b = data,
            Register::C => self.registers.c = data,
            Register::D => self.registers.d = data,
            Register::E => self.registers.e = data,
            Register::H => self.registers.h = data,
            Register::L => self.registers.l = data,
            _ => self.write_register16(register, data as u16),
        }
    }

    pub fn read_register16(&self, register: Register) -> u16 {
        match register {
            Register::AF => self.registers.af(),
            Register::BC => self.registers.bc(),
            Register::DE => self.registers.de(),
            Register::HL => self.registers.hl(),
            Register::SP => self.registers.sp,
            _ => self.read_register(register) as u16,
        }
    }

    pub fn write_register16(&mut self, register: Register, value: u16) {
        match register {
            Register::AF => self.registers.set_af(value),
            Register::BC => self.registers.set_bc(value),
            Register::DE => self.registers.set_de(value),
            Register::HL => self.registers.set_hl(value),
            Register::SP => self.registers.sp = value,
            _ => self.write_register(register, value as u8),
        }
    }

    #[inline]
    pub fn read_flag(&self, flag: Flags) -> bool {
        self.registers.f.contains(flag)
    }

    #[inline]
    pub fn set_flag(&mut self, flag: Flags, value: bool) {
        self.registers.f.set(flag, value);
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn ime(&self) -> bool {
        self.ime.enabled
    }

    pub fn halted(&self) -> bool {
        self.halted
    }
}

impl std::fmt::Display for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}  IME: {}  HALT: {}", self.registers, self.ime.enabled, self.halted)
    }
}
