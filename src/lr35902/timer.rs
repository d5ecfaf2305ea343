use crate::memory::bus::{lock, Addressable, BusAddress};
use crate::memory::interrupts::InterruptController;
use crate::memory::registers::{InterruptFlags, TimerControl};
use crate::memory::{DIV_REGISTER, OPEN_BUS, TAC_REGISTER, TIMA_REGISTER, TMA_REGISTER};
use log::trace;
use std::sync::{Arc, Mutex};

/// Clock cycles per DIV increment.
pub const DIV_PERIOD: usize = 256;

/// DIV, TIMA, TMA and TAC at $FF04-$FF07.
pub struct Timer {
    div: u8,
    tima: u8,
    tma: u8,
    tac: TimerControl,
    div_cycles: usize,
    tima_cycles: usize,
    interrupts: Arc<Mutex<InterruptController>>,
}

impl Timer {
    pub fn new(interrupts: Arc<Mutex<InterruptController>>) -> Timer {
        Timer {
            div: 0,
            tima: 0,
            tma: 0,
            tac: TimerControl::empty(),
            div_cycles: 0,
            tima_cycles: 0,
            interrupts,
        }
    }

    /// Advances by `cycles` clock cycles. Every threshold crossed is applied, so a
    /// large step never loses increments.
    pub fn tick(&mut self, cycles: usize) {
        self.div_cycles += cycles;
        while self.div_cycles >= DIV_PERIOD {
            self.div_cycles -= DIV_PERIOD;
            self.div = self.div.wrapping_add(1);
        }

        if !self.tac.contains(TimerControl::ENABLED) {
            return;
        }

        let period = self.tac.period();
        self.tima_cycles += cycles;
        while self.tima_cycles >= period {
            self.tima_cycles -= period;
            self.increment_tima();
        }
    }

    fn increment_tima(&mut self) {
        if self.tima == 0xff {
            trace!("Timer: TIMA overflow, reloading ${:02x}", self.tma);
            self.tima = self.tma;
            lock(&self.interrupts).request(InterruptFlags::TIMER);
        } else {
            self.tima += 1;
        }
    }
}

impl Addressable for Timer {
    fn get(&self, addr: BusAddress) -> u8 {
        match addr.address {
            DIV_REGISTER => self.div,
            TIMA_REGISTER => self.tima,
            TMA_REGISTER => self.tma,
            TAC_REGISTER => 0b1111_1000 | self.tac.bits(),
            _ => OPEN_BUS,
        }
    }

    fn set(&mut self, addr: BusAddress, value: u8) {
        match addr.address {
            // The written value is kept and the sub-counter keeps running.
            DIV_REGISTER => self.div = value,
            TIMA_REGISTER => self.tima = value,
            TMA_REGISTER => self.tma = value,
            TAC_REGISTER => self.tac = TimerControl::from(value),
            _ => {}
        }
    }
}
