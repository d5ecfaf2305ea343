use crate::memory::bus::{lock, Addressable, BusAddress};
use crate::memory::interrupts::InterruptController;
use crate::memory::registers::{InterruptFlags, SerialControl};
use crate::memory::{OPEN_BUS, SERIAL_CONTROL_REGISTER, SERIAL_DATA_REGISTER};
use log::warn;
use std::io::Write;
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

/// Receives every byte shifted out of the link port.
pub trait SerialSink: Send {
    fn transfer(&mut self, byte: u8);
}

/// No cable attached.
pub struct NullSink;

impl SerialSink for NullSink {
    fn transfer(&mut self, _byte: u8) {}
}

/// Echoes transferred bytes to stdout, which is how test ROMs report results.
pub struct StdoutSink;

impl SerialSink for StdoutSink {
    fn transfer(&mut self, byte: u8) {
        let mut stdout = std::io::stdout();
        if let Err(e) = stdout.write_all(&[byte]).and_then(|_| stdout.flush()) {
            warn!("Could not echo serial byte: {}", e);
        }
    }
}

impl SerialSink for Sender<u8> {
    fn transfer(&mut self, byte: u8) {
        // A dropped receiver just means nobody is listening anymore.
        let _ = self.send(byte);
    }
}

/// SB and SC. Transfers complete instantly and, with no partner, shift in 0xFF.
pub struct Serial {
    data: u8,
    control: SerialControl,
    sink: Box<dyn SerialSink>,
    interrupts: Arc<Mutex<InterruptController>>,
}

impl Serial {
    pub fn new(sink: Box<dyn SerialSink>, interrupts: Arc<Mutex<InterruptController>>) -> Serial {
        Serial {
            data: 0,
            control: SerialControl::empty(),
            sink,
            interrupts,
        }
    }

    fn start_transfer(&mut self) {
        self.sink.transfer(self.data);
        self.data = 0xff;
        self.control.remove(SerialControl::TRANSFER_START);
        lock(&self.interrupts).request(InterruptFlags::SERIAL);
    }
}

impl Addressable for Serial {
    fn get(&self, addr: BusAddress) -> u8 {
        match addr.address {
            SERIAL_DATA_REGISTER => self.data,
            SERIAL_CONTROL_REGISTER => 0b0111_1110 | self.control.bits(),
            _ => OPEN_BUS,
        }
    }

    fn set(&mut self, addr: BusAddress, value: u8) {
        match addr.address {
            SERIAL_DATA_REGISTER => self.data = value,
            SERIAL_CONTROL_REGISTER => {
                self.control = SerialControl::from(value);
                if self
                    .control
                    .contains(SerialControl::TRANSFER_START | SerialControl::INTERNAL_CLOCK)
                {
                    self.start_transfer();
                }
            }
            _ => {}
        }
    }
}
