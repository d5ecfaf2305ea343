use crate::cartridge::Cartridge;
use crate::error::GbError;
use crate::joypad::{Button, Joypad};
use crate::lr35902::cpu::Cpu;
use crate::lr35902::timer::Timer;
use crate::memory::bus::{lock, Bus};
use crate::memory::interrupts::InterruptController;
use crate::memory::ram::{BootRom, BootRomSwitch, Ram};
use crate::memory::*;
use crate::serial::{Serial, SerialSink};
use crate::video::frame::FrameBuffer;
use crate::video::ppu::{Ppu, FRAME_CYCLES};
use crate::video::{
    BG_PALETTE_REGISTER, LCD_CONTROL_REGISTER, OBJ0_PALETTE_REGISTER, OBJ1_PALETTE_REGISTER, WINDOW_X_REGISTER,
};
use log::debug;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

const DMA_LENGTH: u16 = OAM_END - OAM_START + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: Button,
    pub pressed: bool,
}

/// The whole machine: CPU, bus, and the components that need ticking.
pub struct GameBoy {
    cpu: Cpu,
    bus: Bus,
    ppu: Arc<Mutex<Ppu>>,
    timer: Arc<Mutex<Timer>>,
    joypad: Arc<Mutex<Joypad>>,
    oam: Arc<Mutex<Ram>>,
    frame_buffer: FrameBuffer,
    input_tx: Sender<ButtonEvent>,
    input_rx: Receiver<ButtonEvent>,
}

impl GameBoy {
    /// Without a boot ROM the machine starts in the state the boot ROM would leave.
    pub fn new(cartridge: Cartridge, boot_rom: Option<BootRom>, serial_sink: Box<dyn SerialSink>) -> GameBoy {
        let interrupts = Arc::new(Mutex::new(InterruptController::new()));
        let cartridge = Arc::new(Mutex::new(cartridge));
        let vram = Arc::new(Mutex::new(Ram::new(VRAM_SIZE)));
        let wram = Arc::new(Mutex::new(Ram::new(WRAM_SIZE)));
        let oam = Arc::new(Mutex::new(Ram::new(OAM_SIZE)));
        let hram = Arc::new(Mutex::new(Ram::new(HRAM_SIZE)));
        let joypad = Arc::new(Mutex::new(Joypad::new(interrupts.clone())));
        let serial = Arc::new(Mutex::new(Serial::new(serial_sink, interrupts.clone())));
        let timer = Arc::new(Mutex::new(Timer::new(interrupts.clone())));
        let ppu = Arc::new(Mutex::new(Ppu::new(interrupts.clone())));
        let frame_buffer = lock(&ppu).frame_buffer();

        let booting = boot_rom.is_some();
        let mut bus = Bus::new();
        if let Some(boot_rom) = boot_rom {
            let boot_rom = Arc::new(Mutex::new(boot_rom));
            bus.register(BOOTROM_START, BOOTROM_END, boot_rom.clone());
            bus.register(
                BOOTROM_MAPPER_REGISTER,
                BOOTROM_MAPPER_REGISTER,
                Arc::new(Mutex::new(BootRomSwitch::new(boot_rom))),
            );
        }
        bus.register(ROM_START, ROM_END, cartridge.clone());
        bus.register(VRAM_START, VRAM_END, vram);
        bus.register(EXTERNAL_RAM_START, EXTERNAL_RAM_END, cartridge);
        bus.register(WRAM_START, WRAM_END, wram.clone());
        bus.register(ECHO_RAM_START, ECHO_RAM_END, wram);
        bus.register(OAM_START, OAM_END, oam.clone());
        bus.register(JOYPAD_REGISTER, JOYPAD_REGISTER, joypad.clone());
        bus.register(SERIAL_DATA_REGISTER, SERIAL_CONTROL_REGISTER, serial);
        bus.register(DIV_REGISTER, TAC_REGISTER, timer.clone());
        bus.register(INTERRUPT_FLAGS_REGISTER, INTERRUPT_FLAGS_REGISTER, interrupts.clone());
        bus.register(LCD_CONTROL_REGISTER, WINDOW_X_REGISTER, ppu.clone());
        bus.register(HRAM_START, HRAM_END, hram);
        bus.register(INTERRUPT_ENABLE_REGISTER, INTERRUPT_ENABLE_REGISTER, interrupts);

        let cpu = if booting {
            Cpu::new()
        } else {
            bus.set(LCD_CONTROL_REGISTER, 0x91);
            bus.set(BG_PALETTE_REGISTER, 0xfc);
            bus.set(OBJ0_PALETTE_REGISTER, 0xff);
            bus.set(OBJ1_PALETTE_REGISTER, 0xff);
            Cpu::post_boot()
        };

        let (input_tx, input_rx) = mpsc::channel();

        GameBoy {
            cpu,
            bus,
            ppu,
            timer,
            joypad,
            oam,
            frame_buffer,
            input_tx,
            input_rx,
        }
    }

    /// One CPU step followed by everything it drives. Returns the clock cycles spent.
    pub fn step(&mut self) -> Result<usize, GbError> {
        self.drain_input();

        let cycles = self.cpu.step(&self.bus)?;

        let dma = lock(&self.ppu).take_dma_request();
        if let Some(page) = dma {
            self.oam_dma(page);
        }

        lock(&self.timer).tick(cycles);
        lock(&self.ppu).tick(cycles, &self.bus);

        Ok(cycles)
    }

    /// Steps until a full frame's worth of cycles has passed.
    pub fn run_frame(&mut self) -> Result<usize, GbError> {
        let mut elapsed = 0;
        while elapsed < FRAME_CYCLES {
            elapsed += self.step()?;
        }
        Ok(elapsed)
    }

    /// Button events sent here are applied at the start of the next step.
    pub fn input_sender(&self) -> Sender<ButtonEvent> {
        self.input_tx.clone()
    }

    pub fn frame_buffer(&self) -> FrameBuffer {
        self.frame_buffer.clone()
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    fn drain_input(&mut self) {
        let events: Vec<ButtonEvent> = self.input_rx.try_iter().collect();
        if events.is_empty() {
            return;
        }

        let mut joypad = lock(&self.joypad);
        for event in events {
            joypad.set_button(event.button, event.pressed);
        }
    }

    /// Copies 160 bytes from `page << 8` into OAM. The source is read through the bus
    /// before OAM is locked, since the source may be OAM itself.
    fn oam_dma(&mut self, page: u8) {
        let source = (page as u16) << 8;
        debug!("OAM DMA ${:04x} -> ${:04x}", source, OAM_START);

        let bytes: Vec<u8> = (0..DMA_LENGTH).map(|i| self.bus.get(source.wrapping_add(i))).collect();
        lock(&self.oam).as_mut_slice().copy_from_slice(&bytes);
    }
}
